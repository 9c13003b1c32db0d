//! Store routes: validation, auth and response shapes.
//!
//! These tests require a running server with migrations applied.

use nextgen_integration_tests::{client, customer_token, error_message, url};
use reqwest::StatusCode;
use serde_json::{Value, json};

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_wishlist_requires_customer_token() {
    let resp = client()
        .get(url("/store/customers/me/wishlists?region_id=reg_1"))
        .send()
        .await
        .expect("Failed to reach server");

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running server and JWT_SECRET"]
async fn test_wishlist_requires_region() {
    let resp = client()
        .get(url("/store/customers/me/wishlists"))
        .bearer_auth(customer_token())
        .send()
        .await
        .expect("Failed to reach server");

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_message(resp).await, "Missing region_id in query");
}

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_product_detail_requires_region() {
    let resp = client()
        .get(url("/store/products/prod_missing"))
        .send()
        .await
        .expect("Failed to reach server");

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        error_message(resp).await,
        "The `region_id` query parameter is required."
    );
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_category_banners_list() {
    let resp = client()
        .get(url("/store/category_banner?type=All"))
        .send()
        .await
        .expect("Failed to reach server");

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("Body is not JSON");
    assert!(body["banners"].is_array());
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_product_listing_shape() {
    let resp = client()
        .get(url("/store/products?limit=5"))
        .send()
        .await
        .expect("Failed to reach server");

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("Body is not JSON");
    assert!(body["products"].is_array());
    assert_eq!(body["limit"], 5);
    assert_eq!(body["offset"], 0);
}

#[tokio::test]
#[ignore = "Requires running server and JWT_SECRET"]
async fn test_review_requires_all_fields() {
    let resp = client()
        .post(url("/store/product/order/review-rating"))
        .bearer_auth(customer_token())
        .json(&json!({ "order_id": "order_1", "rating": 4 }))
        .send()
        .await
        .expect("Failed to reach server");

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_message(resp).await, "Missing required fields");
}

#[tokio::test]
#[ignore = "Requires running server and JWT_SECRET"]
async fn test_saved_cards_reject_zero_limit() {
    let resp = client()
        .get(url("/store/payment-card/me?limit=0"))
        .bearer_auth(customer_token())
        .send()
        .await
        .expect("Failed to reach server");

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_message(resp).await, "Invalid limit value.");
}

#[tokio::test]
#[ignore = "Requires running server and JWT_SECRET"]
async fn test_complete_order_for_another_customer_is_forbidden() {
    let resp = client()
        .post(url("/store/orders/complete"))
        .bearer_auth(customer_token())
        .json(&json!({
            "cartId": "cart_1",
            "orderId": "order_1",
            "userId": "cus_someone_else",
            "paymentIntentId": "pi_1",
            "paymentSessionId": "payses_1",
            "paymentMethodId": "pm_1",
            "type": "default",
        }))
        .send()
        .await
        .expect("Failed to reach server");

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore = "Requires running server and JWT_SECRET"]
async fn test_malformed_body_gets_json_error() {
    let resp = client()
        .post(url("/store/orders/complete"))
        .bearer_auth(customer_token())
        .header("content-type", "application/json")
        .body(r#"{"cartId": 5}"#)
        .send()
        .await
        .expect("Failed to reach server");

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.expect("Error body is not JSON");
    assert_eq!(body["error"], "invalid_request");
    assert!(body["message"].as_str().is_some_and(|m| m.contains("cartId")));
}
