//! One wishlist per customer, one entry per product, one review per purchase.
//!
//! These tests require a running server and the seeded records described in
//! the crate docs. Each request is sent twice; the first may already have been
//! made by an earlier run, so only the second response is asserted.

use nextgen_core::CustomerId;
use nextgen_integration_tests::{client, customer_token_for, error_message, fixture, url};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::json;

fn token() -> String {
    customer_token_for(&CustomerId::new(fixture("NEXTGEN_TEST_CUSTOMER_ID")))
}

async fn send_twice(request: impl Fn() -> RequestBuilder) -> Response {
    request().send().await.expect("Failed to reach server");
    request().send().await.expect("Failed to reach server")
}

#[tokio::test]
#[ignore = "Requires running server and seeded customer"]
async fn test_second_wishlist_is_rejected() {
    let token = token();
    let resp = send_twice(|| {
        client()
            .post(url("/store/customers/me/wishlists"))
            .bearer_auth(&token)
    })
    .await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_message(resp).await, "Customer already has a wishlist");
}

#[tokio::test]
#[ignore = "Requires running server and seeded customer and product"]
async fn test_product_is_saved_once() {
    let token = token();
    let _ = client()
        .post(url("/store/customers/me/wishlists"))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to reach server");

    let product_id = fixture("NEXTGEN_TEST_PRODUCT_ID");
    let resp = send_twice(|| {
        client()
            .post(url("/store/customers/me/wishlists/items"))
            .bearer_auth(&token)
            .json(&json!({ "product_id": product_id }))
    })
    .await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        error_message(resp).await,
        "This product is already in the wishlist"
    );
}

#[tokio::test]
#[ignore = "Requires running server and seeded order"]
async fn test_second_review_is_conflict() {
    let token = token();
    let body = json!({
        "order_id": fixture("NEXTGEN_TEST_ORDER_ID"),
        "product_id": fixture("NEXTGEN_TEST_PRODUCT_ID"),
        "variant_id": fixture("NEXTGEN_TEST_VARIANT_ID"),
        "rating": 4,
        "comment": "Arrived quickly",
    });
    let resp = send_twice(|| {
        client()
            .post(url("/store/product/order/review-rating"))
            .bearer_auth(&token)
            .json(&body)
    })
    .await;

    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(
        error_message(resp).await,
        "You have already submitted a review for this product in this order"
    );
}
