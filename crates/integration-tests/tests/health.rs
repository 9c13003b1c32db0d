//! Liveness and readiness checks.

use nextgen_integration_tests::{client, url};
use reqwest::StatusCode;

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_health() {
    let resp = client()
        .get(url("/health"))
        .send()
        .await
        .expect("Failed to reach server");

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.expect("Failed to read body"), "ok");
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_readiness_with_database() {
    let resp = client()
        .get(url("/health/ready"))
        .send()
        .await
        .expect("Failed to reach server");

    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_request_id_is_echoed() {
    let resp = client()
        .get(url("/health"))
        .header("x-request-id", "it-health-1")
        .send()
        .await
        .expect("Failed to reach server");

    assert_eq!(
        resp.headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok()),
        Some("it-health-1")
    );
}
