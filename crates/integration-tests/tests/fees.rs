//! `POST /orders/calculate-fees` end to end.

use reqwest::StatusCode;
use rust_decimal_macros::dec;
use serde_json::{Value, json};

use farmstand_integration_tests::{TestServer, decimal};

async fn quote(server: &TestServer, body: Value) -> (StatusCode, Value) {
    let resp = server
        .anonymous()
        .post(server.url("/orders/calculate-fees"))
        .json(&body)
        .send()
        .await
        .expect("request failed");
    let status = resp.status();
    (status, resp.json().await.unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_pickup_fees_for_100() {
    let server = TestServer::spawn().await;
    let (status, body) = quote(&server, json!({"subtotal": 100, "deliveryOption": "pickup"})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&body, "subtotal"), dec!(100));
    assert_eq!(decimal(&body, "deliveryFee"), dec!(0));
    assert_eq!(decimal(&body, "platformFee"), dec!(5.00));
    assert_eq!(decimal(&body, "processingFee"), dec!(3.20));
    assert_eq!(decimal(&body, "total"), dec!(108.20));
}

#[tokio::test]
async fn test_home_delivery_fees_for_50() {
    let server = TestServer::spawn().await;
    let (status, body) = quote(&server, json!({"subtotal": "50", "deliveryOption": "home"})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&body, "deliveryFee"), dec!(4.99));
    assert_eq!(decimal(&body, "platformFee"), dec!(2.50));
    assert_eq!(decimal(&body, "processingFee"), dec!(1.89));
    assert_eq!(decimal(&body, "total"), dec!(59.38));
}

#[tokio::test]
async fn test_unrecognized_delivery_option_has_no_delivery_fee() {
    let server = TestServer::spawn().await;
    let (status, body) = quote(&server, json!({"subtotal": 10, "deliveryOption": "drone"})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&body, "deliveryFee"), dec!(0));
    assert!(decimal(&body, "total") >= dec!(10));
}

#[tokio::test]
async fn test_negative_subtotal_rejected() {
    let server = TestServer::spawn().await;
    let (status, body) = quote(&server, json!({"subtotal": -1, "deliveryOption": "pickup"})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().is_some_and(|e| e.contains("negative")));
}

#[tokio::test]
async fn test_missing_subtotal_rejected() {
    let server = TestServer::spawn().await;
    let (status, _) = quote(&server, json!({"deliveryOption": "pickup"})).await;

    assert!(status.is_client_error());
}

#[tokio::test]
async fn test_amounts_carry_two_decimal_places() {
    let server = TestServer::spawn().await;
    let (status, body) = quote(&server, json!({"subtotal": 100, "deliveryOption": "pickup"})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["subtotal"], "100.00");
    assert_eq!(body["deliveryFee"], "0.00");
    assert_eq!(body["platformFee"], "5.00");
    assert_eq!(body["total"], "108.20");
}

#[tokio::test]
async fn test_out_of_range_subtotal_rejected() {
    let server = TestServer::spawn().await;

    for option in ["pickup", "home", "farmers-market", "drone"] {
        let (status, body) = quote(
            &server,
            json!({"subtotal": "79228162514264337593543950335", "deliveryOption": option}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "option {option}");
        assert!(body["error"].as_str().is_some_and(|e| e.contains("too large")));
    }

    // Beyond what a decimal can hold at all
    let (status, _) = quote(
        &server,
        json!({"subtotal": "1e40", "deliveryOption": "pickup"}),
    )
    .await;
    assert!(status.is_client_error());

    // The server is still answering
    let (status, _) = quote(&server, json!({"subtotal": 1, "deliveryOption": "pickup"})).await;
    assert_eq!(status, StatusCode::OK);
}
