//! `GET /products/search` end to end against the seeded Portland catalog.

use reqwest::StatusCode;
use serde_json::Value;

use farmstand_integration_tests::{DOWNTOWN, TestServer};

async fn search(server: &TestServer, query: &str) -> (StatusCode, Value) {
    let resp = server
        .anonymous()
        .get(server.url(&format!("/products/search?{query}")))
        .send()
        .await
        .expect("request failed");
    let status = resp.status();
    (status, resp.json().await.unwrap_or(Value::Null))
}

fn names(hits: &Value) -> Vec<String> {
    hits.as_array()
        .expect("hits should be an array")
        .iter()
        .map(|h| h["product"]["name"].as_str().unwrap_or_default().to_string())
        .collect()
}

fn near_downtown(extra: &str) -> String {
    format!("lat={}&lng={}{extra}", DOWNTOWN.0, DOWNTOWN.1)
}

#[tokio::test]
async fn test_empty_search_returns_available_products_newest_first() {
    let server = TestServer::spawn().await;
    let (status, hits) = search(&server, "").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        names(&hits),
        [
            "Marionberries",
            "Wildflower Honey",
            "Duck Eggs",
            "Heirloom Tomatoes",
            "Rainbow Chard",
        ]
    );
    assert!(
        hits.as_array()
            .into_iter()
            .flatten()
            .all(|h| h["distanceKm"].is_null())
    );
}

#[tokio::test]
async fn test_radius_search_stays_within_radius() {
    let server = TestServer::spawn().await;
    let (status, hits) = search(&server, &near_downtown("&radius=25")).await;

    assert_eq!(status, StatusCode::OK);
    // Same-farm ties fall back to recency
    assert_eq!(names(&hits), ["Heirloom Tomatoes", "Rainbow Chard", "Duck Eggs"]);

    let distances: Vec<f64> = hits
        .as_array()
        .into_iter()
        .flatten()
        .map(|h| h["distanceKm"].as_f64().expect("distance present"))
        .collect();
    assert!(distances.iter().all(|d| *d <= 25.0));
    assert!(distances.is_sorted());
}

#[tokio::test]
async fn test_origin_without_radius_sorts_unlocated_last() {
    let server = TestServer::spawn().await;
    let (status, hits) = search(&server, &near_downtown("")).await;

    assert_eq!(status, StatusCode::OK);
    let names = names(&hits);
    assert_eq!(names.len(), 5);
    assert_eq!(names.last().map(String::as_str), Some("Wildflower Honey"));
    assert_eq!(names.get(3).map(String::as_str), Some("Marionberries"));
}

#[tokio::test]
async fn test_text_category_and_tag_filters() {
    let server = TestServer::spawn().await;

    let (_, hits) = search(&server, "q=CHARD").await;
    assert_eq!(names(&hits), ["Rainbow Chard"]);

    let (_, hits) = search(&server, "category=dairy").await;
    assert_eq!(names(&hits), ["Duck Eggs"]);

    let (_, hits) = search(&server, "tags=raw,%20greens").await;
    assert_eq!(names(&hits), ["Wildflower Honey", "Rainbow Chard"]);

    let (_, hits) = search(&server, "q=peas").await;
    assert!(names(&hits).is_empty());
}

#[tokio::test]
async fn test_limit_applies_after_ordering() {
    let server = TestServer::spawn().await;
    let (_, hits) = search(&server, "limit=2").await;

    assert_eq!(names(&hits), ["Marionberries", "Wildflower Honey"]);
}

#[tokio::test]
async fn test_blank_parameters_are_ignored() {
    let server = TestServer::spawn().await;
    let (status, hits) = search(&server, "q=&lat=&lng=&radius=&category=&tags=").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(names(&hits).len(), 5);
}

#[tokio::test]
async fn test_malformed_coordinates_rejected() {
    let server = TestServer::spawn().await;

    let negative_radius = near_downtown("&radius=-1");
    for query in [
        "lat=45.5",
        "lat=95&lng=0",
        "lat=45&lng=-190",
        negative_radius.as_str(),
    ] {
        let (status, body) = search(&server, query).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "query {query}");
        assert!(body["error"].is_string());
    }
}
