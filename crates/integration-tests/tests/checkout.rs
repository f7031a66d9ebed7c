//! Cart and checkout flow end to end.

use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{Value, json};

use farmstand_core::{DeliveryOption, FeeSchedule, ProductId};
use farmstand_integration_tests::{TestServer, decimal};
use farmstand_marketplace::db::MarketplaceStore;
use farmstand_marketplace::models::{NewOrder, NewOrderItem, cart_subtotal};
use farmstand_marketplace::services::MockPaymentProvider;

async fn add_to_cart(server: &TestServer, client: &Client, product: ProductId, quantity: i32) -> Value {
    let resp = client
        .post(server.url("/cart/items"))
        .json(&json!({"productId": product, "quantity": quantity}))
        .send()
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::CREATED);
    resp.json().await.expect("cart item json")
}

async fn get_json(client: &Client, url: String) -> (StatusCode, Value) {
    let resp = client.get(url).send().await.expect("request failed");
    let status = resp.status();
    (status, resp.json().await.unwrap_or(Value::Null))
}

async fn checkout(server: &TestServer, client: &Client, body: Value) -> (StatusCode, Value) {
    let resp = client
        .post(server.url("/orders/checkout"))
        .json(&body)
        .send()
        .await
        .expect("request failed");
    let status = resp.status();
    (status, resp.json().await.unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_cart_requires_session() {
    let server = TestServer::spawn().await;
    let client = server.anonymous();

    let (status, body) = get_json(&client, server.url("/cart")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = checkout(&server, &client, json!({"deliveryOption": "pickup"})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_adding_same_product_merges_lines() {
    let server = TestServer::spawn().await;
    let f = server.fixtures.clone();
    let client = server.client_for(f.buyer).await;

    add_to_cart(&server, &client, f.chard.id, 1).await;
    add_to_cart(&server, &client, f.chard.id, 2).await;
    add_to_cart(&server, &client, f.eggs.id, 1).await;

    let (status, cart) = get_json(&client, server.url("/cart")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["items"].as_array().map(Vec::len), Some(2));
    assert_eq!(cart["itemCount"], 4);
    // 3 * 3.50 + 9.00
    assert_eq!(decimal(&cart, "subtotal"), dec!(19.50));
}

#[tokio::test]
async fn test_add_rejects_bad_quantity_and_unavailable_products() {
    let server = TestServer::spawn().await;
    let f = server.fixtures.clone();
    let client = server.client_for(f.buyer).await;

    for (product, quantity) in [(f.chard.id, 0), (f.peas.id, 1)] {
        let resp = client
            .post(server.url("/cart/items"))
            .json(&json!({"productId": product, "quantity": quantity}))
            .send()
            .await
            .expect("request failed");
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    let resp = client
        .post(server.url("/cart/items"))
        .json(&json!({"productId": 9999, "quantity": 1}))
        .send()
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_checkout_creates_order_and_empties_cart() {
    let server = TestServer::spawn().await;
    let f = server.fixtures.clone();
    let client = server.client_for(f.buyer).await;

    add_to_cart(&server, &client, f.chard.id, 2).await;
    add_to_cart(&server, &client, f.eggs.id, 1).await;

    let (status, body) = checkout(
        &server,
        &client,
        json!({"deliveryOption": "pickup", "notes": "North gate"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let order = &body["order"];
    assert_eq!(order["status"], "pending");
    assert_eq!(order["deliveryOption"], "pickup");
    assert_eq!(order["notes"], "North gate");
    assert_eq!(decimal(order, "subtotal"), dec!(16.00));
    assert_eq!(decimal(order, "platformFee"), dec!(0.80));
    assert_eq!(decimal(order, "processingFee"), dec!(0.76));
    assert_eq!(decimal(order, "total"), dec!(17.56));

    let client_secret = body["clientSecret"].as_str().expect("client secret");
    assert!(client_secret.starts_with("mock_pi_"));
    assert_eq!(order["paymentClientSecret"], client_secret);

    // Order items preserve the cart's line totals
    let items_total: Decimal = order["items"]
        .as_array()
        .expect("items")
        .iter()
        .map(|item| decimal(item, "lineTotal"))
        .sum();
    assert_eq!(items_total, decimal(order, "subtotal"));

    let (_, cart) = get_json(&client, server.url("/cart")).await;
    assert_eq!(cart["items"].as_array().map(Vec::len), Some(0));

    let (_, chard) = get_json(&client, server.url(&format!("/products/{}", f.chard.id))).await;
    assert_eq!(chard["stock"], 38);

    let (status, orders) = get_json(&client, server.url("/orders")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(orders.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_checkout_empty_cart_rejected() {
    let server = TestServer::spawn().await;
    let client = server.client_for(server.fixtures.buyer).await;

    let (status, body) = checkout(&server, &client, json!({"deliveryOption": "home"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().is_some_and(|e| e.contains("empty")));
}

#[tokio::test]
async fn test_checkout_insufficient_stock_keeps_cart() {
    let server = TestServer::spawn().await;
    let f = server.fixtures.clone();
    let client = server.client_for(f.buyer).await;

    add_to_cart(&server, &client, f.berries.id, 6).await;

    let (status, _) = checkout(&server, &client, json!({"deliveryOption": "home"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, cart) = get_json(&client, server.url("/cart")).await;
    assert_eq!(cart["items"].as_array().map(Vec::len), Some(1));
    let (_, orders) = get_json(&client, server.url("/orders")).await;
    assert_eq!(orders.as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn test_checkout_rejects_unknown_delivery_option() {
    let server = TestServer::spawn().await;
    let f = server.fixtures.clone();
    let client = server.client_for(f.buyer).await;

    add_to_cart(&server, &client, f.honey.id, 1).await;
    let (status, _) = checkout(&server, &client, json!({"deliveryOption": "drone"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_payment_failure_leaves_pending_order() {
    let server = TestServer::spawn_with_payments(MockPaymentProvider::failing()).await;
    let f = server.fixtures.clone();
    let client = server.client_for(f.buyer).await;

    add_to_cart(&server, &client, f.honey.id, 2).await;
    let (status, body) = checkout(&server, &client, json!({"deliveryOption": "farmers-market"})).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "Payment provider error");

    let (_, orders) = get_json(&client, server.url("/orders")).await;
    let orders = orders.as_array().expect("orders");
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["status"], "pending");
    assert!(orders[0]["paymentClientSecret"].is_null());
}

#[tokio::test]
async fn test_double_submit_places_one_order() {
    let server = TestServer::spawn().await;
    let f = server.fixtures.clone();
    let client = server.client_for(f.buyer).await;

    add_to_cart(&server, &client, f.chard.id, 2).await;

    let body = json!({"deliveryOption": "pickup"});
    let (first, second) = tokio::join!(
        checkout(&server, &client, body.clone()),
        checkout(&server, &client, body.clone()),
    );
    let mut statuses = [first.0, second.0];
    statuses.sort_by_key(StatusCode::as_u16);
    assert_eq!(statuses[0], StatusCode::CREATED, "{statuses:?}");
    // The loser either finds the cart already empty or its lines consumed
    assert!(
        matches!(statuses[1], StatusCode::BAD_REQUEST | StatusCode::CONFLICT),
        "{statuses:?}"
    );

    let (_, orders) = get_json(&client, server.url("/orders")).await;
    assert_eq!(orders.as_array().map(Vec::len), Some(1));
    let (_, chard) = get_json(&client, server.url(&format!("/products/{}", f.chard.id))).await;
    assert_eq!(chard["stock"], 38);

    // Resubmitting after the fact finds nothing to order
    let (status, _) = checkout(&server, &client, body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_line_added_while_order_is_placed_stays_in_cart() {
    let server = TestServer::spawn().await;
    let f = server.fixtures.clone();
    let client = server.client_for(f.buyer).await;

    add_to_cart(&server, &client, f.chard.id, 1).await;

    // Price the cart the way checkout does, then add a line before placing
    let lines = server.store.get_cart_items(f.buyer).await.expect("cart");
    let fees = FeeSchedule::default()
        .calculate(cart_subtotal(&lines), DeliveryOption::Pickup)
        .expect("fees");
    let items: Vec<NewOrderItem> = lines
        .iter()
        .map(|line| NewOrderItem {
            cart_item_id: line.item.id,
            product_id: line.product.id,
            producer_id: line.product.producer_id,
            product_name: line.product.name.clone(),
            quantity: line.item.quantity,
            unit_price: line.product.price,
            line_total: line.line_total(),
        })
        .collect();
    add_to_cart(&server, &client, f.eggs.id, 1).await;

    let order = server
        .store
        .place_order(
            NewOrder {
                user_id: f.buyer,
                delivery_option: DeliveryOption::Pickup,
                fees,
                notes: None,
            },
            items,
        )
        .await
        .expect("order placed");

    let (_, cart) = get_json(&client, server.url("/cart")).await;
    let cart_items = cart["items"].as_array().expect("cart items");
    assert_eq!(cart_items.len(), 1);
    assert_eq!(cart_items[0]["product"]["name"], "Duck Eggs");

    let (_, placed) = get_json(&client, server.url(&format!("/orders/{}", order.id))).await;
    let ordered = placed["items"].as_array().expect("order items");
    assert_eq!(ordered.len(), 1);
    assert_eq!(ordered[0]["productName"], "Rainbow Chard");

    // The remaining line checks out on its own
    let (status, body) = checkout(&server, &client, json!({"deliveryOption": "pickup"})).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(decimal(&body["order"], "subtotal"), dec!(9.00));
}

#[tokio::test]
async fn test_clear_cart() {
    let server = TestServer::spawn().await;
    let f = server.fixtures.clone();
    let buyer = server.client_for(f.buyer).await;
    let other = server.client_for(f.other_buyer).await;

    add_to_cart(&server, &buyer, f.chard.id, 1).await;
    add_to_cart(&server, &buyer, f.eggs.id, 2).await;
    add_to_cart(&server, &other, f.chard.id, 1).await;

    let resp = buyer
        .delete(server.url("/cart"))
        .send()
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let (_, cart) = get_json(&buyer, server.url("/cart")).await;
    assert_eq!(cart["items"].as_array().map(Vec::len), Some(0));
    assert_eq!(cart["itemCount"], 0);
    let (_, cart) = get_json(&other, server.url("/cart")).await;
    assert_eq!(cart["items"].as_array().map(Vec::len), Some(1));

    let resp = server
        .anonymous()
        .delete(server.url("/cart"))
        .send()
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
