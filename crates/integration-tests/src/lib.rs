//! End-to-end HTTP tests for the Farmstand marketplace.
//!
//! Each test spawns the real router on an ephemeral port, backed by an
//! [`InMemoryStore`] seeded with a small Portland-area catalog and a mock
//! payment provider. No database or network access is needed.
//!
//! ```bash
//! cargo test -p farmstand-integration-tests
//! ```
//!
//! Sign-in is out of scope for the service, so the test server mounts one
//! extra route, `POST /test/login/{user_id}`, that writes the session key the
//! real extractor reads.

use std::str::FromStr;
use std::sync::Arc;

use axum::{Router, extract::Path, http::StatusCode, routing::post};
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::task::JoinHandle;
use tower_sessions::{MemoryStore, Session, SessionManagerLayer};

use farmstand_core::{CurrencyCode, FeeSchedule, Location, ProducerId, Product, UserId};
use farmstand_marketplace::db::{
    InMemoryStore, MarketplaceStore, NewProducer, NewProduct, ProductPatch,
};
use farmstand_marketplace::middleware::{SESSION_COOKIE_NAME, set_current_user};
use farmstand_marketplace::models::NewUser;
use farmstand_marketplace::services::{MockPaymentProvider, PaymentProvider};
use farmstand_marketplace::state::AppState;

/// Downtown Portland, the origin used by radius searches.
pub const DOWNTOWN: (f64, f64) = (45.5152, -122.6784);

/// Seeded accounts and products.
#[derive(Debug, Clone)]
pub struct Fixtures {
    /// Owns Sunny Acres (downtown).
    pub farmer: UserId,
    /// Owns Hilltop Dairy (Oregon City, ~18 km from downtown).
    pub dairy_farmer: UserId,
    pub buyer: UserId,
    pub other_buyer: UserId,
    pub chard: Product,
    pub tomatoes: Product,
    pub eggs: Product,
    /// From a producer with no location.
    pub honey: Product,
    /// From Salem, ~70 km from downtown. Only 5 in stock.
    pub berries: Product,
    /// Listed but not available.
    pub peas: Product,
}

/// A running marketplace server.
pub struct TestServer {
    pub base_url: String,
    pub store: Arc<InMemoryStore>,
    pub fixtures: Fixtures,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Spawn a server whose payments always succeed.
    pub async fn spawn() -> Self {
        Self::spawn_with_payments(MockPaymentProvider::new()).await
    }

    /// Spawn a server with a specific payment provider.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound or fixtures cannot be created.
    pub async fn spawn_with_payments(payments: impl PaymentProvider + 'static) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let fixtures = seed(store.as_ref()).await;

        let state = AppState::new(
            store.clone(),
            Arc::new(payments),
            FeeSchedule::default(),
            CurrencyCode::USD,
        );

        let sessions = SessionManagerLayer::new(MemoryStore::default())
            .with_name(SESSION_COOKIE_NAME)
            .with_secure(false);

        let app = farmstand_marketplace::app(state)
            .merge(Router::new().route("/test/login/{user_id}", post(test_login)))
            .layer(sessions);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local address");

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Test server error");
        });

        Self {
            base_url: format!("http://{addr}"),
            store,
            fixtures,
            handle,
        }
    }

    /// Absolute URL for `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// A client without a session.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built.
    #[must_use]
    pub fn anonymous(&self) -> Client {
        Client::builder()
            .cookie_store(true)
            .build()
            .expect("Failed to create HTTP client")
    }

    /// A client signed in as `user_id`.
    ///
    /// # Panics
    ///
    /// Panics if the login request fails.
    pub async fn client_for(&self, user_id: UserId) -> Client {
        let client = self.anonymous();
        let resp = client
            .post(self.url(&format!("/test/login/{user_id}")))
            .send()
            .await
            .expect("Failed to log in");
        assert_eq!(resp.status(), reqwest::StatusCode::NO_CONTENT);
        client
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn test_login(session: Session, Path(user_id): Path<UserId>) -> StatusCode {
    match set_current_user(&session, user_id).await {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Read a decimal field serialized as a JSON string.
///
/// # Panics
///
/// Panics if the field is missing or not a decimal string.
#[must_use]
pub fn decimal(value: &Value, key: &str) -> Decimal {
    let raw = value[key]
        .as_str()
        .unwrap_or_else(|| panic!("{key} is not a string in {value}"));
    Decimal::from_str(raw).unwrap_or_else(|e| panic!("{key}={raw} is not a decimal: {e}"))
}

async fn user(store: &InMemoryStore, email: &str, name: &str) -> UserId {
    store
        .create_user(NewUser {
            email: email.to_string(),
            display_name: name.to_string(),
            location: None,
        })
        .await
        .expect("Failed to create user")
        .id
}

#[allow(clippy::too_many_arguments)]
async fn product(
    store: &InMemoryStore,
    producer_id: ProducerId,
    name: &str,
    price: Decimal,
    stock: i32,
    unit: &str,
    category: &str,
    tags: &[&str],
) -> Product {
    store
        .create_product(NewProduct {
            producer_id,
            name: name.to_string(),
            description: None,
            price,
            stock,
            unit: unit.to_string(),
            category: category.to_string(),
            tags: tags.iter().map(|t| (*t).to_string()).collect(),
        })
        .await
        .expect("Failed to create product")
}

async fn producer(
    store: &InMemoryStore,
    owner: UserId,
    farm_name: &str,
    location: Option<(f64, f64)>,
) -> ProducerId {
    let location =
        location.map(|(lat, lng)| Location::new(lat, lng).expect("valid fixture location"));
    store
        .create_producer(NewProducer {
            user_id: owner,
            farm_name: farm_name.to_string(),
            description: None,
            location,
            address: None,
        })
        .await
        .expect("Failed to create producer")
        .id
}

async fn seed(store: &InMemoryStore) -> Fixtures {
    let farmer = user(store, "ana@sunnyacres.example", "Ana").await;
    let dairy_farmer = user(store, "owen@hilltop.example", "Owen").await;
    let beekeeper = user(store, "mei@forestedge.example", "Mei").await;
    let berry_farmer = user(store, "sam@salemberries.example", "Sam").await;
    let buyer = user(store, "buyer@example.com", "Buyer").await;
    let other_buyer = user(store, "other@example.com", "Other").await;

    let sunny = producer(store, farmer, "Sunny Acres", Some(DOWNTOWN)).await;
    let hilltop = producer(
        store,
        dairy_farmer,
        "Hilltop Dairy",
        Some((45.3573, -122.6068)),
    )
    .await;
    let forest = producer(store, beekeeper, "Forest Edge Honey", None).await;
    let salem = producer(
        store,
        berry_farmer,
        "Salem Berries",
        Some((44.9429, -123.0351)),
    )
    .await;

    let chard = product(
        store,
        sunny,
        "Rainbow Chard",
        Decimal::new(350, 2),
        40,
        "bunch",
        "produce",
        &["organic", "greens"],
    )
    .await;
    let tomatoes = product(
        store,
        sunny,
        "Heirloom Tomatoes",
        Decimal::new(525, 2),
        60,
        "lb",
        "produce",
        &["organic"],
    )
    .await;
    let eggs = product(
        store,
        hilltop,
        "Duck Eggs",
        Decimal::new(900, 2),
        12,
        "dozen",
        "dairy",
        &["pasture-raised"],
    )
    .await;
    let honey = product(
        store,
        forest,
        "Wildflower Honey",
        Decimal::new(1250, 2),
        30,
        "jar",
        "pantry",
        &["raw", "local"],
    )
    .await;
    let berries = product(
        store,
        salem,
        "Marionberries",
        Decimal::new(600, 2),
        5,
        "pint",
        "produce",
        &["local"],
    )
    .await;
    let peas = product(
        store,
        sunny,
        "Snap Peas",
        Decimal::new(400, 2),
        10,
        "lb",
        "produce",
        &[],
    )
    .await;
    let peas = store
        .update_product(
            peas.id,
            &ProductPatch {
                available: Some(false),
                ..ProductPatch::default()
            },
        )
        .await
        .expect("Failed to mark peas unavailable");

    Fixtures {
        farmer,
        dairy_farmer,
        buyer,
        other_buyer,
        chard,
        tomatoes,
        eggs,
        honey,
        berries,
        peas,
    }
}
