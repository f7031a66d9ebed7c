//! `PostgreSQL` store for the `marketplace` schema.
//!
//! Queries are checked at runtime (`query_as` + `FromRow`) so the crate
//! builds without a live database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};

use farmstand_core::{
    CartItemId, DeliveryOption, FeeCalculation, Location, OrderId, OrderItemId, OrderStatus,
    Producer, ProducerId, Product, ProductId, SearchCandidate, UserId,
};

use super::{MarketplaceStore, NewProducer, NewProduct, ProductPatch, RepositoryError};
use crate::models::{CartItem, CartLine, NewOrder, NewOrderItem, NewUser, Order, OrderItem, User};

const PRODUCT_COLUMNS: &str = "p.id, p.producer_id, p.name, p.description, p.price, p.stock, \
     p.unit, p.category, p.tags, p.available, p.created_at";

const ORDER_COLUMNS: &str = "id, user_id, status, delivery_option, subtotal, delivery_fee, \
     platform_fee, processing_fee, total, payment_client_secret, notes, created_at";

/// Store backed by a `PostgreSQL` pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// =============================================================================
// Row types
// =============================================================================

fn location_from(
    latitude: Option<f64>,
    longitude: Option<f64>,
) -> Result<Option<Location>, RepositoryError> {
    match (latitude, longitude) {
        (Some(lat), Some(lng)) => Location::new(lat, lng)
            .map(Some)
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid location: {e}"))),
        (None, None) => Ok(None),
        _ => Err(RepositoryError::DataCorruption(
            "location has only one coordinate".to_owned(),
        )),
    }
}

#[derive(FromRow)]
struct UserRow {
    id: i32,
    email: String,
    display_name: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: UserId::new(r.id),
            email: r.email,
            display_name: r.display_name,
            location: location_from(r.latitude, r.longitude)?,
            created_at: r.created_at,
        })
    }
}

#[derive(FromRow)]
struct ProducerRow {
    id: i32,
    user_id: i32,
    farm_name: String,
    description: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    address: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProducerRow> for Producer {
    type Error = RepositoryError;

    fn try_from(r: ProducerRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ProducerId::new(r.id),
            user_id: UserId::new(r.user_id),
            farm_name: r.farm_name,
            description: r.description,
            location: location_from(r.latitude, r.longitude)?,
            address: r.address,
            created_at: r.created_at,
        })
    }
}

#[derive(FromRow)]
struct ProductRow {
    id: i32,
    producer_id: i32,
    name: String,
    description: Option<String>,
    price: Decimal,
    stock: i32,
    unit: String,
    category: String,
    tags: Vec<String>,
    available: bool,
    created_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(r: ProductRow) -> Self {
        Self {
            id: ProductId::new(r.id),
            producer_id: ProducerId::new(r.producer_id),
            name: r.name,
            description: r.description,
            price: r.price,
            stock: r.stock,
            unit: r.unit,
            category: r.category,
            tags: r.tags,
            available: r.available,
            created_at: r.created_at,
        }
    }
}

/// Product joined with its producer, for search.
#[derive(FromRow)]
struct JoinedProductRow {
    #[sqlx(flatten)]
    product: ProductRow,
    producer_user_id: i32,
    farm_name: String,
    producer_description: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    address: Option<String>,
    producer_created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct CartItemRow {
    id: i32,
    user_id: i32,
    product_id: i32,
    quantity: i32,
    added_at: DateTime<Utc>,
}

impl From<CartItemRow> for CartItem {
    fn from(r: CartItemRow) -> Self {
        Self {
            id: CartItemId::new(r.id),
            user_id: UserId::new(r.user_id),
            product_id: ProductId::new(r.product_id),
            quantity: r.quantity,
            added_at: r.added_at,
        }
    }
}

#[derive(FromRow)]
struct CartLineRow {
    cart_item_id: i32,
    cart_user_id: i32,
    quantity: i32,
    added_at: DateTime<Utc>,
    #[sqlx(flatten)]
    product: ProductRow,
}

#[derive(FromRow)]
struct OrderRow {
    id: i32,
    user_id: i32,
    status: String,
    delivery_option: String,
    subtotal: Decimal,
    delivery_fee: Decimal,
    platform_fee: Decimal,
    processing_fee: Decimal,
    total: Decimal,
    payment_client_secret: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(r: OrderRow) -> Result<Self, Self::Error> {
        let status = r
            .status
            .parse::<OrderStatus>()
            .map_err(RepositoryError::DataCorruption)?;
        let delivery_option = DeliveryOption::parse(&r.delivery_option);
        if !delivery_option.is_recognized() {
            return Err(RepositoryError::DataCorruption(format!(
                "invalid delivery option in database: {}",
                r.delivery_option
            )));
        }

        Ok(Self {
            id: OrderId::new(r.id),
            user_id: UserId::new(r.user_id),
            status,
            delivery_option,
            fees: FeeCalculation {
                subtotal: r.subtotal,
                delivery_fee: r.delivery_fee,
                platform_fee: r.platform_fee,
                processing_fee: r.processing_fee,
                total: r.total,
            },
            payment_client_secret: r.payment_client_secret,
            notes: r.notes,
            created_at: r.created_at,
        })
    }
}

#[derive(FromRow)]
struct OrderItemRow {
    id: i32,
    order_id: i32,
    product_id: i32,
    producer_id: i32,
    product_name: String,
    quantity: i32,
    unit_price: Decimal,
    line_total: Decimal,
}

impl From<OrderItemRow> for OrderItem {
    fn from(r: OrderItemRow) -> Self {
        Self {
            id: OrderItemId::new(r.id),
            order_id: OrderId::new(r.order_id),
            product_id: ProductId::new(r.product_id),
            producer_id: ProducerId::new(r.producer_id),
            product_name: r.product_name,
            quantity: r.quantity,
            unit_price: r.unit_price,
            line_total: r.line_total,
        }
    }
}

fn map_unique_violation(e: sqlx::Error, message: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(message.to_owned());
    }
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_foreign_key_violation()
    {
        return RepositoryError::NotFound;
    }
    RepositoryError::Database(e)
}

// =============================================================================
// Store
// =============================================================================

#[async_trait]
impl MarketplaceStore for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn create_user(&self, new: NewUser) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO marketplace.user (email, display_name, latitude, longitude)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, display_name, latitude, longitude, created_at
            ",
        )
        .bind(&new.email)
        .bind(&new.display_name)
        .bind(new.location.map(|l| l.latitude()))
        .bind(new.location.map(|l| l.longitude()))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "email already exists"))?;

        row.try_into()
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, email, display_name, latitude, longitude, created_at
            FROM marketplace.user
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn create_producer(&self, new: NewProducer) -> Result<Producer, RepositoryError> {
        let row = sqlx::query_as::<_, ProducerRow>(
            r"
            INSERT INTO marketplace.producer
                (user_id, farm_name, description, latitude, longitude, address)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, farm_name, description, latitude, longitude, address, created_at
            ",
        )
        .bind(new.user_id)
        .bind(&new.farm_name)
        .bind(&new.description)
        .bind(new.location.map(|l| l.latitude()))
        .bind(new.location.map(|l| l.longitude()))
        .bind(&new.address)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "producer already exists"))?;

        row.try_into()
    }

    async fn get_producer(&self, id: ProducerId) -> Result<Option<Producer>, RepositoryError> {
        sqlx::query_as::<_, ProducerRow>(
            r"
            SELECT id, user_id, farm_name, description, latitude, longitude, address, created_at
            FROM marketplace.producer
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(Producer::try_from)
        .transpose()
    }

    async fn create_product(&self, new: NewProduct) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            INSERT INTO marketplace.product AS p
                (producer_id, name, description, price, stock, unit, category, tags)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(new.producer_id)
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.price)
        .bind(new.stock)
        .bind(&new.unit)
        .bind(&new.category)
        .bind(&new.tags)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "product already exists"))?;

        Ok(row.into())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM marketplace.product p WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    async fn update_product(
        &self,
        id: ProductId,
        patch: &ProductPatch,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            UPDATE marketplace.product AS p
            SET price = COALESCE($2, p.price),
                stock = COALESCE($3, p.stock),
                available = COALESCE($4, p.available)
            WHERE p.id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(patch.price)
        .bind(patch.stock)
        .bind(patch.available)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    async fn list_search_candidates(&self) -> Result<Vec<SearchCandidate>, RepositoryError> {
        let rows = sqlx::query_as::<_, JoinedProductRow>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS},
                   pr.user_id AS producer_user_id,
                   pr.farm_name,
                   pr.description AS producer_description,
                   pr.latitude,
                   pr.longitude,
                   pr.address,
                   pr.created_at AS producer_created_at
            FROM marketplace.product p
            JOIN marketplace.producer pr ON pr.id = p.producer_id
            WHERE p.available
            "
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                let producer = Producer {
                    id: ProducerId::new(r.product.producer_id),
                    user_id: UserId::new(r.producer_user_id),
                    farm_name: r.farm_name,
                    description: r.producer_description,
                    location: location_from(r.latitude, r.longitude)?,
                    address: r.address,
                    created_at: r.producer_created_at,
                };
                Ok(SearchCandidate {
                    product: r.product.into(),
                    producer,
                })
            })
            .collect()
    }

    async fn get_cart_items(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartLineRow>(&format!(
            r"
            SELECT c.id AS cart_item_id, c.user_id AS cart_user_id, c.quantity, c.added_at,
                   {PRODUCT_COLUMNS}
            FROM marketplace.cart_item c
            JOIN marketplace.product p ON p.id = c.product_id
            WHERE c.user_id = $1
            ORDER BY c.added_at, c.id
            "
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| CartLine {
                item: CartItem {
                    id: CartItemId::new(r.cart_item_id),
                    user_id: UserId::new(r.cart_user_id),
                    product_id: ProductId::new(r.product.id),
                    quantity: r.quantity,
                    added_at: r.added_at,
                },
                product: r.product.into(),
            })
            .collect())
    }

    async fn get_cart_item(&self, id: CartItemId) -> Result<Option<CartItem>, RepositoryError> {
        let row = sqlx::query_as::<_, CartItemRow>(
            r"
            SELECT id, user_id, product_id, quantity, added_at
            FROM marketplace.cart_item
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(CartItem::from))
    }

    async fn add_cart_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartItem, RepositoryError> {
        let row = sqlx::query_as::<_, CartItemRow>(
            r"
            INSERT INTO marketplace.cart_item AS c (user_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, product_id)
            DO UPDATE SET quantity = c.quantity + EXCLUDED.quantity
            RETURNING id, user_id, product_id, quantity, added_at
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "cart item already exists"))?;

        Ok(row.into())
    }

    async fn remove_cart_item(&self, id: CartItemId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM marketplace.cart_item WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM marketplace.cart_item WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn place_order(
        &self,
        order: NewOrder,
        items: Vec<NewOrderItem>,
    ) -> Result<Order, RepositoryError> {
        // Dropping `tx` on any early return rolls the whole checkout back
        let mut tx = self.pool.begin().await?;

        // Lock the user's cart so a concurrent checkout of the same lines waits
        // here, then sees them gone
        let cart = sqlx::query_as::<_, CartItemRow>(
            r"
            SELECT id, user_id, product_id, quantity, added_at
            FROM marketplace.cart_item
            WHERE user_id = $1
            FOR UPDATE
            ",
        )
        .bind(order.user_id)
        .fetch_all(&mut *tx)
        .await?;
        let priced_lines_intact = items.iter().all(|item| {
            cart.iter().any(|line| {
                line.id == item.cart_item_id.as_i32()
                    && line.product_id == item.product_id.as_i32()
                    && line.quantity == item.quantity
            })
        });
        if !priced_lines_intact {
            return Err(super::cart_changed());
        }

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            INSERT INTO marketplace."order"
                (user_id, status, delivery_option, subtotal, delivery_fee,
                 platform_fee, processing_fee, total, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order.user_id)
        .bind(OrderStatus::Pending.as_str())
        .bind(order.delivery_option.as_str())
        .bind(order.fees.subtotal)
        .bind(order.fees.delivery_fee)
        .bind(order.fees.platform_fee)
        .bind(order.fees.processing_fee)
        .bind(order.fees.total)
        .bind(&order.notes)
        .fetch_one(&mut *tx)
        .await?;
        let created = Order::try_from(row)?;

        for item in &items {
            sqlx::query(
                r#"
                INSERT INTO marketplace.order_item
                    (order_id, product_id, producer_id, product_name, quantity, unit_price, line_total)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(created.id)
            .bind(item.product_id)
            .bind(item.producer_id)
            .bind(&item.product_name)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.line_total)
            .execute(&mut *tx)
            .await?;

            let updated = sqlx::query(
                r"
                UPDATE marketplace.product
                SET stock = stock - $2
                WHERE id = $1 AND stock >= $2
                ",
            )
            .bind(item.product_id)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                return Err(RepositoryError::Conflict(format!(
                    "insufficient stock for product {}",
                    item.product_id
                )));
            }
        }

        let consumed: Vec<i32> = items.iter().map(|i| i.cart_item_id.as_i32()).collect();
        sqlx::query("DELETE FROM marketplace.cart_item WHERE id = ANY($1)")
            .bind(&consumed)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        sqlx::query_as::<_, OrderRow>(&format!(
            r#"SELECT {ORDER_COLUMNS} FROM marketplace."order" WHERE id = $1"#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(Order::try_from)
        .transpose()
    }

    async fn get_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderItemRow>(
            r"
            SELECT id, order_id, product_id, producer_id, product_name, quantity,
                   unit_price, line_total
            FROM marketplace.order_item
            WHERE order_id = $1
            ORDER BY id
            ",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(OrderItem::from).collect())
    }

    async fn list_orders(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM marketplace."order"
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Order::try_from).collect()
    }

    async fn set_payment_secret(
        &self,
        order_id: OrderId,
        client_secret: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"UPDATE marketplace."order" SET payment_client_secret = $2 WHERE id = $1"#,
        )
        .bind(order_id)
        .bind(client_secret)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_from_requires_both_coordinates() {
        assert!(matches!(location_from(None, None), Ok(None)));
        assert!(matches!(location_from(Some(45.0), Some(-122.0)), Ok(Some(_))));
        assert!(matches!(
            location_from(Some(45.0), None),
            Err(RepositoryError::DataCorruption(_))
        ));
        assert!(matches!(
            location_from(Some(95.0), Some(0.0)),
            Err(RepositoryError::DataCorruption(_))
        ));
    }
}
