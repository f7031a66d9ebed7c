//! In-process store backed by maps behind a single lock.
//!
//! Every operation takes the lock once, so `place_order` is atomic with
//! respect to every other call, mirroring the transaction in [`super::PgStore`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use farmstand_core::{
    CartItemId, OrderId, OrderItemId, OrderStatus, Producer, ProducerId, Product, ProductId,
    SearchCandidate, UserId,
};

use super::{MarketplaceStore, NewProducer, NewProduct, ProductPatch, RepositoryError};
use crate::models::{CartItem, CartLine, NewOrder, NewOrderItem, NewUser, Order, OrderItem, User};

#[derive(Default)]
struct Tables {
    next_id: i32,
    users: BTreeMap<UserId, User>,
    producers: BTreeMap<ProducerId, Producer>,
    products: BTreeMap<ProductId, Product>,
    cart_items: BTreeMap<CartItemId, CartItem>,
    orders: BTreeMap<OrderId, Order>,
    order_items: BTreeMap<OrderItemId, OrderItem>,
}

impl Tables {
    const fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}

/// Store for tests and local demos. Data is lost on drop.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MarketplaceStore for InMemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn create_user(&self, new: NewUser) -> Result<User, RepositoryError> {
        let mut t = self.tables.lock();
        if t.users.values().any(|u| u.email.eq_ignore_ascii_case(&new.email)) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }
        let user = User {
            id: UserId::new(t.next_id()),
            email: new.email,
            display_name: new.display_name,
            location: new.location,
            created_at: Utc::now(),
        };
        t.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.tables.lock().users.get(&id).cloned())
    }

    async fn create_producer(&self, new: NewProducer) -> Result<Producer, RepositoryError> {
        let mut t = self.tables.lock();
        if !t.users.contains_key(&new.user_id) {
            return Err(RepositoryError::NotFound);
        }
        let producer = Producer {
            id: ProducerId::new(t.next_id()),
            user_id: new.user_id,
            farm_name: new.farm_name,
            description: new.description,
            location: new.location,
            address: new.address,
            created_at: Utc::now(),
        };
        t.producers.insert(producer.id, producer.clone());
        Ok(producer)
    }

    async fn get_producer(&self, id: ProducerId) -> Result<Option<Producer>, RepositoryError> {
        Ok(self.tables.lock().producers.get(&id).cloned())
    }

    async fn create_product(&self, new: NewProduct) -> Result<Product, RepositoryError> {
        let mut t = self.tables.lock();
        if !t.producers.contains_key(&new.producer_id) {
            return Err(RepositoryError::NotFound);
        }
        let product = Product {
            id: ProductId::new(t.next_id()),
            producer_id: new.producer_id,
            name: new.name,
            description: new.description,
            price: new.price,
            stock: new.stock,
            unit: new.unit,
            category: new.category,
            tags: new.tags,
            available: true,
            created_at: Utc::now(),
        };
        t.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.tables.lock().products.get(&id).cloned())
    }

    async fn update_product(
        &self,
        id: ProductId,
        patch: &ProductPatch,
    ) -> Result<Product, RepositoryError> {
        let mut t = self.tables.lock();
        let product = t.products.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        if let Some(price) = patch.price {
            product.price = price;
        }
        if let Some(stock) = patch.stock {
            product.stock = stock;
        }
        if let Some(available) = patch.available {
            product.available = available;
        }
        Ok(product.clone())
    }

    async fn list_search_candidates(&self) -> Result<Vec<SearchCandidate>, RepositoryError> {
        let t = self.tables.lock();
        t.products
            .values()
            .filter(|p| p.available)
            .map(|p| {
                let producer = t.producers.get(&p.producer_id).ok_or_else(|| {
                    RepositoryError::DataCorruption(format!(
                        "product {} references missing producer {}",
                        p.id, p.producer_id
                    ))
                })?;
                Ok(SearchCandidate {
                    product: p.clone(),
                    producer: producer.clone(),
                })
            })
            .collect()
    }

    async fn get_cart_items(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let t = self.tables.lock();
        t.cart_items
            .values()
            .filter(|i| i.user_id == user_id)
            .map(|i| {
                let product = t.products.get(&i.product_id).ok_or_else(|| {
                    RepositoryError::DataCorruption(format!(
                        "cart item {} references missing product {}",
                        i.id, i.product_id
                    ))
                })?;
                Ok(CartLine {
                    item: i.clone(),
                    product: product.clone(),
                })
            })
            .collect()
    }

    async fn get_cart_item(&self, id: CartItemId) -> Result<Option<CartItem>, RepositoryError> {
        Ok(self.tables.lock().cart_items.get(&id).cloned())
    }

    async fn add_cart_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartItem, RepositoryError> {
        let mut t = self.tables.lock();
        if !t.products.contains_key(&product_id) {
            return Err(RepositoryError::NotFound);
        }
        if let Some(existing) = t
            .cart_items
            .values_mut()
            .find(|i| i.user_id == user_id && i.product_id == product_id)
        {
            existing.quantity = existing.quantity.saturating_add(quantity);
            return Ok(existing.clone());
        }
        let item = CartItem {
            id: CartItemId::new(t.next_id()),
            user_id,
            product_id,
            quantity,
            added_at: Utc::now(),
        };
        t.cart_items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn remove_cart_item(&self, id: CartItemId) -> Result<(), RepositoryError> {
        self.tables
            .lock()
            .cart_items
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<(), RepositoryError> {
        self.tables
            .lock()
            .cart_items
            .retain(|_, i| i.user_id != user_id);
        Ok(())
    }

    async fn place_order(
        &self,
        order: NewOrder,
        items: Vec<NewOrderItem>,
    ) -> Result<Order, RepositoryError> {
        let mut t = self.tables.lock();

        // Validate everything before the first write so a failure leaves no trace
        for item in &items {
            let priced_line_intact = t.cart_items.get(&item.cart_item_id).is_some_and(|line| {
                line.user_id == order.user_id
                    && line.product_id == item.product_id
                    && line.quantity == item.quantity
            });
            if !priced_line_intact {
                return Err(super::cart_changed());
            }
            let product = t
                .products
                .get(&item.product_id)
                .ok_or(RepositoryError::NotFound)?;
            if product.stock < item.quantity {
                return Err(RepositoryError::Conflict(format!(
                    "insufficient stock for product {}",
                    item.product_id
                )));
            }
        }

        let order = Order {
            id: OrderId::new(t.next_id()),
            user_id: order.user_id,
            status: OrderStatus::Pending,
            delivery_option: order.delivery_option,
            fees: order.fees,
            payment_client_secret: None,
            notes: order.notes,
            created_at: Utc::now(),
        };

        for item in items {
            t.cart_items.remove(&item.cart_item_id);
            if let Some(product) = t.products.get_mut(&item.product_id) {
                product.stock -= item.quantity;
            }
            let row = OrderItem {
                id: OrderItemId::new(t.next_id()),
                order_id: order.id,
                product_id: item.product_id,
                producer_id: item.producer_id,
                product_name: item.product_name,
                quantity: item.quantity,
                unit_price: item.unit_price,
                line_total: item.line_total,
            };
            t.order_items.insert(row.id, row);
        }

        t.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.tables.lock().orders.get(&id).cloned())
    }

    async fn get_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        Ok(self
            .tables
            .lock()
            .order_items
            .values()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn list_orders(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let t = self.tables.lock();
        let mut orders: Vec<Order> = t
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn set_payment_secret(
        &self,
        order_id: OrderId,
        client_secret: &str,
    ) -> Result<(), RepositoryError> {
        let mut t = self.tables.lock();
        let order = t.orders.get_mut(&order_id).ok_or(RepositoryError::NotFound)?;
        order.payment_client_secret = Some(client_secret.to_owned());
        Ok(())
    }
}
