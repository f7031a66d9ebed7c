//! Domain models for the marketplace service.
//!
//! Catalog types (`Producer`, `Product`) live in `farmstand-core` because the
//! search engine works on them; the types here only matter to carts and
//! orders.

pub mod cart;
pub mod order;
pub mod user;

pub use cart::{CartItem, CartLine, cart_subtotal};
pub use order::{NewOrder, NewOrderItem, Order, OrderItem};
pub use user::{NewUser, User};

/// Session keys used by the marketplace.
///
/// The session is populated by the account service at sign-in; this service
/// only reads it.
pub mod session_keys {
    /// `UserId` of the signed-in user.
    pub const CURRENT_USER_ID: &str = "current_user_id";
}
