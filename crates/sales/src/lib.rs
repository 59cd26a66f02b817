//! Orders and carts.
//!
//! Pure domain logic for checkout: cart validation, capturing unit prices onto
//! order items, totals and the order status lifecycle. Stock checks and
//! persistence live in `storefront-infra`.

pub mod cart;
pub mod order;

pub use cart::{Cart, CartLine};
pub use order::{Order, OrderItem, OrderStatus};
