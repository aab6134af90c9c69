// tokencart_service/src/web/handlers/mod.rs

pub mod auth;
pub mod order_handlers;
pub mod paypal_handlers;

pub use auth::AuthenticatedAccount;
