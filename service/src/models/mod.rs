// tokencart_service/src/models/mod.rs

//! Data structures for stored rows and checkout values.

pub mod checkout;
pub mod customer;
pub mod discount_code;
pub mod money;
pub mod order;
pub mod product;

pub use checkout::{CheckoutRequest, OrderDraft};
pub use customer::CustomerSnapshot;
pub use discount_code::DiscountCode;
pub use money::Money;
pub use order::{LineItem, NewOrder, Order, OrderStatus, OrderSummary, PaymentMethodKind};
pub use product::Product;
