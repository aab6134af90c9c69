// tokencart_service/src/services/mod.rs

pub mod catalog;
pub mod discounts;
pub mod notifications;
pub mod order_ledger;
pub mod payment;
pub mod token_ledger;

pub use catalog::Catalog;
pub use discounts::DiscountAccounting;
pub use notifications::NotificationDispatcher;
pub use order_ledger::OrderLedger;
pub use payment::PaymentGateways;
pub use token_ledger::TokenLedger;
