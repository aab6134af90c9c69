// tokencart_service/src/pipelines/mod.rs

//! The checkout pipeline and the orchestrator that runs it.

pub mod checkout_pipeline;
pub mod contexts;
pub mod orchestrator;
pub mod validation;

pub use contexts::{CheckoutCtxData, CheckoutServices, CheckoutStage};
pub use orchestrator::{CheckoutOrchestrator, CheckoutReceipt};
