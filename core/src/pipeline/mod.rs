// tokencart_flow/src/pipeline/mod.rs

//! `Pipeline` definition, handler registration and execution.

pub mod definition;
pub mod execution;
pub mod hooks;

pub use definition::Pipeline;
