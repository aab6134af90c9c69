// tokencart_flow/src/error.rs
use thiserror::Error;

/// Errors raised by the engine itself, as opposed to errors raised by step handlers.
///
/// Every handler error type used with a [`crate::Pipeline`] must be `From<FlowError>`
/// so that configuration problems surface through the same channel as handler failures.
#[derive(Debug, Error)]
pub enum FlowError {
  #[error("Step not found: {step_name}")]
  StepNotFound { step_name: String },

  #[error("Handler missing for fatal step: {step_name}")]
  HandlerMissing { step_name: String },

  #[error("Step defined twice: {step_name}")]
  DuplicateStep { step_name: String },
}

pub type FlowResult<T, E = FlowError> = std::result::Result<T, E>;
