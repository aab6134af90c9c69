pub mod context_data;
pub mod control;
pub mod step;

pub use context_data::ContextData;
pub use control::{PipelineControl, PipelineOutcome, PipelineResult, StepFailure};
pub use step::{Handler, StepDef, StepKind};
