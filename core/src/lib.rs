// tokencart_flow/src/lib.rs

//! tokencart_flow: a small asynchronous step engine.
//!
//! A [`Pipeline`] is an ordered list of named steps that all operate on one shared
//! context, wrapped in [`ContextData`]. Every step declares how its failures are
//! treated:
//!  - [`StepKind::Fatal`] steps short-circuit the run and hand their error back to the caller.
//!  - [`StepKind::BestEffort`] steps have their error logged and recorded in the
//!    [`PipelineOutcome`], after which the run carries on with the next step.
//!
//! Steps can be skipped with a predicate, and any handler can halt the run cleanly
//! by returning [`PipelineControl::Stop`].

pub mod core;
pub mod error;
pub mod pipeline;

pub use crate::core::context_data::ContextData;
pub use crate::core::control::{PipelineControl, PipelineOutcome, PipelineResult, StepFailure};
pub use crate::core::step::{Handler, SkipCondition, StepDef, StepKind};
pub use crate::error::{FlowError, FlowResult};
pub use crate::pipeline::Pipeline;

/*
    Typical use:
    1. Define a context struct `MyCtx` and an error type `MyErr: From<FlowError>`.
    2. Build a `Pipeline<MyCtx, MyErr>` from `(name, StepKind, skip_if)` triples.
    3. Attach handlers with `.on(step, ..)` and, where a step needs a post-check, `.after(step, ..)`.
    4. Wrap a fresh context in `ContextData::new(..)` and `run` it.
    5. Inspect `outcome.result` and `outcome.failures` for the non-fatal steps that failed.
*/
