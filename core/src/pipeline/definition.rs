// tokencart_flow/src/pipeline/definition.rs

//! The `Pipeline<TData, Err>` struct and its construction.

use crate::core::step::{Handler, SkipCondition, StepDef, StepKind};
use crate::error::{FlowError, FlowResult};
use std::collections::HashMap;

/// An ordered set of steps over the context type `TData`, whose handlers fail with `Err`.
///
/// `Err` must be `From<FlowError>` so the engine can report configuration problems
/// (for example a fatal step with no handler) through the caller's own error type.
pub struct Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub(crate) steps: Vec<StepDef<TData>>,
  pub(crate) on: HashMap<String, Vec<Handler<TData, Err>>>,
  pub(crate) after: HashMap<String, Vec<Handler<TData, Err>>>,
}

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Creates a pipeline from `(name, kind, skip_if)` triples, in execution order.
  pub fn new(step_defs: &[(&str, StepKind, Option<SkipCondition<TData>>)]) -> FlowResult<Self> {
    let mut steps: Vec<StepDef<TData>> = Vec::with_capacity(step_defs.len());
    for (name, kind, skip_if) in step_defs {
      if steps.iter().any(|s| s.name == *name) {
        return Err(FlowError::DuplicateStep {
          step_name: (*name).to_string(),
        });
      }
      steps.push(StepDef {
        name: (*name).to_string(),
        kind: *kind,
        skip_if: skip_if.clone(),
      });
    }

    Ok(Self {
      steps,
      on: HashMap::new(),
      after: HashMap::new(),
    })
  }

  pub fn step_names(&self) -> Vec<&str> {
    self.steps.iter().map(|s| s.name.as_str()).collect()
  }

  pub fn step_kind(&self, step_name: &str) -> FlowResult<StepKind> {
    self
      .steps
      .iter()
      .find(|s| s.name == step_name)
      .map(|s| s.kind)
      .ok_or_else(|| FlowError::StepNotFound {
        step_name: step_name.to_string(),
      })
  }

  pub(crate) fn ensure_step_exists(&self, step_name: &str) -> FlowResult<()> {
    self.step_kind(step_name).map(|_| ())
  }
}
