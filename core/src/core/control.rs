// tokencart_flow/src/core/control.rs

//! Flow-control signals returned by handlers and the outcome of a whole run.

/// Signal from a handler indicating whether the pipeline should continue or stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineControl {
  Continue,
  /// Halt the run without error. Remaining handlers and steps are not executed.
  Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineResult {
  /// Every step that was not skipped ran to the end.
  Completed,
  /// A handler returned `PipelineControl::Stop`.
  Stopped,
}

/// A best-effort step whose handler returned an error.
#[derive(Debug)]
pub struct StepFailure<Err> {
  pub step: String,
  pub error: Err,
}

/// What a successful (non-erroring) run produced.
///
/// `failures` lists, in execution order, the best-effort steps that failed. A run
/// can be `Completed` and still carry failures: that is the "degraded" case.
#[derive(Debug)]
pub struct PipelineOutcome<Err> {
  pub result: PipelineResult,
  pub failures: Vec<StepFailure<Err>>,
}

impl<Err> PipelineOutcome<Err> {
  pub fn is_degraded(&self) -> bool {
    !self.failures.is_empty()
  }

  /// Returns the recorded failure for `step`, if that step failed.
  pub fn failure_for(&self, step: &str) -> Option<&Err> {
    self.failures.iter().find(|f| f.step == step).map(|f| &f.error)
  }
}
