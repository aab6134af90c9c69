// tokencart_flow/src/pipeline/execution.rs

//! `Pipeline::run`: executes the steps in order and applies each step's `StepKind`
//! to the errors its handlers return.

use crate::core::context_data::ContextData;
use crate::core::control::{PipelineControl, PipelineOutcome, PipelineResult, StepFailure};
use crate::core::step::{StepDef, StepKind};
use crate::error::FlowError;
use crate::pipeline::definition::Pipeline;
use tracing::{event, instrument, span, Instrument, Level};

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Runs every step against `ctx_data`, strictly one after the other.
  ///
  /// - A failing `Fatal` step ends the run with `Err`.
  /// - A failing `BestEffort` step is recorded in `PipelineOutcome::failures`;
  ///   the remaining handlers of that step are not run, the next step is.
  /// - A handler returning `PipelineControl::Stop` ends the run with `PipelineResult::Stopped`.
  #[instrument(
    name = "Pipeline::run",
    skip_all,
    fields(
      context_type = %std::any::type_name::<TData>(),
      num_steps = self.steps.len(),
    ),
    err(Display)
  )]
  pub async fn run(&self, ctx_data: ContextData<TData>) -> Result<PipelineOutcome<Err>, Err> {
    event!(Level::DEBUG, "Pipeline execution starting.");
    let mut failures = Vec::new();

    for (step_idx, step_def) in self.steps.iter().enumerate() {
      let step_span = span!(
        Level::INFO,
        "pipeline_step",
        step_name = step_def.name.as_str(),
        step_index = step_idx,
        kind = ?step_def.kind
      );

      let step_result = self
        .run_step(step_def, ctx_data.clone())
        .instrument(step_span.clone())
        .await;

      match step_result {
        Ok(PipelineControl::Continue) => {}
        Ok(PipelineControl::Stop) => {
          event!(parent: &step_span, Level::INFO, "Pipeline stopped by a handler.");
          return Ok(PipelineOutcome {
            result: PipelineResult::Stopped,
            failures,
          });
        }
        Err(e) => match step_def.kind {
          StepKind::Fatal => {
            event!(parent: &step_span, Level::ERROR, error = %e, "Fatal step failed.");
            return Err(e);
          }
          StepKind::BestEffort => {
            event!(parent: &step_span, Level::WARN, error = %e, "Best-effort step failed, continuing.");
            failures.push(StepFailure {
              step: step_def.name.clone(),
              error: e,
            });
          }
        },
      }
    }

    event!(
      Level::DEBUG,
      degraded = !failures.is_empty(),
      "Pipeline execution completed."
    );
    Ok(PipelineOutcome {
      result: PipelineResult::Completed,
      failures,
    })
  }

  async fn run_step(&self, step_def: &StepDef<TData>, ctx_data: ContextData<TData>) -> Result<PipelineControl, Err> {
    if let Some(skip_if) = &step_def.skip_if {
      if skip_if(ctx_data.clone()) {
        event!(Level::INFO, "Step skipped.");
        return Ok(PipelineControl::Continue);
      }
    }

    let name = step_def.name.as_str();
    let on_handlers = self.on.get(name).map(Vec::as_slice).unwrap_or(&[]);
    let after_handlers = self.after.get(name).map(Vec::as_slice).unwrap_or(&[]);

    if on_handlers.is_empty() && after_handlers.is_empty() {
      return match step_def.kind {
        StepKind::BestEffort => {
          event!(Level::DEBUG, "Best-effort step has no handlers, skipping.");
          Ok(PipelineControl::Continue)
        }
        StepKind::Fatal => Err(Err::from(FlowError::HandlerMissing {
          step_name: step_def.name.clone(),
        })),
      };
    }

    for (phase, handlers) in [("on", on_handlers), ("after", after_handlers)] {
      for (handler_idx, handler_fn) in handlers.iter().enumerate() {
        event!(Level::TRACE, phase, handler_index = handler_idx, "Executing handler.");
        if handler_fn(ctx_data.clone()).await? == PipelineControl::Stop {
          event!(Level::DEBUG, phase, handler_index = handler_idx, "Handler requested stop.");
          return Ok(PipelineControl::Stop);
        }
      }
    }

    Ok(PipelineControl::Continue)
  }
}
