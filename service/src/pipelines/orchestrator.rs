// tokencart_service/src/pipelines/orchestrator.rs

use crate::errors::{AppError, Result as AppResult};
use crate::models::{CheckoutRequest, OrderSummary};
use crate::pipelines::checkout_pipeline::build_checkout_pipeline;
use crate::pipelines::contexts::{CheckoutCtxData, CheckoutServices, CheckoutStage};
use crate::services::catalog::tokens_for_items;
use crate::services::token_ledger::TokenGrant;
use serde::Serialize;
use tokencart_flow::{ContextData, Pipeline};
use tracing::{info, instrument, warn};

/// What a completed checkout reports back to the client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutReceipt {
  pub order: OrderSummary,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub tokens_added: Option<i64>,
  pub email_sent: bool,
  #[serde(skip_serializing_if = "std::ops::Not::not")]
  pub replayed: bool,
  #[serde(skip)]
  pub synthetic_payment: bool,
  /// Best-effort steps that failed; visible in logs, not to the customer.
  #[serde(skip)]
  pub degraded_steps: Vec<String>,
}

/// Runs checkouts through the step pipeline and owns the services they use.
pub struct CheckoutOrchestrator {
  pipeline: Pipeline<CheckoutCtxData, AppError>,
  services: CheckoutServices,
}

impl CheckoutOrchestrator {
  pub fn new(services: CheckoutServices) -> AppResult<Self> {
    Ok(Self {
      pipeline: build_checkout_pipeline()?,
      services,
    })
  }

  #[instrument(name = "CheckoutOrchestrator::process", skip(self, request), fields(%account_id))]
  pub async fn process(&self, account_id: &str, request: CheckoutRequest) -> AppResult<CheckoutReceipt> {
    let ctx_data = ContextData::new(CheckoutCtxData::new(
      self.services.clone(),
      account_id.to_string(),
      request,
    ));

    let outcome = match self.pipeline.run(ctx_data.clone()).await {
      Ok(outcome) => outcome,
      Err(e) => {
        let mut guard = ctx_data.write();
        let aborted_from = guard.stage;
        guard.stage = CheckoutStage::Aborted;
        warn!(?aborted_from, error = %e, "Checkout aborted.");
        return Err(e);
      }
    };
    let degraded_steps: Vec<String> = outcome.failures.iter().map(|f| f.step.clone()).collect();
    let mut guard = ctx_data.write();
    guard.stage = CheckoutStage::Done;
    // No checkout step stops the run early, so a completed run has persisted its order.
    let order = guard
      .order
      .as_ref()
      .ok_or_else(|| AppError::Internal("Checkout completed without an order".to_string()))?;
    if degraded_steps.is_empty() {
      info!(order_number = %order.order_number, replayed = guard.replayed, "Checkout completed.");
    } else {
      warn!(order_number = %order.order_number, ?degraded_steps, "Checkout completed with non-fatal failures.");
    }

    Ok(CheckoutReceipt {
      order: OrderSummary::from(order),
      tokens_added: guard.tokens_added,
      email_sent: guard.email_sent,
      replayed: guard.replayed,
      synthetic_payment: guard.payment.as_ref().map(|p| p.synthetic).unwrap_or(false),
      degraded_steps,
    })
  }

  /// Re-applies token crediting for a recorded order. Orders already granted are not credited again.
  ///
  /// Returns `None` when the order contains no token-granting products.
  #[instrument(name = "CheckoutOrchestrator::reconcile_tokens", skip(self))]
  pub async fn reconcile_tokens(&self, order_number: &str) -> AppResult<Option<TokenGrant>> {
    let order = self
      .services
      .orders
      .fetch_by_number(order_number)
      .await?
      .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_number)))?;
    let products = self.services.catalog.products_for(&order.items.0).await?;
    let tokens = tokens_for_items(&order.items.0, &products)
      .ok_or_else(|| AppError::TokenCredit(format!("Token grant for order {} is out of range", order_number)))?;
    if tokens <= 0 {
      return Ok(None);
    }
    let grant = self
      .services
      .tokens
      .grant_for_order(&order.order_number, &order.account_id, tokens)
      .await?;
    info!(tokens = grant.tokens, newly_granted = grant.newly_granted, "Token reconciliation done.");
    Ok(Some(grant))
  }
}
