// tokencart_service/src/pipelines/checkout_pipeline.rs

//! The checkout as a sequence of steps.
//!
//! Validation, charging and persisting are fatal: their failure aborts the checkout
//! and, because charging precedes persisting, a failed charge never leaves an order
//! behind. Everything after the order exists is best-effort and works from the stored
//! order, which on a replay is the one recorded first.

use crate::errors::{AppError, Result as AppResult};
use crate::models::{NewOrder, Order};
use crate::pipelines::contexts::{CheckoutCtxData, CheckoutStage};
use crate::pipelines::validation::{check_request_shape, check_totals};
use crate::services::catalog::tokens_for_items;
use crate::services::notifications::{OrderConfirmation, ScheduledAccess};
use crate::services::payment::{PaymentErrorKind, PaymentFailure};
use std::sync::Arc;
use tokencart_flow::{ContextData, FlowResult, Pipeline, PipelineControl, SkipCondition, StepKind};
use tracing::{error, info, warn};

pub const VALIDATE_CHECKOUT: &str = "validate_checkout";
pub const CHARGE_PAYMENT: &str = "charge_payment";
pub const PERSIST_ORDER: &str = "persist_order";
pub const ACCOUNT_DISCOUNT_USAGE: &str = "account_discount_usage";
pub const CREDIT_TOKENS: &str = "credit_tokens";
pub const SEND_CONFIRMATION: &str = "send_confirmation";

fn when_free() -> SkipCondition<CheckoutCtxData> {
  Arc::new(|ctx_data: ContextData<CheckoutCtxData>| ctx_data.read().total.is_zero())
}

fn when_no_discount_code() -> SkipCondition<CheckoutCtxData> {
  Arc::new(|ctx_data: ContextData<CheckoutCtxData>| ctx_data.read().discount_code.is_none())
}

pub fn build_checkout_pipeline() -> FlowResult<Pipeline<CheckoutCtxData, AppError>> {
  let mut p = Pipeline::<CheckoutCtxData, AppError>::new(&[
    (VALIDATE_CHECKOUT, StepKind::Fatal, None),
    (CHARGE_PAYMENT, StepKind::Fatal, Some(when_free())),
    (PERSIST_ORDER, StepKind::Fatal, None),
    (ACCOUNT_DISCOUNT_USAGE, StepKind::BestEffort, Some(when_no_discount_code())),
    (CREDIT_TOKENS, StepKind::BestEffort, None),
    (SEND_CONFIRMATION, StepKind::BestEffort, None),
  ])?;

  p.on(VALIDATE_CHECKOUT, validate_checkout)?;
  p.on(CHARGE_PAYMENT, charge_payment)?;
  p.after(CHARGE_PAYMENT, verify_captured_amount)?;
  p.on(PERSIST_ORDER, persist_order)?;
  p.on(ACCOUNT_DISCOUNT_USAGE, account_discount_usage)?;
  p.on(CREDIT_TOKENS, credit_tokens)?;
  p.on(SEND_CONFIRMATION, send_confirmation)?;

  info!("Checkout pipeline built.");
  Ok(p)
}

fn persisted_order(ctx: &CheckoutCtxData) -> AppResult<&Order> {
  ctx
    .order
    .as_ref()
    .ok_or_else(|| AppError::Internal("Order has not been persisted".to_string()))
}

async fn validate_checkout(ctx_data: ContextData<CheckoutCtxData>) -> AppResult<PipelineControl> {
  let (requested_code, discounts) = {
    let mut guard = ctx_data.write();
    guard.stage = CheckoutStage::Validating;
    check_request_shape(&guard.request)?;
    (
      guard.request.discount_code().map(str::to_string),
      guard.services.discounts.clone(),
    )
  };

  let code = match requested_code {
    Some(raw) => Some(
      discounts
        .resolve(&raw)
        .await?
        .ok_or_else(|| AppError::Validation(format!("Discount code '{}' is not valid", raw)))?,
    ),
    None => None,
  };

  let mut guard = ctx_data.write();
  let totals = check_totals(&guard.request.order, code.as_ref())?;
  guard.subtotal = totals.subtotal;
  guard.discount = totals.discount;
  guard.total = totals.total;
  guard.discount_code = code;
  info!(
    account_id = %guard.account_id,
    subtotal = %totals.subtotal,
    discount = %totals.discount,
    total = %totals.total,
    "Checkout validated."
  );
  Ok(PipelineControl::Continue)
}

async fn charge_payment(ctx_data: ContextData<CheckoutCtxData>) -> AppResult<PipelineControl> {
  let (payments, details, total, currency) = {
    let mut guard = ctx_data.write();
    guard.stage = CheckoutStage::Charging;
    (
      guard.services.payments.clone(),
      guard.request.payment.clone(),
      guard.total,
      guard.currency.clone(),
    )
  };

  let captured = payments.charge(&details, total, &currency).await.into_captured()?;
  info!(
    payment_reference = %captured.reference,
    amount = %captured.amount,
    synthetic = captured.synthetic,
    "Payment captured."
  );
  ctx_data.write().payment = Some(captured);
  Ok(PipelineControl::Continue)
}

/// The order total must be exactly what the gateway captured.
async fn verify_captured_amount(ctx_data: ContextData<CheckoutCtxData>) -> AppResult<PipelineControl> {
  let guard = ctx_data.read();
  let Some(payment) = guard.payment.as_ref() else {
    return Err(AppError::Internal("Charge finished without a captured payment".to_string()));
  };
  if payment.amount == guard.total && payment.currency.eq_ignore_ascii_case(&guard.currency) {
    return Ok(PipelineControl::Continue);
  }
  error!(
    reconciliation = true,
    payment_reference = %payment.reference,
    captured = %payment.amount,
    captured_currency = %payment.currency,
    expected = %guard.total,
    expected_currency = %guard.currency,
    account_id = %guard.account_id,
    "Captured amount differs from the order total; not recording the order."
  );
  Err(AppError::PaymentGateway(
    PaymentFailure::new(PaymentErrorKind::Unknown)
      .with_status(payment.status.clone())
      .with_diagnostic(format!(
        "Captured {} {} but the order total is {} {}",
        payment.amount, payment.currency, guard.total, guard.currency
      )),
  ))
}

async fn persist_order(ctx_data: ContextData<CheckoutCtxData>) -> AppResult<PipelineControl> {
  let (orders, new_order) = {
    let mut guard = ctx_data.write();
    guard.stage = CheckoutStage::Persisting;
    let new_order = NewOrder {
      account_id: guard.account_id.clone(),
      customer: guard.request.customer.clone(),
      items: guard.request.order.items.clone(),
      subtotal: guard.subtotal,
      discount: guard.discount,
      total: guard.total,
      currency: guard.currency.clone(),
      payment_method: guard.request.payment_method(),
      payment_reference: guard.payment.as_ref().map(|p| p.reference.clone()),
      synthetic_payment: guard.payment.as_ref().map(|p| p.synthetic).unwrap_or(false),
    };
    (guard.services.orders.clone(), new_order)
  };

  match orders.record(&new_order).await {
    Ok(recorded) => {
      let mut guard = ctx_data.write();
      guard.order = Some(recorded.order);
      guard.replayed = recorded.replayed;
      Ok(PipelineControl::Continue)
    }
    Err(e) => {
      error!(
        reconciliation = true,
        error = %e,
        payment_reference = ?new_order.payment_reference,
        account_id = %new_order.account_id,
        customer_email = ?new_order.customer.contact_email(),
        amount = %new_order.total,
        currency = %new_order.currency,
        "Payment captured but the order could not be recorded."
      );
      Err(match e {
        AppError::Persistence(_) => e,
        other => AppError::Persistence(other.to_string()),
      })
    }
  }
}

async fn account_discount_usage(ctx_data: ContextData<CheckoutCtxData>) -> AppResult<PipelineControl> {
  let (discounts, order_number, code, stored_without_discount) = {
    let mut guard = ctx_data.write();
    guard.stage = CheckoutStage::AccountingDiscount;
    let order = persisted_order(&guard)?;
    let order_number = order.order_number.clone();
    let stored_without_discount = guard.replayed && order.discount.is_zero();
    (
      guard.services.discounts.clone(),
      order_number,
      guard.discount_code.clone(),
      stored_without_discount,
    )
  };
  let Some(code) = code else {
    return Ok(PipelineControl::Continue);
  };
  if stored_without_discount {
    info!(%order_number, code = %code.code, "Replayed order was recorded without a discount; usage not counted.");
    return Ok(PipelineControl::Continue);
  }

  match discounts.redeem_for_order(&order_number, code.id).await {
    Ok(_) => {
      ctx_data.write().discount_applied = true;
      Ok(PipelineControl::Continue)
    }
    Err(e) => Err(AppError::DiscountAccounting(format!(
      "Usage of '{}' not counted for order {}: {}",
      code.code, order_number, e
    ))),
  }
}

async fn credit_tokens(ctx_data: ContextData<CheckoutCtxData>) -> AppResult<PipelineControl> {
  let (catalog, tokens, order_number, account_id, items) = {
    let mut guard = ctx_data.write();
    guard.stage = CheckoutStage::CreditingTokens;
    let order = persisted_order(&guard)?;
    let (order_number, account_id, items) = (
      order.order_number.clone(),
      order.account_id.clone(),
      order.items.0.clone(),
    );
    (
      guard.services.catalog.clone(),
      guard.services.tokens.clone(),
      order_number,
      account_id,
      items,
    )
  };

  let products = catalog.products_for(&items).await.map_err(|e| {
    warn!(reconciliation = true, %order_number, %account_id, error = %e, "Could not read the catalog for token grants.");
    AppError::TokenCredit(format!("Catalog unavailable for order {}: {}", order_number, e))
  })?;
  let grant = tokens_for_items(&items, &products)
    .ok_or_else(|| AppError::TokenCredit(format!("Token grant for order {} is out of range", order_number)))?;
  ctx_data.write().products = Some(products);
  if grant <= 0 {
    return Ok(PipelineControl::Continue);
  }

  match tokens.grant_for_order(&order_number, &account_id, grant).await {
    Ok(granted) => {
      ctx_data.write().tokens_added = Some(granted.tokens);
      Ok(PipelineControl::Continue)
    }
    Err(e) => {
      warn!(
        reconciliation = true,
        %order_number,
        %account_id,
        tokens = grant,
        error = %e,
        "Tokens not credited for a completed order."
      );
      Err(AppError::TokenCredit(format!(
        "{} tokens not credited for order {}: {}",
        grant, order_number, e
      )))
    }
  }
}

async fn send_confirmation(ctx_data: ContextData<CheckoutCtxData>) -> AppResult<PipelineControl> {
  let (dispatcher, catalog, known_products, confirmation) = {
    let mut guard = ctx_data.write();
    guard.stage = CheckoutStage::Notifying;
    let order = persisted_order(&guard)?;
    let customer = &order.customer.0;
    let recipient_email = customer
      .contact_email()
      .map(str::to_string)
      .ok_or_else(|| AppError::Notification("No recipient email".to_string()))?;
    let confirmation = OrderConfirmation {
      recipient_email,
      recipient_name: customer.display_name(),
      order_number: order.order_number.clone(),
      items: order.items.0.clone(),
      subtotal: order.subtotal,
      discount: order.discount,
      total: order.total,
      currency: order.currency.clone(),
      tokens_added: guard.tokens_added,
      access: Vec::new(),
    };
    (
      guard.services.notifications.clone(),
      guard.services.catalog.clone(),
      guard.products.clone(),
      confirmation,
    )
  };

  let products = match known_products {
    Some(products) => products,
    None => catalog
      .products_for(&confirmation.items)
      .await
      .map_err(|e| AppError::Notification(format!("Catalog unavailable: {}", e)))?,
  };
  let confirmation = OrderConfirmation {
    access: ScheduledAccess::for_items(&confirmation.items, &products),
    ..confirmation
  };

  let report = dispatcher.send_order_confirmation(&confirmation).await;
  ctx_data.write().email_sent = report.sent;
  if !report.sent {
    return Err(AppError::Notification(format!(
      "Confirmation for order {} was not delivered",
      confirmation.order_number
    )));
  }
  Ok(PipelineControl::Continue)
}
