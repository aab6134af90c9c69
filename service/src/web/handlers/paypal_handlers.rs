// tokencart_service/src/web/handlers/paypal_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use crate::errors::AppError;
use crate::models::Money;
use crate::services::payment::PaymentErrorKind;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreatePaypalOrderPayload {
  pub amount: Money,
  #[serde(default)]
  pub currency: Option<String>,
}

/// Opens a wallet order the customer approves on the wallet's own pages before checkout.
#[instrument(name = "handler::create_paypal_order", skip(app_state, req_payload), fields(amount = %req_payload.amount))]
pub async fn create_paypal_order_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<CreatePaypalOrderPayload>,
) -> Result<HttpResponse, AppError> {
  let payload = req_payload.into_inner();
  let currency = payload
    .currency
    .map(|c| c.trim().to_ascii_uppercase())
    .filter(|c| !c.is_empty())
    .unwrap_or_else(|| app_state.config.base_currency.clone());

  let order = app_state
    .services
    .payments
    .wallet
    .create_redirect_order(payload.amount, &currency)
    .await
    .map_err(|failure| match failure.kind {
      PaymentErrorKind::CardDeclined => AppError::PaymentDeclined(failure),
      _ => AppError::PaymentGateway(failure),
    })?;

  info!(order_id = %order.order_id, status = %order.status, "Wallet order created.");
  Ok(HttpResponse::Ok().json(json!({
    "success": true,
    "orderId": order.order_id,
    "approvalUrl": order.approval_url,
  })))
}
