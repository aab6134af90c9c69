// tokencart_service/src/web/handlers/order_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use super::AuthenticatedAccount;
use crate::errors::AppError;
use crate::models::{CheckoutRequest, OrderSummary};
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

#[instrument(
    name = "handler::process_order",
    skip(app_state, req_payload, account),
    fields(account_id = %account.account_id)
)]
pub async fn process_order_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<CheckoutRequest>,
  account: AuthenticatedAccount,
) -> Result<HttpResponse, AppError> {
  let receipt = app_state
    .orchestrator
    .process(&account.account_id, req_payload.into_inner())
    .await?;

  info!(
    order_number = %receipt.order.order_number,
    email_sent = receipt.email_sent,
    "Order processed."
  );

  let mut body = json!({
    "success": true,
    "order": receipt.order,
    "emailSent": receipt.email_sent,
  });
  if let Some(tokens) = receipt.tokens_added {
    body["tokensAdded"] = json!(tokens);
  }
  Ok(HttpResponse::Ok().json(body))
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
  pub limit: Option<i64>,
  pub offset: Option<i64>,
}

impl ListOrdersQuery {
  fn page(&self) -> (i64, i64) {
    let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = self.offset.unwrap_or(0).max(0);
    (limit, offset)
  }
}

#[instrument(
    name = "handler::list_orders",
    skip(app_state, query, account),
    fields(account_id = %account.account_id)
)]
pub async fn list_orders_handler(
  app_state: web::Data<AppState>,
  query: web::Query<ListOrdersQuery>,
  account: AuthenticatedAccount,
) -> Result<HttpResponse, AppError> {
  let (limit, offset) = query.page();
  let orders = app_state
    .services
    .orders
    .list_for_account(&account.account_id, limit, offset)
    .await?;
  let orders: Vec<OrderSummary> = orders.iter().map(OrderSummary::from).collect();

  Ok(HttpResponse::Ok().json(json!({
    "success": true,
    "orders": orders,
    "limit": limit,
    "offset": offset,
  })))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn page_defaults_and_clamps() {
    let q = ListOrdersQuery { limit: None, offset: None };
    assert_eq!(q.page(), (20, 0));
    let q = ListOrdersQuery { limit: Some(500), offset: Some(-3) };
    assert_eq!(q.page(), (100, 0));
    let q = ListOrdersQuery { limit: Some(0), offset: Some(40) };
    assert_eq!(q.page(), (1, 40));
  }
}
