// tokencart_service/src/models/order.rs

use crate::models::customer::CustomerSnapshot;
use crate::models::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, Type as SqlxType};

/// `completed` is the only status the checkout writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, SqlxType)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
  Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, SqlxType)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethodKind {
  Card,
  Paypal,
}

/// One cart line. Prices are as the client submitted them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
  #[serde(deserialize_with = "string_or_number")]
  pub id: String,
  pub name: String,
  pub price: Money,
  pub quantity: i64,
}

impl LineItem {
  /// `price × quantity`, or `None` if that does not fit.
  pub fn line_total(&self) -> Option<Money> {
    self.price.checked_mul(self.quantity)
  }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Id {
    Text(String),
    Number(i64),
  }
  Ok(match Id::deserialize(deserializer)? {
    Id::Text(s) => s,
    Id::Number(n) => n.to_string(),
  })
}

#[derive(Debug, Clone, FromRow)]
pub struct Order {
  pub id: i64,
  pub order_number: String,
  pub account_id: String,
  pub customer: Json<CustomerSnapshot>,
  pub items: Json<Vec<LineItem>>,
  #[sqlx(rename = "subtotal_cents")]
  pub subtotal: Money,
  #[sqlx(rename = "discount_cents")]
  pub discount: Money,
  #[sqlx(rename = "total_cents")]
  pub total: Money,
  pub currency: String,
  pub payment_method: PaymentMethodKind,
  pub payment_reference: Option<String>,
  pub synthetic_payment: bool,
  pub status: OrderStatus,
  pub created_at: DateTime<Utc>,
}

/// An order ready to be written. The order number is assigned by the ledger on insert.
#[derive(Debug, Clone)]
pub struct NewOrder {
  pub account_id: String,
  pub customer: CustomerSnapshot,
  pub items: Vec<LineItem>,
  pub subtotal: Money,
  pub discount: Money,
  pub total: Money,
  pub currency: String,
  pub payment_method: PaymentMethodKind,
  pub payment_reference: Option<String>,
  pub synthetic_payment: bool,
}

/// The client-facing view of an order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
  pub id: i64,
  pub order_number: String,
  pub items: Vec<LineItem>,
  pub subtotal: Money,
  pub discount: Money,
  pub total: Money,
  pub currency: String,
  pub payment_method: PaymentMethodKind,
  pub status: OrderStatus,
  pub created_at: DateTime<Utc>,
}

impl From<&Order> for OrderSummary {
  fn from(order: &Order) -> Self {
    Self {
      id: order.id,
      order_number: order.order_number.clone(),
      items: order.items.0.clone(),
      subtotal: order.subtotal,
      discount: order.discount,
      total: order.total,
      currency: order.currency.clone(),
      payment_method: order.payment_method,
      status: order.status,
      created_at: order.created_at,
    }
  }
}
