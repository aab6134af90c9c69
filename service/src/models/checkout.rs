// tokencart_service/src/models/checkout.rs

use crate::models::{CustomerSnapshot, LineItem, Money, PaymentMethodKind};
use crate::services::payment::PaymentDetails;
use serde::Deserialize;

/// Body of `POST /api/orders/process`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
  pub customer: CustomerSnapshot,
  pub order: OrderDraft,
  pub payment: PaymentDetails,
  #[serde(default)]
  pub discount_code: Option<String>,
}

impl CheckoutRequest {
  pub fn payment_method(&self) -> PaymentMethodKind {
    match self.payment {
      PaymentDetails::Card(_) => PaymentMethodKind::Card,
      PaymentDetails::Paypal(_) => PaymentMethodKind::Paypal,
    }
  }

  /// The submitted code, trimmed, if one was given.
  pub fn discount_code(&self) -> Option<&str> {
    self.discount_code.as_deref().map(str::trim).filter(|c| !c.is_empty())
  }
}

/// The cart and the amounts the client computed for it.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderDraft {
  pub items: Vec<LineItem>,
  pub subtotal: Money,
  #[serde(default)]
  pub discount: Money,
  pub total: Money,
}
