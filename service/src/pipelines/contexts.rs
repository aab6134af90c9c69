// tokencart_service/src/pipelines/contexts.rs

//! The data the checkout pipeline works on.
//! Handlers receive it wrapped in `tokencart_flow::ContextData`.

use crate::models::{CheckoutRequest, DiscountCode, Money, Order, Product};
use crate::services::payment::CapturedPayment;
use crate::services::{Catalog, DiscountAccounting, NotificationDispatcher, OrderLedger, PaymentGateways, TokenLedger};
use serde::Serialize;

/// Where a checkout attempt is, or where it ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CheckoutStage {
  Validating,
  Charging,
  Persisting,
  AccountingDiscount,
  CreditingTokens,
  Notifying,
  Done,
  Aborted,
}

/// Everything the checkout talks to. Cloning shares the underlying pool and clients.
#[derive(Clone)]
pub struct CheckoutServices {
  pub orders: OrderLedger,
  pub discounts: DiscountAccounting,
  pub tokens: TokenLedger,
  pub catalog: Catalog,
  pub payments: PaymentGateways,
  pub notifications: NotificationDispatcher,
  pub base_currency: String,
}

#[derive(Clone)]
pub struct CheckoutCtxData {
  pub services: CheckoutServices,
  pub account_id: String,
  pub request: CheckoutRequest,
  pub stage: CheckoutStage,
  pub currency: String,

  // Set by validation.
  pub discount_code: Option<DiscountCode>,
  pub subtotal: Money,
  pub discount: Money,
  pub total: Money,

  pub payment: Option<CapturedPayment>,
  pub order: Option<Order>,
  pub replayed: bool,

  pub discount_applied: bool,
  pub products: Option<Vec<Product>>,
  pub tokens_added: Option<i64>,
  pub email_sent: bool,
}

impl CheckoutCtxData {
  pub fn new(services: CheckoutServices, account_id: String, request: CheckoutRequest) -> Self {
    let currency = services.base_currency.clone();
    Self {
      services,
      account_id,
      request,
      stage: CheckoutStage::Validating,
      currency,
      discount_code: None,
      subtotal: Money::ZERO,
      discount: Money::ZERO,
      total: Money::ZERO,
      payment: None,
      order: None,
      replayed: false,
      discount_applied: false,
      products: None,
      tokens_added: None,
      email_sent: false,
    }
  }
}
