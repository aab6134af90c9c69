// tokencart_service/src/services/payment/mod.rs

//! Uniform charge/capture interface over the card-network and redirect-wallet gateways.
//!
//! Gateways never return `Err` for a payment problem. Every outcome is a [`PaymentResult`]
//! whose variant tells the caller what happened, so no caller has to inspect
//! provider-specific error payloads.

pub mod card;
pub mod synthetic;
pub mod wallet;

use crate::config::AppConfig;
use crate::errors::{AppError, Result as AppResult};
use crate::models::Money;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub use card::CardGateway;
pub use wallet::WalletGateway;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PaymentErrorKind {
  CardDeclined,
  InvalidPaymentDetails,
  RateLimited,
  GatewayUnavailable,
  AuthenticationMisconfigured,
  Unknown,
}

impl PaymentErrorKind {
  pub fn code(&self) -> &'static str {
    match self {
      PaymentErrorKind::CardDeclined => "card_declined",
      PaymentErrorKind::InvalidPaymentDetails => "invalid_payment_details",
      PaymentErrorKind::RateLimited => "rate_limited",
      PaymentErrorKind::GatewayUnavailable => "gateway_unavailable",
      PaymentErrorKind::AuthenticationMisconfigured => "gateway_misconfigured",
      PaymentErrorKind::Unknown => "payment_error",
    }
  }

  pub fn user_message(&self) -> &'static str {
    match self {
      PaymentErrorKind::CardDeclined => "Your payment was declined. Please use a different payment method.",
      PaymentErrorKind::InvalidPaymentDetails => "The payment details are invalid. Please check them and try again.",
      PaymentErrorKind::RateLimited => "The payment service is busy. Please try again in a moment.",
      PaymentErrorKind::GatewayUnavailable => "The payment service is unavailable. Please try again shortly.",
      PaymentErrorKind::AuthenticationMisconfigured => "Payments are temporarily unavailable. Please contact support.",
      PaymentErrorKind::Unknown => "The payment could not be processed.",
    }
  }

  /// Only transient gateway conditions are worth a client retry.
  pub fn is_retryable(&self) -> bool {
    matches!(self, PaymentErrorKind::RateLimited | PaymentErrorKind::GatewayUnavailable)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentFailure {
  pub kind: PaymentErrorKind,
  /// The gateway's own status or decline code, when it gave one.
  pub gateway_status: Option<String>,
  /// Raw gateway message, for logs and support.
  pub diagnostic: Option<String>,
}

impl PaymentFailure {
  pub fn new(kind: PaymentErrorKind) -> Self {
    Self {
      kind,
      gateway_status: None,
      diagnostic: None,
    }
  }

  pub fn with_status(mut self, status: impl Into<String>) -> Self {
    self.gateway_status = Some(status.into());
    self
  }

  pub fn with_diagnostic(mut self, diagnostic: impl Into<String>) -> Self {
    self.diagnostic = Some(diagnostic.into());
    self
  }

  pub fn invalid(diagnostic: impl Into<String>) -> Self {
    Self::new(PaymentErrorKind::InvalidPaymentDetails).with_diagnostic(diagnostic)
  }
}

impl fmt::Display for PaymentFailure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:?}", self.kind)?;
    if let Some(status) = &self.gateway_status {
      write!(f, " (gateway status: {})", status)?;
    }
    if let Some(diagnostic) = &self.diagnostic {
      write!(f, ": {}", diagnostic)?;
    }
    Ok(())
  }
}

/// Funds the gateway reports as captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedPayment {
  pub reference: String,
  pub amount: Money,
  pub currency: String,
  pub status: String,
  /// Set when no gateway was called because credentials are absent outside production.
  pub synthetic: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentResult {
  Captured(CapturedPayment),
  Declined(PaymentFailure),
  GatewayError(PaymentFailure),
}

impl PaymentResult {
  pub fn into_captured(self) -> AppResult<CapturedPayment> {
    match self {
      PaymentResult::Captured(captured) => Ok(captured),
      PaymentResult::Declined(failure) => Err(AppError::PaymentDeclined(failure)),
      PaymentResult::GatewayError(failure) => Err(AppError::PaymentGateway(failure)),
    }
  }

  pub fn is_captured(&self) -> bool {
    matches!(self, PaymentResult::Captured(_))
  }
}

/// An order created at the wallet, awaiting customer approval on the wallet's own pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectOrder {
  pub order_id: String,
  pub status: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub approval_url: Option<String>,
}

/// Raw card fields or a tokenized payment method. Prefer the token.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDetails {
  #[serde(default)]
  pub payment_method_id: Option<String>,
  #[serde(default)]
  pub card_number: Option<String>,
  /// `MM/YY`
  #[serde(default)]
  pub expiry: Option<String>,
  #[serde(default)]
  pub cvc: Option<String>,
  #[serde(default)]
  pub cardholder_name: Option<String>,
}

impl fmt::Debug for CardDetails {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let last4 = self.card_number.as_deref().map(|n| {
      let digits: Vec<char> = n.chars().filter(char::is_ascii_digit).collect();
      let tail: String = digits[digits.len().saturating_sub(4)..].iter().collect();
      format!("****{}", tail)
    });
    f.debug_struct("CardDetails")
      .field("payment_method_id", &self.payment_method_id)
      .field("card_number", &last4)
      .field("expiry", &self.expiry.as_ref().map(|_| "[REDACTED]"))
      .field("cvc", &self.cvc.as_ref().map(|_| "[REDACTED]"))
      .finish()
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletApproval {
  /// The wallet order id the customer approved.
  #[serde(alias = "paypalOrderId")]
  pub order_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum PaymentDetails {
  Card(CardDetails),
  Paypal(WalletApproval),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
  fn name(&self) -> &'static str;

  /// Charges `amount` and returns only once the gateway has captured it or refused.
  async fn charge(&self, details: &PaymentDetails, amount: Money, currency: &str) -> PaymentResult;
}

#[async_trait]
pub trait RedirectGateway: PaymentGateway {
  async fn create_redirect_order(&self, amount: Money, currency: &str) -> Result<RedirectOrder, PaymentFailure>;

  /// Captures an approved wallet order, refusing if its amount or currency differ from what is expected.
  async fn capture_redirect_order(&self, order_id: &str, expected_amount: Money, currency: &str) -> PaymentResult;
}

/// The gateways the checkout can charge through, selected by payment method.
#[derive(Clone)]
pub struct PaymentGateways {
  pub card: Arc<dyn PaymentGateway>,
  pub wallet: Arc<dyn RedirectGateway>,
}

impl PaymentGateways {
  pub fn new(card: Arc<dyn PaymentGateway>, wallet: Arc<dyn RedirectGateway>) -> Self {
    Self { card, wallet }
  }

  pub fn from_config(config: &AppConfig) -> AppResult<Self> {
    let allow_synthetic = config.app_env.allows_synthetic_payments();
    let card = CardGateway::new(config.card.clone(), config.gateway_timeout, allow_synthetic)?;
    let wallet = WalletGateway::new(config.wallet.clone(), config.gateway_timeout, allow_synthetic)?;
    Ok(Self::new(Arc::new(card), Arc::new(wallet)))
  }

  pub async fn charge(&self, details: &PaymentDetails, amount: Money, currency: &str) -> PaymentResult {
    match details {
      PaymentDetails::Card(_) => self.card.charge(details, amount, currency).await,
      PaymentDetails::Paypal(_) => self.wallet.charge(details, amount, currency).await,
    }
  }
}

/// Amount check shared by both gateways: strictly positive. Two fraction digits are guaranteed by `Money`.
pub(crate) fn check_amount(amount: Money) -> Result<(), PaymentFailure> {
  if amount.cents() <= 0 {
    return Err(PaymentFailure::invalid(format!("Amount must be positive, got {}", amount)));
  }
  Ok(())
}

/// Maps a non-success HTTP status onto the failure taxonomy.
pub(crate) fn classify_status(status: StatusCode) -> PaymentErrorKind {
  match status.as_u16() {
    402 => PaymentErrorKind::CardDeclined,
    400 | 404 | 422 => PaymentErrorKind::InvalidPaymentDetails,
    401 | 403 => PaymentErrorKind::AuthenticationMisconfigured,
    429 => PaymentErrorKind::RateLimited,
    500..=599 => PaymentErrorKind::GatewayUnavailable,
    _ => PaymentErrorKind::Unknown,
  }
}

/// Timeouts and connection failures are the gateway being unavailable; anything else is unknown.
pub(crate) fn classify_transport(err: &reqwest::Error) -> PaymentFailure {
  let kind = if err.is_timeout() || err.is_connect() {
    PaymentErrorKind::GatewayUnavailable
  } else {
    PaymentErrorKind::Unknown
  };
  PaymentFailure::new(kind).with_diagnostic(err.to_string())
}

/// Wraps a failure in the right `PaymentResult` variant: refusals of the payment itself are declines.
pub(crate) fn failed(failure: PaymentFailure) -> PaymentResult {
  match failure.kind {
    PaymentErrorKind::CardDeclined => PaymentResult::Declined(failure),
    _ => PaymentResult::GatewayError(failure),
  }
}

pub(crate) fn build_client(timeout: std::time::Duration) -> AppResult<reqwest::Client> {
  reqwest::Client::builder()
    .timeout(timeout)
    .connect_timeout(timeout)
    .build()
    .map_err(|e| AppError::Config(format!("Could not build HTTP client: {}", e)))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn only_transient_failures_are_retryable() {
    assert!(PaymentErrorKind::RateLimited.is_retryable());
    assert!(PaymentErrorKind::GatewayUnavailable.is_retryable());
    assert!(!PaymentErrorKind::CardDeclined.is_retryable());
    assert!(!PaymentErrorKind::InvalidPaymentDetails.is_retryable());
    assert!(!PaymentErrorKind::AuthenticationMisconfigured.is_retryable());
    assert!(!PaymentErrorKind::Unknown.is_retryable());
  }

  #[test]
  fn http_statuses_map_to_categories() {
    assert_eq!(classify_status(StatusCode::PAYMENT_REQUIRED), PaymentErrorKind::CardDeclined);
    assert_eq!(classify_status(StatusCode::BAD_REQUEST), PaymentErrorKind::InvalidPaymentDetails);
    assert_eq!(classify_status(StatusCode::UNAUTHORIZED), PaymentErrorKind::AuthenticationMisconfigured);
    assert_eq!(classify_status(StatusCode::TOO_MANY_REQUESTS), PaymentErrorKind::RateLimited);
    assert_eq!(classify_status(StatusCode::BAD_GATEWAY), PaymentErrorKind::GatewayUnavailable);
    assert_eq!(classify_status(StatusCode::IM_A_TEAPOT), PaymentErrorKind::Unknown);
  }

  #[test]
  fn payment_details_are_tagged_by_method() {
    let card: PaymentDetails =
      serde_json::from_str(r#"{"method": "card", "cardNumber": "4242 4242 4242 4242", "expiry": "12/40", "cvc": "123"}"#)
        .unwrap();
    let PaymentDetails::Card(details) = card else {
      panic!("expected card details")
    };
    let printed = format!("{:?}", details);
    assert!(printed.contains("****4242"));
    assert!(!printed.contains("4242 4242"));
    assert!(!printed.contains("123"));

    let wallet: PaymentDetails = serde_json::from_str(r#"{"method": "paypal", "orderId": "5O190127TN364715T"}"#).unwrap();
    assert!(matches!(wallet, PaymentDetails::Paypal(w) if w.order_id == "5O190127TN364715T"));
  }
}
