// tokencart_service/src/services/payment/wallet.rs

//! Redirect wallet gateway speaking the PayPal Orders v2 API.
//!
//! The client first creates an order (`create_redirect_order`), sends the customer
//! to the wallet to approve it, then submits the approved order id with the checkout,
//! which captures it synchronously.

use super::synthetic;
use super::{
  build_client, check_amount, classify_status, classify_transport, failed, CapturedPayment, PaymentDetails,
  PaymentErrorKind, PaymentFailure, PaymentGateway, PaymentResult, RedirectGateway, RedirectOrder,
};
use crate::config::WalletGatewayConfig;
use crate::errors::Result as AppResult;
use crate::models::Money;
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

const COMPLETED: &str = "COMPLETED";
/// Refresh the cached access token this long before the wallet expires it.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
  access_token: String,
  expires_in: u64,
}

struct CachedToken {
  value: String,
  expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct WalletOrder {
  id: String,
  status: String,
  #[serde(default)]
  purchase_units: Vec<PurchaseUnit>,
  #[serde(default)]
  links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct PurchaseUnit {
  amount: Option<WalletAmount>,
  payments: Option<UnitPayments>,
}

#[derive(Debug, Clone, Deserialize)]
struct WalletAmount {
  currency_code: String,
  value: String,
}

#[derive(Debug, Deserialize)]
struct UnitPayments {
  #[serde(default)]
  captures: Vec<WalletCapture>,
}

#[derive(Debug, Deserialize)]
struct WalletCapture {
  id: String,
  status: String,
  amount: Option<WalletAmount>,
}

#[derive(Debug, Deserialize)]
struct Link {
  href: String,
  rel: String,
}

#[derive(Debug, Deserialize)]
struct WalletErrorBody {
  name: Option<String>,
  message: Option<String>,
  #[serde(default)]
  details: Vec<WalletErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct WalletErrorDetail {
  issue: Option<String>,
  description: Option<String>,
}

fn failure_from_response(status: StatusCode, body: &str) -> PaymentFailure {
  let mut kind = classify_status(status);
  let Ok(error) = serde_json::from_str::<WalletErrorBody>(body) else {
    return PaymentFailure::new(kind).with_diagnostic(format!("HTTP {}", status));
  };
  let detail = error.details.into_iter().next();
  let issue = detail.as_ref().and_then(|d| d.issue.clone());
  if matches!(issue.as_deref(), Some("INSTRUMENT_DECLINED") | Some("TRANSACTION_REFUSED")) {
    kind = PaymentErrorKind::CardDeclined;
  }
  let mut failure = PaymentFailure::new(kind);
  if let Some(issue) = issue.or(error.name) {
    failure = failure.with_status(issue);
  }
  let message = detail.and_then(|d| d.description).or(error.message);
  match message {
    Some(message) => failure.with_diagnostic(message),
    None => failure,
  }
}

fn unit_amount(order: &WalletOrder) -> Option<&WalletAmount> {
  order.purchase_units.first().and_then(|u| u.amount.as_ref())
}

/// Refuses to capture a wallet order whose amount or currency differ from the checkout.
fn check_order_matches(order: &WalletOrder, expected: Money, currency: &str) -> Result<(), PaymentFailure> {
  let amount = unit_amount(order).ok_or_else(|| PaymentFailure::invalid("Wallet order has no amount"))?;
  let value = Money::parse_decimal(&amount.value)
    .map_err(|e| PaymentFailure::new(PaymentErrorKind::Unknown).with_diagnostic(e.to_string()))?;
  if value != expected || !amount.currency_code.eq_ignore_ascii_case(currency) {
    return Err(PaymentFailure::invalid(format!(
      "Wallet order {} is for {} {}, expected {} {}",
      order.id, value, amount.currency_code, expected, currency
    )));
  }
  Ok(())
}

/// A capture only counts once both the order and its capture are `COMPLETED`.
fn interpret_captured_order(order: WalletOrder) -> PaymentResult {
  if order.status != COMPLETED {
    return PaymentResult::Declined(
      PaymentFailure::new(PaymentErrorKind::CardDeclined)
        .with_status(order.status.clone())
        .with_diagnostic(format!("Wallet order {} is {}", order.id, order.status)),
    );
  }
  let fallback_amount = unit_amount(&order).cloned();
  let capture = order
    .purchase_units
    .into_iter()
    .filter_map(|u| u.payments)
    .flat_map(|p| p.captures)
    .next();
  let Some(capture) = capture else {
    return PaymentResult::GatewayError(
      PaymentFailure::new(PaymentErrorKind::Unknown).with_diagnostic(format!("Wallet order {} has no capture", order.id)),
    );
  };
  if capture.status != COMPLETED {
    return PaymentResult::Declined(
      PaymentFailure::new(PaymentErrorKind::CardDeclined)
        .with_status(capture.status.clone())
        .with_diagnostic(format!("Capture {} is {}", capture.id, capture.status)),
    );
  }
  let Some(amount) = capture.amount.or(fallback_amount) else {
    return PaymentResult::GatewayError(
      PaymentFailure::new(PaymentErrorKind::Unknown).with_diagnostic(format!("Capture {} has no amount", capture.id)),
    );
  };
  match Money::parse_decimal(&amount.value) {
    Ok(value) => PaymentResult::Captured(CapturedPayment {
      reference: capture.id,
      amount: value,
      currency: amount.currency_code.to_ascii_uppercase(),
      status: capture.status,
      synthetic: false,
    }),
    Err(e) => PaymentResult::GatewayError(PaymentFailure::new(PaymentErrorKind::Unknown).with_diagnostic(e.to_string())),
  }
}

pub struct WalletGateway {
  config: WalletGatewayConfig,
  client: reqwest::Client,
  allow_synthetic: bool,
  token: Mutex<Option<CachedToken>>,
}

impl WalletGateway {
  pub fn new(config: WalletGatewayConfig, timeout: Duration, allow_synthetic: bool) -> AppResult<Self> {
    Ok(Self {
      config,
      client: build_client(timeout)?,
      allow_synthetic,
      token: Mutex::new(None),
    })
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.config.api_base.trim_end_matches('/'), path)
  }

  async fn access_token(&self, client_id: &str, client_secret: &str) -> Result<String, PaymentFailure> {
    let mut cached = self.token.lock().await;
    if let Some(token) = cached.as_ref() {
      if token.expires_at > Instant::now() + TOKEN_EXPIRY_MARGIN {
        return Ok(token.value.clone());
      }
    }

    debug!("Requesting wallet access token.");
    let response = self
      .client
      .post(self.url("/v1/oauth2/token"))
      .basic_auth(client_id, Some(client_secret))
      .form(&[("grant_type", "client_credentials")])
      .send()
      .await
      .map_err(|e| classify_transport(&e))?;
    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      let mut failure = failure_from_response(status, &body);
      if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
        // Bad client credentials come back as 401 or as 400 invalid_client.
        failure.kind = PaymentErrorKind::AuthenticationMisconfigured;
      }
      return Err(failure);
    }
    let token: AccessTokenResponse = response.json().await.map_err(|e| {
      PaymentFailure::new(PaymentErrorKind::Unknown).with_diagnostic(format!("Unreadable token response: {}", e))
    })?;
    *cached = Some(CachedToken {
      value: token.access_token.clone(),
      expires_at: Instant::now() + Duration::from_secs(token.expires_in),
    });
    Ok(token.access_token)
  }

  async fn api<T: DeserializeOwned>(
    &self,
    credentials: (&str, &str),
    method: Method,
    path: &str,
    body: Option<Value>,
  ) -> Result<T, PaymentFailure> {
    let token = self.access_token(credentials.0, credentials.1).await?;
    let mut request = self.client.request(method.clone(), self.url(path)).bearer_auth(token);
    if method == Method::POST {
      request = request.header("PayPal-Request-Id", Uuid::new_v4().to_string());
    }
    if let Some(body) = body {
      request = request.json(&body);
    }
    let response = request.send().await.map_err(|e| classify_transport(&e))?;
    let status = response.status();
    if status.is_success() {
      response.json::<T>().await.map_err(|e| {
        PaymentFailure::new(PaymentErrorKind::Unknown).with_diagnostic(format!("Unreadable gateway response: {}", e))
      })
    } else {
      let body = response.text().await.unwrap_or_default();
      Err(failure_from_response(status, &body))
    }
  }
}

#[async_trait]
impl PaymentGateway for WalletGateway {
  fn name(&self) -> &'static str {
    "paypal"
  }

  async fn charge(&self, details: &PaymentDetails, amount: Money, currency: &str) -> PaymentResult {
    match details {
      PaymentDetails::Paypal(approval) => self.capture_redirect_order(&approval.order_id, amount, currency).await,
      PaymentDetails::Card(_) => {
        PaymentResult::GatewayError(PaymentFailure::invalid("The wallet gateway only accepts wallet payments"))
      }
    }
  }
}

#[async_trait]
impl RedirectGateway for WalletGateway {
  #[instrument(name = "WalletGateway::create_redirect_order", skip_all, fields(%amount, %currency))]
  async fn create_redirect_order(&self, amount: Money, currency: &str) -> Result<RedirectOrder, PaymentFailure> {
    check_amount(amount)?;
    let Some(credentials) = self.config.credentials() else {
      return match synthetic::without_credentials("PayPal", self.allow_synthetic) {
        None => Ok(synthetic::redirect_order()),
        Some(failure) => Err(failure),
      };
    };

    let body = json!({
      "intent": "CAPTURE",
      "purchase_units": [{
        "amount": { "currency_code": currency.to_ascii_uppercase(), "value": amount.to_decimal_string() }
      }]
    });
    let order: WalletOrder = self
      .api(credentials, Method::POST, "/v2/checkout/orders", Some(body))
      .await
      .map_err(|failure| {
        warn!(%failure, "Wallet order creation failed.");
        failure
      })?;
    info!(wallet_order_id = %order.id, status = %order.status, "Wallet order created.");
    let approval_url = order
      .links
      .iter()
      .find(|l| l.rel == "approve" || l.rel == "payer-action")
      .map(|l| l.href.clone());
    Ok(RedirectOrder {
      order_id: order.id,
      status: order.status,
      approval_url,
    })
  }

  #[instrument(name = "WalletGateway::capture_redirect_order", skip_all, fields(%order_id, %expected_amount, %currency))]
  async fn capture_redirect_order(&self, order_id: &str, expected_amount: Money, currency: &str) -> PaymentResult {
    if let Err(failure) = check_amount(expected_amount) {
      return PaymentResult::GatewayError(failure);
    }
    let order_id = order_id.trim();
    if order_id.is_empty() || !order_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
      return PaymentResult::GatewayError(PaymentFailure::invalid("A valid wallet order id is required"));
    }
    let Some(credentials) = self.config.credentials() else {
      return match synthetic::without_credentials("PayPal", self.allow_synthetic) {
        None => synthetic::wallet_capture(order_id, expected_amount, currency),
        Some(failure) => PaymentResult::GatewayError(failure),
      };
    };

    let path = format!("/v2/checkout/orders/{}", order_id);
    let order: WalletOrder = match self.api(credentials, Method::GET, &path, None).await {
      Ok(order) => order,
      Err(failure) => return failed(failure),
    };
    if let Err(failure) = check_order_matches(&order, expected_amount, currency) {
      warn!(%failure, "Wallet order does not match the checkout, not capturing.");
      return failed(failure);
    }
    if order.status == COMPLETED {
      // Captured by an earlier attempt; report that capture so the order ledger sees the same reference.
      info!("Wallet order already captured.");
      return interpret_captured_order(order);
    }

    let capture_path = format!("/v2/checkout/orders/{}/capture", order_id);
    match self
      .api::<WalletOrder>(credentials, Method::POST, &capture_path, Some(json!({})))
      .await
    {
      Ok(captured) => {
        info!(status = %captured.status, "Wallet capture responded.");
        interpret_captured_order(captured)
      }
      Err(failure) => {
        warn!(%failure, "Wallet capture failed.");
        failed(failure)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn order_json(status: &str, value: &str, capture_status: Option<&str>) -> WalletOrder {
    let payments = capture_status.map(|s| {
      json!({"captures": [{"id": "CAP-1", "status": s, "amount": {"currency_code": "USD", "value": value}}]})
    });
    serde_json::from_value(json!({
      "id": "ORDER-1",
      "status": status,
      "purchase_units": [{"amount": {"currency_code": "USD", "value": value}, "payments": payments}]
    }))
    .unwrap()
  }

  #[test]
  fn amount_and_currency_must_match() {
    let order = order_json("APPROVED", "19.99", None);
    assert!(check_order_matches(&order, Money::from_cents(1999), "usd").is_ok());
    let failure = check_order_matches(&order, Money::from_cents(2000), "USD").unwrap_err();
    assert_eq!(failure.kind, PaymentErrorKind::InvalidPaymentDetails);
    assert!(check_order_matches(&order, Money::from_cents(1999), "EUR").is_err());
  }

  #[test]
  fn completed_capture_is_captured() {
    let result = interpret_captured_order(order_json("COMPLETED", "19.99", Some("COMPLETED")));
    assert_eq!(
      result,
      PaymentResult::Captured(CapturedPayment {
        reference: "CAP-1".to_string(),
        amount: Money::from_cents(1999),
        currency: "USD".to_string(),
        status: "COMPLETED".to_string(),
        synthetic: false,
      })
    );
    let pending = interpret_captured_order(order_json("COMPLETED", "19.99", Some("PENDING")));
    assert!(matches!(pending, PaymentResult::Declined(f) if f.gateway_status.as_deref() == Some("PENDING")));
  }

  #[test]
  fn declined_instrument_is_a_decline() {
    let body = r#"{"name": "UNPROCESSABLE_ENTITY", "details": [{"issue": "INSTRUMENT_DECLINED", "description": "The instrument presented was declined."}]}"#;
    let failure = failure_from_response(StatusCode::UNPROCESSABLE_ENTITY, body);
    assert_eq!(failure.kind, PaymentErrorKind::CardDeclined);
    assert_eq!(failure.gateway_status.as_deref(), Some("INSTRUMENT_DECLINED"));

    let body = r#"{"name": "UNPROCESSABLE_ENTITY", "details": [{"issue": "ORDER_NOT_APPROVED"}]}"#;
    let failure = failure_from_response(StatusCode::UNPROCESSABLE_ENTITY, body);
    assert_eq!(failure.kind, PaymentErrorKind::InvalidPaymentDetails);
  }
}
