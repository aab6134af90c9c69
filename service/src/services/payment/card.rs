// tokencart_service/src/services/payment/card.rs

//! Card-network gateway speaking the Stripe PaymentIntents API.
//!
//! Charges are created and confirmed in one call (`confirm=true`) with redirects
//! disabled, so a successful response is either a capture or a terminal refusal.

use super::synthetic;
use super::{
  build_client, check_amount, classify_status, classify_transport, failed, CapturedPayment, CardDetails,
  PaymentDetails, PaymentErrorKind, PaymentFailure, PaymentGateway, PaymentResult,
};
use crate::config::CardGatewayConfig;
use crate::errors::Result as AppResult;
use crate::models::Money;
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub const MIN_CARD_NUMBER_LEN: usize = 13;
pub const MAX_CARD_NUMBER_LEN: usize = 19;

/// Where the funds come from, after local validation.
#[derive(Clone, PartialEq, Eq)]
pub enum CardSource {
  Token(String),
  Raw {
    number: String,
    exp_month: u32,
    exp_year: i32,
    cvc: Option<String>,
  },
}

impl std::fmt::Debug for CardSource {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      CardSource::Token(token) => f.debug_tuple("Token").field(token).finish(),
      CardSource::Raw { number, .. } => write!(f, "Raw(****{})", &number[number.len().saturating_sub(4)..]),
    }
  }
}

/// Prefers the tokenized payment method; otherwise checks the raw card fields.
pub fn validate_card(details: &CardDetails, today: NaiveDate) -> Result<CardSource, PaymentFailure> {
  if let Some(token) = details.payment_method_id.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
    return Ok(CardSource::Token(token.to_string()));
  }

  let raw_number = details
    .card_number
    .as_deref()
    .ok_or_else(|| PaymentFailure::invalid("A payment method or card number is required"))?;
  let number: String = raw_number.chars().filter(|c| *c != ' ' && *c != '-').collect();
  if !number.chars().all(|c| c.is_ascii_digit()) {
    return Err(PaymentFailure::invalid("Card number must contain only digits"));
  }
  if number.len() < MIN_CARD_NUMBER_LEN || number.len() > MAX_CARD_NUMBER_LEN {
    return Err(PaymentFailure::invalid(format!(
      "Card number must be between {} and {} digits",
      MIN_CARD_NUMBER_LEN, MAX_CARD_NUMBER_LEN
    )));
  }

  let expiry = details
    .expiry
    .as_deref()
    .ok_or_else(|| PaymentFailure::invalid("Card expiry is required"))?;
  let (exp_month, exp_year) = parse_expiry(expiry)?;
  if (exp_year, exp_month) < (today.year(), today.month()) {
    return Err(PaymentFailure::invalid("Card has expired"));
  }

  let cvc = match details.cvc.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
    Some(cvc) if (3..=4).contains(&cvc.len()) && cvc.chars().all(|c| c.is_ascii_digit()) => Some(cvc.to_string()),
    Some(_) => return Err(PaymentFailure::invalid("Card security code must be 3 or 4 digits")),
    None => None,
  };

  Ok(CardSource::Raw {
    number,
    exp_month,
    exp_year,
    cvc,
  })
}

/// `MM/YY` into (month, full year).
fn parse_expiry(expiry: &str) -> Result<(u32, i32), PaymentFailure> {
  let malformed = || PaymentFailure::invalid("Card expiry must be in MM/YY format");
  let (mm, yy) = expiry.trim().split_once('/').ok_or_else(malformed)?;
  if mm.len() != 2 || yy.len() != 2 {
    return Err(malformed());
  }
  let month: u32 = mm.parse().map_err(|_| malformed())?;
  let year: i32 = yy.parse().map_err(|_| malformed())?;
  if !(1..=12).contains(&month) {
    return Err(malformed());
  }
  Ok((month, 2000 + year))
}

#[derive(Debug, Deserialize)]
struct PaymentIntent {
  id: String,
  status: String,
  amount: i64,
  currency: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
  error: StripeError,
}

#[derive(Debug, Deserialize)]
struct StripeError {
  #[serde(rename = "type")]
  error_type: Option<String>,
  code: Option<String>,
  decline_code: Option<String>,
  message: Option<String>,
}

/// A confirmed intent is only a capture when its status is `succeeded`.
fn interpret_intent(intent: PaymentIntent) -> PaymentResult {
  if intent.status == "succeeded" {
    PaymentResult::Captured(CapturedPayment {
      reference: intent.id,
      amount: Money::from_cents(intent.amount),
      currency: intent.currency.to_ascii_uppercase(),
      status: intent.status,
      synthetic: false,
    })
  } else {
    let diagnostic = format!("Payment intent {} ended in status '{}'", intent.id, intent.status);
    PaymentResult::Declined(
      PaymentFailure::new(PaymentErrorKind::CardDeclined)
        .with_status(intent.status)
        .with_diagnostic(diagnostic),
    )
  }
}

fn failure_from_response(status: StatusCode, body: &str) -> PaymentFailure {
  let mut kind = classify_status(status);
  match serde_json::from_str::<StripeErrorBody>(body) {
    Ok(StripeErrorBody { error }) => {
      if error.error_type.as_deref() == Some("card_error") {
        kind = PaymentErrorKind::CardDeclined;
      }
      let mut failure = PaymentFailure::new(kind);
      if let Some(code) = error.decline_code.or(error.code) {
        failure = failure.with_status(code);
      }
      failure.with_diagnostic(error.message.unwrap_or_else(|| format!("HTTP {}", status)))
    }
    Err(_) => PaymentFailure::new(kind).with_diagnostic(format!("HTTP {}: {}", status, truncate(body, 200))),
  }
}

fn truncate(s: &str, max: usize) -> &str {
  match s.char_indices().nth(max) {
    Some((idx, _)) => &s[..idx],
    None => s,
  }
}

pub struct CardGateway {
  config: CardGatewayConfig,
  client: reqwest::Client,
  allow_synthetic: bool,
}

impl CardGateway {
  pub fn new(config: CardGatewayConfig, timeout: Duration, allow_synthetic: bool) -> AppResult<Self> {
    Ok(Self {
      config,
      client: build_client(timeout)?,
      allow_synthetic,
    })
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.config.api_base.trim_end_matches('/'), path)
  }

  fn form_params(source: &CardSource, amount: Money, currency: &str) -> Vec<(&'static str, String)> {
    let mut params = vec![
      ("amount", amount.cents().to_string()),
      ("currency", currency.to_ascii_lowercase()),
      ("confirm", "true".to_string()),
      ("automatic_payment_methods[enabled]", "true".to_string()),
      ("automatic_payment_methods[allow_redirects]", "never".to_string()),
    ];
    match source {
      CardSource::Token(token) => params.push(("payment_method", token.clone())),
      CardSource::Raw {
        number,
        exp_month,
        exp_year,
        cvc,
      } => {
        params.push(("payment_method_data[type]", "card".to_string()));
        params.push(("payment_method_data[card][number]", number.clone()));
        params.push(("payment_method_data[card][exp_month]", exp_month.to_string()));
        params.push(("payment_method_data[card][exp_year]", exp_year.to_string()));
        if let Some(cvc) = cvc {
          params.push(("payment_method_data[card][cvc]", cvc.clone()));
        }
      }
    }
    params
  }
}

#[async_trait]
impl PaymentGateway for CardGateway {
  fn name(&self) -> &'static str {
    "stripe"
  }

  #[instrument(name = "CardGateway::charge", skip_all, fields(%amount, %currency))]
  async fn charge(&self, details: &PaymentDetails, amount: Money, currency: &str) -> PaymentResult {
    let PaymentDetails::Card(card) = details else {
      return PaymentResult::GatewayError(PaymentFailure::invalid("The card gateway only accepts card payments"));
    };
    if let Err(failure) = check_amount(amount) {
      return PaymentResult::GatewayError(failure);
    }
    let source = match validate_card(card, Utc::now().date_naive()) {
      Ok(source) => source,
      Err(failure) => {
        info!(%failure, "Card details rejected before contacting the gateway.");
        return PaymentResult::GatewayError(failure);
      }
    };

    let Some(secret_key) = self.config.secret_key.as_deref() else {
      return match synthetic::without_credentials("Stripe", self.allow_synthetic) {
        None => synthetic::card_capture(amount, currency),
        Some(failure) => PaymentResult::GatewayError(failure),
      };
    };

    let response = self
      .client
      .post(self.url("/v1/payment_intents"))
      .bearer_auth(secret_key)
      .header("Idempotency-Key", Uuid::new_v4().to_string())
      .form(&Self::form_params(&source, amount, currency))
      .send()
      .await;
    let response = match response {
      Ok(response) => response,
      Err(e) => {
        let failure = classify_transport(&e);
        warn!(%failure, "Card gateway request failed.");
        return failed(failure);
      }
    };

    let status = response.status();
    if status.is_success() {
      match response.json::<PaymentIntent>().await {
        Ok(intent) => {
          info!(intent_id = %intent.id, intent_status = %intent.status, "Card gateway responded.");
          interpret_intent(intent)
        }
        Err(e) => PaymentResult::GatewayError(
          PaymentFailure::new(PaymentErrorKind::Unknown).with_diagnostic(format!("Unreadable gateway response: {}", e)),
        ),
      }
    } else {
      let body = response.text().await.unwrap_or_default();
      let failure = failure_from_response(status, &body);
      warn!(http_status = %status, %failure, "Card gateway refused the charge.");
      failed(failure)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 6, 15).unwrap()
  }

  fn raw(number: &str, expiry: &str) -> CardDetails {
    CardDetails {
      card_number: Some(number.to_string()),
      expiry: Some(expiry.to_string()),
      cvc: Some("123".to_string()),
      ..Default::default()
    }
  }

  #[test]
  fn token_is_preferred_over_raw_fields() {
    let details = CardDetails {
      payment_method_id: Some("pm_card_visa".to_string()),
      card_number: Some("12".to_string()),
      ..Default::default()
    };
    assert_eq!(validate_card(&details, today()).unwrap(), CardSource::Token("pm_card_visa".to_string()));
  }

  #[test]
  fn raw_card_fields_are_checked_locally() {
    assert!(matches!(
      validate_card(&raw("4242 4242 4242 4242", "07/26"), today()),
      Ok(CardSource::Raw { exp_month: 7, exp_year: 2026, .. })
    ));
    // Valid through the end of the expiry month.
    assert!(validate_card(&raw("4242424242424242", "06/26"), today()).is_ok());

    for (number, expiry) in [
      ("4242424242424242", "05/26"),
      ("4242424242424242", "13/30"),
      ("4242424242424242", "1/30"),
      ("4242424242424242", "2030-01"),
      ("4242", "12/30"),
      ("4242abcd42424242", "12/30"),
    ] {
      let failure = validate_card(&raw(number, expiry), today()).unwrap_err();
      assert_eq!(failure.kind, PaymentErrorKind::InvalidPaymentDetails, "{} {}", number, expiry);
    }
    assert!(validate_card(&CardDetails::default(), today()).is_err());
  }

  #[test]
  fn only_succeeded_intents_are_captures() {
    let captured = interpret_intent(PaymentIntent {
      id: "pi_1".to_string(),
      status: "succeeded".to_string(),
      amount: 1999,
      currency: "usd".to_string(),
    });
    assert!(matches!(captured, PaymentResult::Captured(ref c) if c.amount == Money::from_cents(1999) && c.currency == "USD"));

    for status in ["requires_action", "requires_capture", "processing", "requires_payment_method"] {
      let result = interpret_intent(PaymentIntent {
        id: "pi_2".to_string(),
        status: status.to_string(),
        amount: 1999,
        currency: "usd".to_string(),
      });
      match result {
        PaymentResult::Declined(f) => assert_eq!(f.gateway_status.as_deref(), Some(status)),
        other => panic!("expected decline for {}, got {:?}", status, other),
      }
    }
  }

  #[test]
  fn card_errors_are_declines() {
    let body = r#"{"error": {"type": "card_error", "code": "card_declined", "decline_code": "insufficient_funds", "message": "Your card has insufficient funds."}}"#;
    let failure = failure_from_response(StatusCode::PAYMENT_REQUIRED, body);
    assert_eq!(failure.kind, PaymentErrorKind::CardDeclined);
    assert_eq!(failure.gateway_status.as_deref(), Some("insufficient_funds"));

    let failure = failure_from_response(StatusCode::SERVICE_UNAVAILABLE, "<html>down</html>");
    assert_eq!(failure.kind, PaymentErrorKind::GatewayUnavailable);
  }
}
