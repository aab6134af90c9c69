// tokencart_service/src/services/payment/synthetic.rs

//! Stand-in captures for gateways without credentials outside production.
//!
//! The outcome is fixed (always captured, for exactly the requested amount) so the
//! rest of the checkout can be exercised. Orders are keyed by payment reference:
//! a card charge has no stable identity and gets a fresh reference, while a wallet
//! capture is named after the approved wallet order so capturing it again replays.

use super::{CapturedPayment, PaymentErrorKind, PaymentFailure, PaymentResult, RedirectOrder};
use crate::models::Money;
use tracing::warn;
use uuid::Uuid;

pub const SYNTHETIC_STATUS: &str = "synthetic_succeeded";

/// Resolves what a gateway without credentials should do.
pub(crate) fn without_credentials(gateway: &'static str, allow_synthetic: bool) -> Option<PaymentFailure> {
  if allow_synthetic {
    None
  } else {
    Some(
      PaymentFailure::new(PaymentErrorKind::AuthenticationMisconfigured)
        .with_diagnostic(format!("{} credentials are not configured", gateway)),
    )
  }
}

pub fn card_capture(amount: Money, currency: &str) -> PaymentResult {
  capture(format!("synthetic_card_{}", Uuid::new_v4().simple()), amount, currency)
}

pub fn wallet_capture(order_id: &str, amount: Money, currency: &str) -> PaymentResult {
  capture(format!("synthetic_wallet_{}", order_id), amount, currency)
}

fn capture(reference: String, amount: Money, currency: &str) -> PaymentResult {
  warn!(%reference, %amount, currency, "No gateway credentials configured, synthesizing a successful capture.");
  PaymentResult::Captured(CapturedPayment {
    reference,
    amount,
    currency: currency.to_string(),
    status: SYNTHETIC_STATUS.to_string(),
    synthetic: true,
  })
}

pub fn redirect_order() -> RedirectOrder {
  let order_id = format!("synthetic_wallet_order_{}", Uuid::new_v4().simple());
  warn!(%order_id, "No wallet credentials configured, synthesizing a redirect order.");
  RedirectOrder {
    order_id,
    status: "CREATED".to_string(),
    approval_url: None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn synthetic_capture_is_exact_and_marked() {
    let PaymentResult::Captured(first) = card_capture(Money::from_cents(1999), "USD") else {
      panic!("synthetic capture must succeed")
    };
    let PaymentResult::Captured(second) = card_capture(Money::from_cents(1999), "USD") else {
      panic!("synthetic capture must succeed")
    };
    assert!(first.synthetic);
    assert_eq!(first.amount, Money::from_cents(1999));
    assert!(first.reference.starts_with("synthetic_card_"));
    assert_ne!(first.reference, second.reference);
  }

  #[test]
  fn synthetic_wallet_capture_is_named_after_the_order() {
    let PaymentResult::Captured(first) = wallet_capture("WALLETORDER1", Money::from_cents(1000), "USD") else {
      panic!("synthetic capture must succeed")
    };
    let PaymentResult::Captured(again) = wallet_capture("WALLETORDER1", Money::from_cents(1000), "USD") else {
      panic!("synthetic capture must succeed")
    };
    assert_eq!(first.reference, "synthetic_wallet_WALLETORDER1");
    assert_eq!(first.reference, again.reference);
  }

  #[test]
  fn production_refuses_to_synthesize() {
    assert!(without_credentials("Stripe", true).is_none());
    let failure = without_credentials("Stripe", false).unwrap();
    assert_eq!(failure.kind, PaymentErrorKind::AuthenticationMisconfigured);
  }
}
