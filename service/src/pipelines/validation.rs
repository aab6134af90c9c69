// tokencart_service/src/pipelines/validation.rs

//! Checks a checkout must pass before any gateway is contacted.
//!
//! Amounts are recomputed server-side and compared with what the client declared.
//! A mismatch is rejected, never silently corrected.

use crate::errors::{AppError, Result as AppResult};
use crate::models::{CheckoutRequest, DiscountCode, Money, OrderDraft};
use crate::services::discounts::discount_for;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckedTotals {
  pub subtotal: Money,
  pub discount: Money,
  pub total: Money,
}

/// Required fields and per-line sanity.
pub fn check_request_shape(request: &CheckoutRequest) -> AppResult<()> {
  if request.customer.contact_email().is_none() {
    return Err(AppError::Validation("Customer email is required".to_string()));
  }
  if request.order.items.is_empty() {
    return Err(AppError::Validation("The cart is empty".to_string()));
  }
  for item in &request.order.items {
    if item.quantity < 1 {
      return Err(AppError::Validation(format!("Quantity for '{}' must be at least 1", item.name)));
    }
    if item.price.is_negative() {
      return Err(AppError::Validation(format!("Price for '{}' cannot be negative", item.name)));
    }
  }
  let draft = &request.order;
  if draft.subtotal.is_negative() || draft.discount.is_negative() || draft.total.is_negative() {
    return Err(AppError::Validation("Order amounts cannot be negative".to_string()));
  }
  Ok(())
}

/// Reconciles the declared amounts against the items and the resolved discount code.
pub fn check_totals(draft: &OrderDraft, code: Option<&DiscountCode>) -> AppResult<CheckedTotals> {
  if draft.subtotal.checked_sub(draft.discount) != Some(draft.total) {
    return Err(AppError::Validation(format!(
      "Declared total {} does not equal subtotal {} minus discount {}",
      draft.total, draft.subtotal, draft.discount
    )));
  }

  let subtotal = draft
    .items
    .iter()
    .try_fold(Money::ZERO, |sum, item| item.line_total().and_then(|line| sum.checked_add(line)))
    .ok_or_else(|| AppError::Validation("Order amounts are too large".to_string()))?;
  if subtotal != draft.subtotal {
    return Err(AppError::Validation(format!(
      "Declared subtotal {} does not match the items ({})",
      draft.subtotal, subtotal
    )));
  }

  let discount = match code {
    Some(code) => discount_for(subtotal, code),
    None if !draft.discount.is_zero() => {
      return Err(AppError::Validation(
        "A discount was declared without a discount code".to_string(),
      ));
    }
    None => Money::ZERO,
  };
  if discount != draft.discount {
    return Err(AppError::Validation(format!(
      "Declared discount {} does not match the discount code ({})",
      draft.discount, discount
    )));
  }

  Ok(CheckedTotals {
    subtotal,
    discount,
    total: subtotal - discount,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::{CustomerSnapshot, LineItem};
  use crate::services::payment::{CardDetails, PaymentDetails};

  fn draft(lines: &[(i64, i64)], subtotal: i64, discount: i64, total: i64) -> OrderDraft {
    OrderDraft {
      items: lines
        .iter()
        .enumerate()
        .map(|(i, (price, quantity))| LineItem {
          id: format!("p{}", i),
          name: format!("Product {}", i),
          price: Money::from_cents(*price),
          quantity: *quantity,
        })
        .collect(),
      subtotal: Money::from_cents(subtotal),
      discount: Money::from_cents(discount),
      total: Money::from_cents(total),
    }
  }

  fn save10() -> DiscountCode {
    DiscountCode {
      id: 1,
      code: "SAVE10".to_string(),
      percentage: 10,
      active: true,
      usage_count: 0,
    }
  }

  #[test]
  fn accepts_consistent_totals() {
    let totals = check_totals(&draft(&[(5000, 1)], 5000, 500, 4500), Some(&save10())).unwrap();
    assert_eq!(totals.total, Money::from_cents(4500));
    let totals = check_totals(&draft(&[(1999, 1)], 1999, 0, 1999), None).unwrap();
    assert_eq!(totals.discount, Money::ZERO);
  }

  #[test]
  fn rejects_total_drift() {
    // Client claims $40 where subtotal minus discount is $45.
    assert!(matches!(
      check_totals(&draft(&[(5000, 1)], 5000, 500, 4000), Some(&save10())),
      Err(AppError::Validation(_))
    ));
  }

  #[test]
  fn rejects_subtotal_and_discount_drift() {
    assert!(check_totals(&draft(&[(1000, 2)], 1500, 0, 1500), None).is_err());
    assert!(check_totals(&draft(&[(5000, 1)], 5000, 1000, 4000), Some(&save10())).is_err());
    assert!(check_totals(&draft(&[(5000, 1)], 5000, 500, 4500), None).is_err());
  }

  #[test]
  fn oversized_quantities_are_rejected_not_wrapped() {
    // 4c × (2^62 + 25) wraps to exactly $1.00 in 64 bits.
    let wrapping = draft(&[(4, (1 << 62) + 25)], 100, 0, 100);
    assert!(matches!(check_totals(&wrapping, None), Err(AppError::Validation(_))));

    let summed = draft(&[(i64::MAX, 1), (1, 1)], 0, 0, 0);
    assert!(matches!(check_totals(&summed, None), Err(AppError::Validation(_))));
  }

  #[test]
  fn request_shape_requires_email_and_items() {
    let mut request = CheckoutRequest {
      customer: CustomerSnapshot {
        email: Some("ada@example.com".to_string()),
        ..Default::default()
      },
      order: draft(&[(1999, 1)], 1999, 0, 1999),
      payment: PaymentDetails::Card(CardDetails::default()),
      discount_code: None,
    };
    assert!(check_request_shape(&request).is_ok());

    request.order.items[0].quantity = 0;
    assert!(check_request_shape(&request).is_err());
    request.order.items.clear();
    assert!(check_request_shape(&request).is_err());

    request.order = draft(&[(1999, 1)], 1999, 0, 1999);
    request.customer.email = Some("  ".to_string());
    assert!(check_request_shape(&request).is_err());
  }
}
