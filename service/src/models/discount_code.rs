// tokencart_service/src/models/discount_code.rs

use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DiscountCode {
  pub id: i64,
  /// Always upper-case.
  pub code: String,
  pub percentage: u8,
  pub active: bool,
  pub usage_count: i64,
}

/// Codes are matched case-insensitively and stored upper-case.
pub fn normalize_code(code: &str) -> String {
  code.trim().to_uppercase()
}
