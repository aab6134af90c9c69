// tokencart_service/src/models/product.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// The slice of a catalog product the checkout reads: token grants and scheduled access.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
  pub id: String,
  pub name: String,
  pub active: bool,
  pub provides_tokens: bool,
  pub token_quantity: i64,
  pub access_starts_at: Option<DateTime<Utc>>,
  pub access_ends_at: Option<DateTime<Utc>>,
  pub access_details: Option<String>,
}

impl Product {
  /// Tokens granted per unit purchased, or 0 if this product grants none.
  pub fn tokens_per_unit(&self) -> i64 {
    if self.active && self.provides_tokens {
      self.token_quantity.max(0)
    } else {
      0
    }
  }

  pub fn is_scheduled_access(&self) -> bool {
    self.access_starts_at.is_some() || self.access_details.is_some()
  }
}
