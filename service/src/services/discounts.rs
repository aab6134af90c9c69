// tokencart_service/src/services/discounts.rs

//! Percentage discount codes: lookup, amount computation and usage accounting.

use crate::errors::{AppError, Result as AppResult};
use crate::models::discount_code::normalize_code;
use crate::models::{DiscountCode, Money};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, instrument};

#[derive(Clone)]
pub struct DiscountAccounting {
  pool: SqlitePool,
}

impl DiscountAccounting {
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  /// Case-insensitive lookup. Inactive codes do not resolve.
  pub async fn resolve(&self, code: &str) -> AppResult<Option<DiscountCode>> {
    let mut conn = self.pool.acquire().await?;
    Ok(fetch_active_code(&normalize_code(code), &mut *conn).await?)
  }

  /// Adds one use to the code with a single conditional update.
  pub async fn apply_usage(&self, code_id: i64) -> AppResult<()> {
    let mut conn = self.pool.acquire().await?;
    increment_usage(code_id, &mut *conn).await
  }

  /// Records that `order_number` used the code and counts the use, once per order.
  ///
  /// Returns `false` when the order had already been counted.
  #[instrument(skip(self))]
  pub async fn redeem_for_order(&self, order_number: &str, code_id: i64) -> AppResult<bool> {
    let mut tx = self.pool.begin().await?;
    let inserted = sqlx::query(
      r#"
        INSERT INTO discount_redemptions (order_number, discount_code_id, redeemed_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (order_number) DO NOTHING
      "#,
    )
    .bind(order_number)
    .bind(code_id)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?
    .rows_affected()
      == 1;
    if !inserted {
      info!("Discount already counted for this order.");
      return Ok(false);
    }
    increment_usage(code_id, &mut *tx).await?;
    tx.commit().await?;
    info!("Discount usage counted.");
    Ok(true)
  }

  /// Creates or replaces a code. Used by seeding and administration.
  pub async fn upsert_code(&self, code: &str, percentage: u8, active: bool) -> AppResult<DiscountCode> {
    if percentage > 100 {
      return Err(AppError::Validation(format!("Discount percentage {} exceeds 100", percentage)));
    }
    let code = sqlx::query_as(
      r#"
        INSERT INTO discount_codes (code, percentage, active)
        VALUES ($1, $2, $3)
        ON CONFLICT (code) DO UPDATE SET percentage = excluded.percentage, active = excluded.active
        RETURNING *;
      "#,
    )
    .bind(normalize_code(code))
    .bind(percentage)
    .bind(active)
    .fetch_one(&self.pool)
    .await?;
    Ok(code)
  }
}

/// `subtotal × percentage / 100`, half-even to the cent.
pub fn discount_for(subtotal: Money, code: &DiscountCode) -> Money {
  subtotal.percent_of(code.percentage)
}

pub async fn fetch_active_code(code: &str, conn: &mut SqliteConnection) -> Result<Option<DiscountCode>, sqlx::Error> {
  sqlx::query_as("SELECT * FROM discount_codes WHERE code = $1 AND active = 1")
    .bind(code)
    .fetch_optional(conn)
    .await
}

pub async fn increment_usage(code_id: i64, conn: &mut SqliteConnection) -> AppResult<()> {
  let result = sqlx::query("UPDATE discount_codes SET usage_count = usage_count + 1 WHERE id = $1")
    .bind(code_id)
    .execute(conn)
    .await?;
  if result.rows_affected() != 1 {
    return Err(AppError::NotFound(format!("Discount code {} does not exist", code_id)));
  }
  Ok(())
}
