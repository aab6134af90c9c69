// tokencart_service/src/services/token_ledger.rs

//! Per-account token balances.
//!
//! Credits are unconditional additions. Debits are a single conditional update that
//! only applies while the balance covers them, so concurrent debits cannot overdraw.
//! Order grants are recorded in `token_grants`, keyed by order number, and a balance
//! is only credited when its grant row is new.

use crate::errors::{AppError, Result as AppResult};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenGrant {
  pub tokens: i64,
  /// `false` when the order had already been granted its tokens.
  pub newly_granted: bool,
}

#[derive(Clone)]
pub struct TokenLedger {
  pool: SqlitePool,
}

impl TokenLedger {
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  /// Adds `amount` tokens and returns the new balance. Amounts below 1 are refused.
  #[instrument(skip(self))]
  pub async fn credit(&self, account_id: &str, amount: i64) -> AppResult<i64> {
    let mut conn = self.pool.acquire().await?;
    credit_balance(account_id, amount, &mut *conn).await
  }

  /// Subtracts `amount` tokens if the balance covers it and returns the new balance.
  #[instrument(skip(self))]
  pub async fn debit(&self, account_id: &str, amount: i64) -> AppResult<i64> {
    if amount <= 0 {
      return Err(AppError::Validation(format!("Token debit must be positive, got {}", amount)));
    }
    let new_balance: Option<i64> = sqlx::query_scalar(
      r#"
        UPDATE token_balances
        SET balance = balance - $2, updated_at = $3
        WHERE account_id = $1 AND balance >= $2
        RETURNING balance
      "#,
    )
    .bind(account_id)
    .bind(amount)
    .bind(Utc::now())
    .fetch_optional(&self.pool)
    .await?;
    match new_balance {
      Some(balance) => {
        info!(balance, "Tokens debited.");
        Ok(balance)
      }
      None => {
        let available = self.balance(account_id).await?;
        warn!(available, "Token debit refused.");
        Err(AppError::InsufficientTokens {
          requested: amount,
          available,
        })
      }
    }
  }

  /// Current balance; accounts that never held tokens have 0.
  pub async fn balance(&self, account_id: &str) -> AppResult<i64> {
    let balance: Option<i64> = sqlx::query_scalar("SELECT balance FROM token_balances WHERE account_id = $1")
      .bind(account_id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(balance.unwrap_or(0))
  }

  /// Credits `tokens` for `order_number` unless that order was already granted.
  #[instrument(skip(self))]
  pub async fn grant_for_order(&self, order_number: &str, account_id: &str, tokens: i64) -> AppResult<TokenGrant> {
    if tokens <= 0 {
      return Err(AppError::TokenCredit(format!("Token grant must be positive, got {}", tokens)));
    }
    let mut tx = self.pool.begin().await?;
    let inserted = sqlx::query(
      r#"
        INSERT INTO token_grants (order_number, account_id, tokens, granted_at)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (order_number) DO NOTHING
      "#,
    )
    .bind(order_number)
    .bind(account_id)
    .bind(tokens)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?
    .rows_affected()
      == 1;

    if !inserted {
      let granted: i64 = sqlx::query_scalar("SELECT tokens FROM token_grants WHERE order_number = $1")
        .bind(order_number)
        .fetch_one(&mut *tx)
        .await?;
      info!(granted, "Order already granted its tokens.");
      return Ok(TokenGrant {
        tokens: granted,
        newly_granted: false,
      });
    }

    let balance = credit_balance(account_id, tokens, &mut *tx).await?;
    tx.commit().await?;
    info!(balance, "Order tokens credited.");
    Ok(TokenGrant {
      tokens,
      newly_granted: true,
    })
  }

  /// Tokens granted for `order_number`, if any.
  pub async fn grant_for(&self, order_number: &str) -> AppResult<Option<i64>> {
    Ok(
      sqlx::query_scalar("SELECT tokens FROM token_grants WHERE order_number = $1")
        .bind(order_number)
        .fetch_optional(&self.pool)
        .await?,
    )
  }
}

pub async fn credit_balance(account_id: &str, amount: i64, conn: &mut SqliteConnection) -> AppResult<i64> {
  if amount <= 0 {
    return Err(AppError::TokenCredit(format!("Token credit must be positive, got {}", amount)));
  }
  let balance = sqlx::query_scalar(
    r#"
      INSERT INTO token_balances (account_id, balance, updated_at)
      VALUES ($1, $2, $3)
      ON CONFLICT (account_id) DO UPDATE
        SET balance = balance + excluded.balance, updated_at = excluded.updated_at
      RETURNING balance
    "#,
  )
  .bind(account_id)
  .bind(amount)
  .bind(Utc::now())
  .fetch_one(conn)
  .await?;
  Ok(balance)
}
