// tokencart_service/src/services/order_ledger.rs

//! The authoritative order record.
//!
//! Orders are written once, as a single row holding the customer snapshot and the
//! serialized line items, and never updated afterwards.

use crate::errors::{AppError, Result as AppResult};
use crate::models::{NewOrder, Order, OrderStatus};
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Attempts at drawing a fresh order number before giving up.
const MAX_ORDER_NUMBER_ATTEMPTS: usize = 5;

/// `ORD-<UTC yyyymmddHHMMSS>-<12 upper-case hex>`. The suffix carries 48 random bits.
pub fn generate_order_number(now: DateTime<Utc>) -> String {
  let random = Uuid::new_v4().simple().to_string().to_uppercase();
  format!("ORD-{}-{}", now.format("%Y%m%d%H%M%S"), &random[..12])
}

#[derive(Debug, Clone)]
pub struct RecordedOrder {
  pub order: Order,
  /// The payment reference was already recorded; `order` is the earlier row.
  pub replayed: bool,
}

#[derive(Clone)]
pub struct OrderLedger {
  pool: SqlitePool,
}

impl OrderLedger {
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  /// Writes `order`, or returns the existing order carrying the same payment reference.
  #[instrument(skip_all, fields(account_id = %order.account_id, total = %order.total))]
  pub async fn record(&self, order: &NewOrder) -> AppResult<RecordedOrder> {
    let mut tx = self.pool.begin().await?;
    let (order, inserted) = idempotent_insert(order, &mut *tx).await?;
    tx.commit().await?;
    if inserted {
      info!(order_number = %order.order_number, "Order recorded.");
    } else {
      warn!(order_number = %order.order_number, "Payment reference already recorded, returning the existing order.");
    }
    Ok(RecordedOrder {
      order,
      replayed: !inserted,
    })
  }

  pub async fn fetch_by_number(&self, order_number: &str) -> AppResult<Option<Order>> {
    let mut conn = self.pool.acquire().await?;
    Ok(fetch_order_by_number(order_number, &mut *conn).await?)
  }

  /// The account's orders, newest first.
  pub async fn list_for_account(&self, account_id: &str, limit: i64, offset: i64) -> AppResult<Vec<Order>> {
    let orders = sqlx::query_as(
      r#"
        SELECT * FROM orders
        WHERE account_id = $1
        ORDER BY created_at DESC, id DESC
        LIMIT $2 OFFSET $3
      "#,
    )
    .bind(account_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&self.pool)
    .await?;
    Ok(orders)
  }
}

/// Inserts the order, returning `false` in the second position if its payment reference was already recorded.
///
/// A reference recorded for a different account is refused. The insert is the first statement so that,
/// inside a transaction, the write lock is taken up front and a busy database is waited on rather than
/// failing a read-to-write lock upgrade.
pub async fn idempotent_insert(order: &NewOrder, conn: &mut SqliteConnection) -> AppResult<(Order, bool)> {
  let created_at = Utc::now();
  for attempt in 1..=MAX_ORDER_NUMBER_ATTEMPTS {
    let order_number = generate_order_number(created_at);
    match insert_order(order, &order_number, created_at, conn).await {
      Ok(inserted) => return Ok((inserted, true)),
      Err(e) if unique_violation_on(&e, "orders.order_number") => {
        debug!(attempt, %order_number, "Order number collision, drawing another.");
      }
      Err(e) if unique_violation_on(&e, "orders.payment_reference") => {
        // Recorded earlier, or by a concurrent request.
        let reference = order.payment_reference.as_deref().unwrap_or_default();
        let existing = fetch_order_by_reference(reference, conn)
          .await?
          .ok_or_else(|| AppError::Persistence(format!("Order for payment {} vanished", reference)))?;
        return replay_of(existing, order);
      }
      Err(e) => return Err(e.into()),
    }
  }
  Err(AppError::Persistence(format!(
    "Could not allocate a unique order number after {} attempts",
    MAX_ORDER_NUMBER_ATTEMPTS
  )))
}

fn replay_of(existing: Order, order: &NewOrder) -> AppResult<(Order, bool)> {
  if existing.account_id != order.account_id {
    return Err(AppError::Persistence(format!(
      "Payment reference is already recorded on order {} for another account",
      existing.order_number
    )));
  }
  Ok((existing, false))
}

fn unique_violation_on(err: &sqlx::Error, column: &str) -> bool {
  err
    .as_database_error()
    .map(|db| db.is_unique_violation() && db.message().contains(column))
    .unwrap_or(false)
}

async fn insert_order(
  order: &NewOrder,
  order_number: &str,
  created_at: DateTime<Utc>,
  conn: &mut SqliteConnection,
) -> Result<Order, sqlx::Error> {
  sqlx::query_as(
    r#"
      INSERT INTO orders (
        order_number,
        account_id,
        customer,
        items,
        subtotal_cents,
        discount_cents,
        total_cents,
        currency,
        payment_method,
        payment_reference,
        synthetic_payment,
        status,
        created_at
      ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
      RETURNING *;
    "#,
  )
  .bind(order_number)
  .bind(&order.account_id)
  .bind(Json(&order.customer))
  .bind(Json(&order.items))
  .bind(order.subtotal)
  .bind(order.discount)
  .bind(order.total)
  .bind(&order.currency)
  .bind(order.payment_method)
  .bind(&order.payment_reference)
  .bind(order.synthetic_payment)
  .bind(OrderStatus::Completed)
  .bind(created_at)
  .fetch_one(conn)
  .await
}

pub async fn fetch_order_by_number(order_number: &str, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
  sqlx::query_as("SELECT * FROM orders WHERE order_number = $1")
    .bind(order_number)
    .fetch_optional(conn)
    .await
}

pub async fn fetch_order_by_reference(reference: &str, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
  sqlx::query_as("SELECT * FROM orders WHERE payment_reference = $1")
    .bind(reference)
    .fetch_optional(conn)
    .await
}
