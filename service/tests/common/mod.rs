// tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokencart_service::config::AppConfig;
use tokencart_service::errors::{AppError, Result as AppResult};
use tokencart_service::models::{CheckoutRequest, DiscountCode, Money, Product};
use tokencart_service::services::notifications::{Mailer, OutgoingEmail};
use tokencart_service::services::payment::{
  CapturedPayment, PaymentDetails, PaymentErrorKind, PaymentFailure, PaymentGateway, PaymentGateways, PaymentResult,
  RedirectGateway, RedirectOrder,
};
use tokencart_service::services::NotificationDispatcher;
use tokencart_service::state::{connect_database, run_migrations, AppState};
use tracing::Level;

pub const ACCOUNT: &str = "acct-ada";

static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

/// A fresh in-memory database. One connection, kept open, so every query sees the same database.
pub async fn test_pool() -> SqlitePool {
  let pool = SqlitePoolOptions::new()
    .max_connections(1)
    .min_connections(1)
    .idle_timeout(None)
    .max_lifetime(None)
    .connect("sqlite::memory:")
    .await
    .unwrap();
  run_migrations(&pool).await.unwrap();
  pool
}

/// A database file opened the way the server opens it, behind `max_connections` connections.
///
/// Statements from different tasks really contend here. The file lives as long as the returned dir.
pub async fn file_pool(max_connections: u32) -> (TempDir, SqlitePool) {
  let dir = tempfile::tempdir().unwrap();
  let url = format!("sqlite://{}?mode=rwc", dir.path().join("tokencart.db").display());
  let config = AppConfig::from_lookup(|key| match key {
    "APP_ENV" => Some("test".to_string()),
    "DATABASE_URL" => Some(url.clone()),
    "DATABASE_MAX_CONNECTIONS" => Some(max_connections.to_string()),
    _ => None,
  })
  .unwrap();
  let pool = connect_database(&config).await.unwrap();
  (dir, pool)
}

pub fn test_config() -> AppConfig {
  AppConfig::from_lookup(|key| match key {
    "APP_ENV" => Some("test".to_string()),
    "DATABASE_URL" => Some("sqlite::memory:".to_string()),
    _ => None,
  })
  .unwrap()
}

// --- Gateways ---

#[derive(Debug, Clone)]
pub enum ChargeBehavior {
  /// Captures the requested amount under a fresh reference.
  Capture,
  /// Captures the requested amount, always under this reference.
  CaptureWithReference(String),
  /// Captures a different amount than requested.
  CaptureAmount(Money),
  Decline,
  Unavailable,
}

pub struct FakeGateway {
  behavior: ChargeBehavior,
  calls: AtomicUsize,
}

impl FakeGateway {
  pub fn new(behavior: ChargeBehavior) -> Arc<Self> {
    Arc::new(Self {
      behavior,
      calls: AtomicUsize::new(0),
    })
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  fn outcome(&self, amount: Money, currency: &str) -> PaymentResult {
    let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
    let captured = |reference: String, amount: Money| {
      PaymentResult::Captured(CapturedPayment {
        reference,
        amount,
        currency: currency.to_string(),
        status: "succeeded".to_string(),
        synthetic: false,
      })
    };
    match &self.behavior {
      ChargeBehavior::Capture => captured(format!("fake_ref_{}", n), amount),
      ChargeBehavior::CaptureWithReference(reference) => captured(reference.clone(), amount),
      ChargeBehavior::CaptureAmount(other) => captured(format!("fake_ref_{}", n), *other),
      ChargeBehavior::Decline => PaymentResult::Declined(
        PaymentFailure::new(PaymentErrorKind::CardDeclined)
          .with_status("insufficient_funds")
          .with_diagnostic("Your card has insufficient funds."),
      ),
      ChargeBehavior::Unavailable => PaymentResult::GatewayError(
        PaymentFailure::new(PaymentErrorKind::GatewayUnavailable).with_diagnostic("connection refused"),
      ),
    }
  }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
  fn name(&self) -> &'static str {
    "fake"
  }

  async fn charge(&self, _details: &PaymentDetails, amount: Money, currency: &str) -> PaymentResult {
    self.outcome(amount, currency)
  }
}

#[async_trait]
impl RedirectGateway for FakeGateway {
  async fn create_redirect_order(&self, amount: Money, _currency: &str) -> Result<RedirectOrder, PaymentFailure> {
    if amount.cents() <= 0 {
      return Err(PaymentFailure::invalid("Amount must be positive"));
    }
    Ok(RedirectOrder {
      order_id: "FAKE-WALLET-ORDER".to_string(),
      status: "CREATED".to_string(),
      approval_url: Some("https://wallet.test/approve/FAKE-WALLET-ORDER".to_string()),
    })
  }

  async fn capture_redirect_order(&self, _order_id: &str, expected_amount: Money, currency: &str) -> PaymentResult {
    self.outcome(expected_amount, currency)
  }
}

// --- Mailers ---

#[derive(Default)]
pub struct RecordingMailer {
  sent: Mutex<Vec<OutgoingEmail>>,
}

impl RecordingMailer {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn sent(&self) -> Vec<OutgoingEmail> {
    self.sent.lock().unwrap().clone()
  }
}

#[async_trait]
impl Mailer for RecordingMailer {
  async fn deliver(&self, email: &OutgoingEmail) -> AppResult<()> {
    self.sent.lock().unwrap().push(email.clone());
    Ok(())
  }
}

pub struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
  async fn deliver(&self, _email: &OutgoingEmail) -> AppResult<()> {
    Err(AppError::Notification("relay answered HTTP 503".to_string()))
  }
}

pub struct SlowMailer(pub Duration);

#[async_trait]
impl Mailer for SlowMailer {
  async fn deliver(&self, _email: &OutgoingEmail) -> AppResult<()> {
    tokio::time::sleep(self.0).await;
    Ok(())
  }
}

// --- Application ---

pub struct Harness {
  pub state: AppState,
  pub card: Arc<FakeGateway>,
  pub wallet: Arc<FakeGateway>,
  /// Backing file of a file-based harness.
  pub db_dir: Option<TempDir>,
}

pub async fn harness(card: ChargeBehavior, mailer: Arc<dyn Mailer>) -> Harness {
  harness_with_timeout(card, mailer, Duration::from_secs(5)).await
}

pub async fn harness_with_timeout(card: ChargeBehavior, mailer: Arc<dyn Mailer>, notify_timeout: Duration) -> Harness {
  setup_tracing();
  build_harness(test_pool().await, None, card, mailer, notify_timeout)
}

/// Like `harness`, over a multi-connection database file.
pub async fn file_harness(card: ChargeBehavior, mailer: Arc<dyn Mailer>) -> Harness {
  setup_tracing();
  let (dir, pool) = file_pool(8).await;
  build_harness(pool, Some(dir), card, mailer, Duration::from_secs(5))
}

fn build_harness(
  pool: SqlitePool,
  db_dir: Option<TempDir>,
  card: ChargeBehavior,
  mailer: Arc<dyn Mailer>,
  notify_timeout: Duration,
) -> Harness {
  let card = FakeGateway::new(card);
  let wallet = FakeGateway::new(ChargeBehavior::Capture);
  let payments = PaymentGateways::new(card.clone(), wallet.clone());
  let notifications = NotificationDispatcher::new(mailer, "orders@tokencart.test".to_string(), notify_timeout);
  let state = AppState::new(pool, Arc::new(test_config()), payments, notifications).unwrap();
  Harness {
    state,
    card,
    wallet,
    db_dir,
  }
}

pub async fn seed_token_product(state: &AppState, id: &str, tokens_per_unit: i64) {
  state
    .services
    .catalog
    .upsert_product(&Product {
      id: id.to_string(),
      name: format!("{} token pack", tokens_per_unit),
      active: true,
      provides_tokens: true,
      token_quantity: tokens_per_unit,
      access_starts_at: None,
      access_ends_at: None,
      access_details: None,
    })
    .await
    .unwrap();
}

pub async fn seed_code(state: &AppState, code: &str, percentage: u8) -> DiscountCode {
  state.services.discounts.upsert_code(code, percentage, true).await.unwrap()
}

// --- Requests ---

pub fn item(id: &str, price: f64, quantity: i64) -> Value {
  json!({"id": id, "name": format!("Item {}", id), "price": price, "quantity": quantity})
}

pub fn card_checkout(items: Vec<Value>, subtotal: f64, discount: f64, total: f64, code: Option<&str>) -> Value {
  json!({
    "customer": {"firstName": "Ada", "lastName": "Lovelace", "email": "ada@example.com"},
    "order": {"items": items, "subtotal": subtotal, "discount": discount, "total": total},
    "payment": {"method": "card", "paymentMethodId": "pm_card_visa"},
    "discountCode": code,
  })
}

pub fn wallet_checkout(items: Vec<Value>, subtotal: f64, total: f64, order_id: &str) -> Value {
  json!({
    "customer": {"firstName": "Ada", "email": "ada@example.com"},
    "order": {"items": items, "subtotal": subtotal, "discount": 0, "total": total},
    "payment": {"method": "paypal", "orderId": order_id},
  })
}

pub fn request(body: Value) -> CheckoutRequest {
  serde_json::from_value(body).unwrap()
}
