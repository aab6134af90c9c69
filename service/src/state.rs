// tokencart_service/src/state.rs
use crate::config::AppConfig;
use crate::errors::{AppError, Result as AppResult};
use crate::pipelines::{CheckoutOrchestrator, CheckoutServices};
use crate::services::{Catalog, DiscountAccounting, NotificationDispatcher, OrderLedger, PaymentGateways, TokenLedger};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// How long a connection waits for another connection's write lock.
const DB_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct AppState {
  pub db_pool: SqlitePool,
  pub config: Arc<AppConfig>,
  pub orchestrator: Arc<CheckoutOrchestrator>,
  pub services: CheckoutServices,
}

impl AppState {
  /// Wires the services against `db_pool` using the real gateways and mailer from `config`.
  pub fn from_config(db_pool: SqlitePool, config: Arc<AppConfig>) -> AppResult<Self> {
    let payments = PaymentGateways::from_config(&config)?;
    let notifications = NotificationDispatcher::from_config(&config.notifications)?;
    Self::new(db_pool, config, payments, notifications)
  }

  /// Wires the services with the given gateways and dispatcher.
  pub fn new(
    db_pool: SqlitePool,
    config: Arc<AppConfig>,
    payments: PaymentGateways,
    notifications: NotificationDispatcher,
  ) -> AppResult<Self> {
    let services = CheckoutServices {
      orders: OrderLedger::new(db_pool.clone()),
      discounts: DiscountAccounting::new(db_pool.clone()),
      tokens: TokenLedger::new(db_pool.clone()),
      catalog: Catalog::new(db_pool.clone()),
      payments,
      notifications,
      base_currency: config.base_currency.clone(),
    };
    let orchestrator = Arc::new(CheckoutOrchestrator::new(services.clone())?);
    Ok(Self {
      db_pool,
      config,
      orchestrator,
      services,
    })
  }
}

/// Opens the pool and brings the schema up to date.
pub async fn connect_database(config: &AppConfig) -> AppResult<SqlitePool> {
  let options = SqliteConnectOptions::from_str(&config.database_url)?
    .create_if_missing(true)
    .journal_mode(SqliteJournalMode::Wal)
    .busy_timeout(DB_BUSY_TIMEOUT)
    .foreign_keys(true);
  let pool = SqlitePoolOptions::new()
    .max_connections(config.database_max_connections)
    .connect_with(options)
    .await?;
  run_migrations(&pool).await?;
  info!(max_connections = config.database_max_connections, "Database ready.");
  Ok(pool)
}

pub async fn run_migrations(pool: &SqlitePool) -> AppResult<()> {
  sqlx::migrate!("./migrations")
    .run(pool)
    .await
    .map_err(|e| AppError::Config(format!("Database migration failed: {}", e)))
}
