// tokencart_service/src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
  Development,
  Test,
  Production,
}

impl AppEnv {
  fn parse(value: &str) -> Result<Self> {
    match value.trim().to_ascii_lowercase().as_str() {
      "development" | "dev" => Ok(AppEnv::Development),
      "test" => Ok(AppEnv::Test),
      "production" | "prod" => Ok(AppEnv::Production),
      other => Err(AppError::Config(format!("Invalid APP_ENV '{}'", other))),
    }
  }

  /// Payments may be synthesized when credentials are absent, everywhere but production.
  pub fn allows_synthetic_payments(&self) -> bool {
    *self != AppEnv::Production
  }
}

#[derive(Clone)]
pub struct CardGatewayConfig {
  pub secret_key: Option<String>,
  pub api_base: String,
}

#[derive(Clone)]
pub struct WalletGatewayConfig {
  pub client_id: Option<String>,
  pub client_secret: Option<String>,
  pub api_base: String,
}

impl WalletGatewayConfig {
  pub fn credentials(&self) -> Option<(&str, &str)> {
    match (self.client_id.as_deref(), self.client_secret.as_deref()) {
      (Some(id), Some(secret)) => Some((id, secret)),
      _ => None,
    }
  }
}

#[derive(Clone)]
pub struct NotificationConfig {
  pub relay_url: Option<String>,
  pub relay_api_key: Option<String>,
  pub sender: String,
  pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  pub database_url: String,
  pub database_max_connections: u32,
  pub app_env: AppEnv,
  pub base_currency: String,
  pub gateway_timeout: Duration,
  pub card: CardGatewayConfig,
  pub wallet: WalletGatewayConfig,
  pub notifications: NotificationConfig,
}

// Secrets stay out of the logs.
impl std::fmt::Debug for CardGatewayConfig {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("CardGatewayConfig")
      .field("secret_key", &self.secret_key.as_ref().map(|_| "[REDACTED]"))
      .field("api_base", &self.api_base)
      .finish()
  }
}

impl std::fmt::Debug for WalletGatewayConfig {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("WalletGatewayConfig")
      .field("client_id", &self.client_id)
      .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
      .field("api_base", &self.api_base)
      .finish()
  }
}

impl std::fmt::Debug for NotificationConfig {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("NotificationConfig")
      .field("relay_url", &self.relay_url)
      .field("relay_api_key", &self.relay_api_key.as_ref().map(|_| "[REDACTED]"))
      .field("sender", &self.sender)
      .field("timeout", &self.timeout)
      .finish()
  }
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok(); // Load .env file if present
    let config = Self::from_lookup(|var_name| env::var(var_name).ok())?;
    tracing::info!(app_env = ?config.app_env, "Application configuration loaded successfully.");
    tracing::debug!(config = ?config, "Loaded config details");
    Ok(config)
  }

  /// Builds the configuration from any variable source. Empty values count as unset.
  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    let get_env = |var_name: &str| lookup(var_name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let parse_env = |var_name: &str, default: u64| -> Result<u64> {
      match get_env(var_name) {
        Some(v) => v
          .parse::<u64>()
          .map_err(|e| AppError::Config(format!("Invalid {}: {}", var_name, e))),
        None => Ok(default),
      }
    };

    let server_host = get_env("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
    let server_port = u16::try_from(parse_env("SERVER_PORT", 8080)?)
      .map_err(|e| AppError::Config(format!("Invalid SERVER_PORT: {}", e)))?;
    let database_url = get_env("DATABASE_URL").unwrap_or_else(|| "sqlite://tokencart.db?mode=rwc".to_string());
    let database_max_connections = u32::try_from(parse_env("DATABASE_MAX_CONNECTIONS", 5)?)
      .map_err(|e| AppError::Config(format!("Invalid DATABASE_MAX_CONNECTIONS: {}", e)))?;
    let app_env = match get_env("APP_ENV") {
      Some(v) => AppEnv::parse(&v)?,
      None => AppEnv::Development,
    };
    let base_currency = get_env("BASE_CURRENCY")
      .unwrap_or_else(|| "USD".to_string())
      .to_ascii_uppercase();
    if base_currency.len() != 3 || !base_currency.bytes().all(|b| b.is_ascii_alphabetic()) {
      return Err(AppError::Config(format!("Invalid BASE_CURRENCY '{}'", base_currency)));
    }
    let gateway_timeout = Duration::from_secs(parse_env("GATEWAY_TIMEOUT_SECS", 30)?);

    let card = CardGatewayConfig {
      secret_key: get_env("STRIPE_SECRET_KEY"),
      api_base: get_env("STRIPE_API_BASE").unwrap_or_else(|| "https://api.stripe.com".to_string()),
    };
    let wallet = WalletGatewayConfig {
      client_id: get_env("PAYPAL_CLIENT_ID"),
      client_secret: get_env("PAYPAL_CLIENT_SECRET"),
      api_base: get_env("PAYPAL_API_BASE").unwrap_or_else(|| "https://api-m.sandbox.paypal.com".to_string()),
    };
    let notifications = NotificationConfig {
      relay_url: get_env("MAIL_RELAY_URL"),
      relay_api_key: get_env("MAIL_RELAY_API_KEY"),
      sender: get_env("MAIL_SENDER").unwrap_or_else(|| "orders@tokencart.local".to_string()),
      timeout: Duration::from_secs(parse_env("NOTIFICATION_TIMEOUT_SECS", 10)?),
    };

    if app_env == AppEnv::Production {
      if card.secret_key.is_none() {
        tracing::error!("STRIPE_SECRET_KEY is not set in production: card charges will fail.");
      }
      if wallet.credentials().is_none() {
        tracing::error!("PayPal credentials are not set in production: wallet payments will fail.");
      }
    }

    Ok(Self {
      server_host,
      server_port,
      database_url,
      database_max_connections,
      app_env,
      base_currency,
      gateway_timeout,
      card,
      wallet,
      notifications,
    })
  }
}
