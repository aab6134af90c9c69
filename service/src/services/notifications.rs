// tokencart_service/src/services/notifications.rs

//! Best-effort order confirmations.
//!
//! The dispatcher never returns an error: a failed or timed-out delivery is logged
//! and reported as `sent: false`.

use crate::config::NotificationConfig;
use crate::errors::{AppError, Result as AppResult};
use crate::models::{LineItem, Money, Product};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingEmail {
  pub from: String,
  pub to: String,
  pub subject: String,
  pub text: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
  async fn deliver(&self, email: &OutgoingEmail) -> AppResult<()>;
}

/// Posts the message as JSON to an HTTP mail relay.
pub struct RelayMailer {
  client: reqwest::Client,
  url: String,
  api_key: Option<String>,
}

impl RelayMailer {
  pub fn new(url: String, api_key: Option<String>, timeout: Duration) -> AppResult<Self> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| AppError::Config(format!("Could not build mail relay client: {}", e)))?;
    Ok(Self { client, url, api_key })
  }
}

#[async_trait]
impl Mailer for RelayMailer {
  async fn deliver(&self, email: &OutgoingEmail) -> AppResult<()> {
    let mut request = self.client.post(&self.url).json(email);
    if let Some(key) = &self.api_key {
      request = request.bearer_auth(key);
    }
    let response = request
      .send()
      .await
      .map_err(|e| AppError::Notification(format!("Mail relay unreachable: {}", e)))?;
    let status = response.status();
    if !status.is_success() {
      return Err(AppError::Notification(format!("Mail relay answered HTTP {}", status)));
    }
    Ok(())
  }
}

/// Used when no relay is configured: the rendered message goes to the log.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
  async fn deliver(&self, email: &OutgoingEmail) -> AppResult<()> {
    info!(to = %email.to, subject = %email.subject, body = %email.text, "No mail relay configured, logging message.");
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledAccess {
  pub product_name: String,
  pub starts_at: Option<DateTime<Utc>>,
  pub ends_at: Option<DateTime<Utc>>,
  pub details: Option<String>,
}

impl ScheduledAccess {
  /// Access entries for the purchased products that are scheduled-access products.
  pub fn for_items(items: &[LineItem], products: &[Product]) -> Vec<ScheduledAccess> {
    products
      .iter()
      .filter(|p| p.is_scheduled_access() && items.iter().any(|i| i.id == p.id))
      .map(|p| ScheduledAccess {
        product_name: p.name.clone(),
        starts_at: p.access_starts_at,
        ends_at: p.access_ends_at,
        details: p.access_details.clone(),
      })
      .collect()
  }
}

#[derive(Debug, Clone)]
pub struct OrderConfirmation {
  pub recipient_email: String,
  pub recipient_name: String,
  pub order_number: String,
  pub items: Vec<LineItem>,
  pub subtotal: Money,
  pub discount: Money,
  pub total: Money,
  pub currency: String,
  pub tokens_added: Option<i64>,
  pub access: Vec<ScheduledAccess>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NotificationReport {
  pub sent: bool,
}

/// Subject and plain-text body of the confirmation.
pub fn render_confirmation(confirmation: &OrderConfirmation) -> (String, String) {
  let subject = format!("Your order {} is confirmed", confirmation.order_number);
  let mut body = String::new();
  let currency = &confirmation.currency;
  let _ = writeln!(body, "Hi {},", confirmation.recipient_name);
  let _ = writeln!(body);
  let _ = writeln!(body, "Thank you for your order {}.", confirmation.order_number);
  let _ = writeln!(body);
  for item in &confirmation.items {
    let _ = writeln!(
      body,
      "  {} x {} @ {} {} = {} {}",
      item.quantity,
      item.name,
      item.price,
      currency,
      item.line_total().unwrap_or(Money::ZERO),
      currency
    );
  }
  let _ = writeln!(body);
  let _ = writeln!(body, "Subtotal: {} {}", confirmation.subtotal, currency);
  if !confirmation.discount.is_zero() {
    let _ = writeln!(body, "Discount: -{} {}", confirmation.discount, currency);
  }
  let _ = writeln!(body, "Total:    {} {}", confirmation.total, currency);
  if let Some(tokens) = confirmation.tokens_added {
    let _ = writeln!(body);
    let _ = writeln!(body, "{} tokens have been added to your account.", tokens);
  }
  if !confirmation.access.is_empty() {
    let _ = writeln!(body);
    let _ = writeln!(body, "Access details:");
    for access in &confirmation.access {
      let _ = write!(body, "  {}", access.product_name);
      match (access.starts_at, access.ends_at) {
        (Some(start), Some(end)) => {
          let _ = write!(body, ": {} to {}", start.format("%Y-%m-%d %H:%M UTC"), end.format("%Y-%m-%d %H:%M UTC"));
        }
        (Some(start), None) => {
          let _ = write!(body, ": from {}", start.format("%Y-%m-%d %H:%M UTC"));
        }
        _ => {}
      }
      let _ = writeln!(body);
      if let Some(details) = &access.details {
        let _ = writeln!(body, "    {}", details);
      }
    }
  }
  (subject, body)
}

#[derive(Clone)]
pub struct NotificationDispatcher {
  mailer: Arc<dyn Mailer>,
  sender: String,
  timeout: Duration,
}

impl NotificationDispatcher {
  pub fn new(mailer: Arc<dyn Mailer>, sender: String, timeout: Duration) -> Self {
    Self { mailer, sender, timeout }
  }

  /// A relay mailer when `MAIL_RELAY_URL` is set, otherwise the log mailer.
  pub fn from_config(config: &NotificationConfig) -> AppResult<Self> {
    let mailer: Arc<dyn Mailer> = match &config.relay_url {
      Some(url) => Arc::new(RelayMailer::new(url.clone(), config.relay_api_key.clone(), config.timeout)?),
      None => {
        warn!("MAIL_RELAY_URL not set: order confirmations will only be logged.");
        Arc::new(LogMailer)
      }
    };
    Ok(Self::new(mailer, config.sender.clone(), config.timeout))
  }

  #[instrument(name = "NotificationDispatcher::send_order_confirmation", skip_all, fields(order_number = %confirmation.order_number))]
  pub async fn send_order_confirmation(&self, confirmation: &OrderConfirmation) -> NotificationReport {
    let (subject, text) = render_confirmation(confirmation);
    let email = OutgoingEmail {
      from: self.sender.clone(),
      to: confirmation.recipient_email.clone(),
      subject,
      text,
    };
    match tokio::time::timeout(self.timeout, self.mailer.deliver(&email)).await {
      Ok(Ok(())) => {
        info!("Order confirmation sent.");
        NotificationReport { sent: true }
      }
      Ok(Err(e)) => {
        warn!(error = %e, "Order confirmation failed.");
        NotificationReport { sent: false }
      }
      Err(_) => {
        warn!(timeout_secs = self.timeout.as_secs_f64(), "Order confirmation timed out.");
        NotificationReport { sent: false }
      }
    }
  }
}
