// tokencart_service/src/main.rs

use actix_web::{web as actix_data, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use tokencart_service::config::AppConfig;
use tokencart_service::state::{connect_database, AppState};
use tokencart_service::web::{configure_app_routes, json_config};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let json = std::env::var("LOG_FORMAT").map(|v| v.eq_ignore_ascii_case("json")).unwrap_or(false);
  if json {
    tracing_subscriber::fmt()
      .json()
      .with_env_filter(filter)
      .with_span_events(FmtSpan::CLOSE)
      .init();
  } else {
    tracing_subscriber::fmt()
      .with_env_filter(filter)
      .with_span_events(FmtSpan::CLOSE)
      .init();
  }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
  init_tracing();
  tracing::info!("Starting tokencart server...");

  let app_config = Arc::new(AppConfig::from_env().context("loading configuration")?);
  tracing::info!(env = ?app_config.app_env, currency = %app_config.base_currency, "Configuration loaded.");
  if app_config.app_env.allows_synthetic_payments() {
    tracing::warn!("Synthetic payments are enabled for gateways without credentials.");
  }

  let db_pool = connect_database(&app_config).await.context("connecting to the database")?;
  let app_state = AppState::from_config(db_pool, app_config.clone()).context("building application state")?;

  let server_address = format!("{}:{}", app_config.server_host, app_config.server_port);
  tracing::info!("Binding server to {}...", server_address);

  HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone()))
      .app_data(json_config())
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(configure_app_routes)
  })
  .bind(&server_address)
  .with_context(|| format!("binding {}", server_address))?
  .run()
  .await?;

  Ok(())
}
