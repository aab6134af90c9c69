// tokencart_service/src/web/mod.rs

pub mod handlers;
pub mod routes;

use crate::errors::AppError;
use actix_web::web;

pub use routes::configure_app_routes;

/// JSON extractor settings: malformed bodies become `{success:false, error}` 400s.
pub fn json_config() -> web::JsonConfig {
  web::JsonConfig::default()
    .limit(64 * 1024)
    .error_handler(|err, _req| AppError::Validation(format!("Invalid request body: {}", err)).into())
}
