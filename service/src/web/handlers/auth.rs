// tokencart_service/src/web/handlers/auth.rs

use crate::errors::AppError;
use actix_web::{FromRequest, HttpRequest};
use tracing::warn;

pub const ACCOUNT_HEADER: &str = "X-Account-Id";

/// The account the upstream session layer authenticated, passed in a trusted header.
#[derive(Debug, Clone)]
pub struct AuthenticatedAccount {
  pub account_id: String,
}

impl FromRequest for AuthenticatedAccount {
  type Error = AppError;
  type Future = futures_util::future::Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
    let account_id = req
      .headers()
      .get(ACCOUNT_HEADER)
      .and_then(|value| value.to_str().ok())
      .map(str::trim)
      .filter(|value| !value.is_empty() && value.len() <= 128);

    match account_id {
      Some(account_id) => futures_util::future::ready(Ok(AuthenticatedAccount {
        account_id: account_id.to_string(),
      })),
      None => {
        warn!("Missing or invalid {} header.", ACCOUNT_HEADER);
        futures_util::future::ready(Err(AppError::Auth("Authentication required".to_string())))
      }
    }
  }
}
