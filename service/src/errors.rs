// tokencart_service/src/errors.rs

use crate::services::payment::PaymentFailure;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;
use tokencart_flow::FlowError;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("Authentication Failed: {0}")]
  Auth(String),

  #[error("Resource Not Found: {0}")]
  NotFound(String),

  /// The gateway processed the payment and refused it.
  #[error("Payment Declined: {0}")]
  PaymentDeclined(PaymentFailure),

  /// The gateway could not be used: unreachable, rate limited, misconfigured, or rejected the request.
  #[error("Payment Gateway Error: {0}")]
  PaymentGateway(PaymentFailure),

  /// Payment was captured but the order could not be written.
  #[error("Persistence Error: {0}")]
  Persistence(String),

  #[error("Discount Accounting Failure: {0}")]
  DiscountAccounting(String),

  #[error("Token Credit Failure: {0}")]
  TokenCredit(String),

  #[error("Notification Failure: {0}")]
  Notification(String),

  #[error("Insufficient token balance: requested {requested}, available {available}")]
  InsufficientTokens { requested: i64, available: i64 },

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error("Workflow Error: {source}")]
  Workflow {
    #[from]
    source: FlowError,
  },

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

impl AppError {
  /// Errors raised after payment capture that must never fail the checkout.
  pub fn is_non_fatal(&self) -> bool {
    matches!(
      self,
      AppError::DiscountAccounting(_) | AppError::TokenCredit(_) | AppError::Notification(_)
    )
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::Validation(_) | AppError::PaymentDeclined(_) | AppError::PaymentGateway(_) => StatusCode::BAD_REQUEST,
      AppError::Auth(_) => StatusCode::UNAUTHORIZED,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::InsufficientTokens { .. } => StatusCode::CONFLICT,
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    if status.is_server_error() {
      tracing::error!(application_error = %self, "Responding with error");
    } else {
      tracing::info!(application_error = %self, "Responding with client error");
    }
    let body = match self {
      AppError::Validation(m) | AppError::Auth(m) | AppError::NotFound(m) => json!({"success": false, "error": m}),
      AppError::PaymentDeclined(f) | AppError::PaymentGateway(f) => {
        let mut body = json!({
          "success": false,
          "error": f.kind.user_message(),
          "code": f.kind.code(),
          "retryable": f.kind.is_retryable(),
        });
        if let Some(status) = &f.gateway_status {
          body["gatewayStatus"] = json!(status);
        }
        if let Some(detail) = &f.diagnostic {
          body["detail"] = json!(detail);
        }
        body
      }
      AppError::InsufficientTokens { requested, available } => json!({
        "success": false,
        "error": "Insufficient token balance",
        "requested": requested,
        "available": available,
      }),
      AppError::Workflow { source } => {
        tracing::error!(flow_error_source = ?source, "Workflow error details");
        json!({"success": false, "error": "An internal error occurred"})
      }
      // Server-side details stay in the logs.
      _ => json!({"success": false, "error": "An internal error occurred"}),
    };
    HttpResponse::build(status).json(body)
  }
}

// Define a Result type alias for the application
pub type Result<T, E = AppError> = std::result::Result<T, E>;
