//! Gate error taxonomy and HTTP mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use paydrop_store::{RedeemError, StoreError};
use paydrop_x402::requirements::PaymentRequired;
use serde_json::json;

/// Failures of the payment-gated download path.
///
/// Every payment problem, whether the client's (bad proof, rejected
/// verification) or ours (facilitator unreachable), resolves to a 402
/// carrying the full challenge so the client can always retry from the
/// response alone.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("Product not found")]
    ProductNotFound,

    #[error("{}", challenge.error)]
    PaymentRequired {
        challenge: PaymentRequired,
        /// Rendered paywall page, present when the client negotiated HTML.
        html: Option<String>,
    },

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        match self {
            GateError::ProductNotFound => (
                StatusCode::NOT_FOUND,
                Json(json!({"error": "Product not found"})),
            )
                .into_response(),
            GateError::PaymentRequired { challenge, html } => match html {
                Some(page) => (StatusCode::PAYMENT_REQUIRED, Html(page)).into_response(),
                None => (StatusCode::PAYMENT_REQUIRED, Json(challenge)).into_response(),
            },
            GateError::Storage(err) => {
                tracing::error!(error = %err, "Storage failure");
                internal_error()
            }
            GateError::Internal(message) => {
                tracing::error!(%message, "Internal failure");
                internal_error()
            }
        }
    }
}

/// HTTP mapping for token redemption failures.
///
/// 404 unknown, 410 expired, 429 over the download limit.
pub struct RedeemErrorResponse(pub RedeemError);

impl IntoResponse for RedeemErrorResponse {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            RedeemError::NotFound => (StatusCode::NOT_FOUND, "Download token not found"),
            RedeemError::Expired => (StatusCode::GONE, "Download token has expired"),
            RedeemError::LimitExceeded => (StatusCode::TOO_MANY_REQUESTS, "Download limit exceeded"),
            RedeemError::Store(err) => {
                tracing::error!(error = %err, "Storage failure during redemption");
                return internal_error();
            }
        };
        (status, Json(json!({"error": message}))).into_response()
    }
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": "Internal server error"})),
    )
        .into_response()
}
