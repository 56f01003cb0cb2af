//! HTTP surface.
//!
//! Two routes: the payment-gated product endpoint and the token
//! redemption endpoint that actually serves bytes.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use paydrop_store::{FsFileStore, Store};
use paydrop_x402::facilitator::Facilitator;
use paydrop_x402::header::{Base64EncodedHeader, X_PAYMENT, X_PAYMENT_RESPONSE};
use serde::Serialize;
use serde_json::json;

use crate::challenge::ChallengeMode;
use crate::error::{GateError, RedeemErrorResponse};
use crate::gate::PaymentGate;

/// Shared state behind the router.
pub struct AppState<F> {
    pub gate: Arc<PaymentGate<F>>,
    pub store: Store,
    pub files: FsFileStore,
}

impl<F> Clone for AppState<F> {
    fn clone(&self) -> Self {
        AppState {
            gate: self.gate.clone(),
            store: self.store.clone(),
            files: self.files.clone(),
        }
    }
}

/// 200 body for an admitted payment.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AdmittedDownload {
    token: String,
    /// Microseconds since the Unix epoch.
    expires_at: i64,
    download_url: String,
    product: ProductSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProductSummary {
    slug: String,
    title: String,
    price_cents: i64,
    filename: String,
}

pub fn router<F>(state: AppState<F>) -> Router
where
    F: Facilitator + Send + Sync + 'static,
{
    Router::new()
        .route("/download/{slug}", get(download::<F>))
        .route("/file/{token}", get(serve_file::<F>))
        .with_state(state)
}

async fn download<F>(
    State(state): State<AppState<F>>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> Result<Response, GateError>
where
    F: Facilitator + Send + Sync,
{
    let payment_header = headers
        .get(X_PAYMENT)
        .and_then(|value| value.to_str().ok());
    let mode = ChallengeMode::negotiate(&headers);

    let admitted = state.gate.admit(&slug, payment_header, mode).await?;

    let body = AdmittedDownload {
        token: admitted.token.token.clone(),
        expires_at: admitted.token.expires_at,
        download_url: format!("/file/{}", admitted.token.token),
        product: ProductSummary {
            slug: admitted.product.slug,
            title: admitted.product.title,
            price_cents: admitted.product.price_cents,
            filename: admitted.product.filename,
        },
    };

    let mut response = (StatusCode::OK, Json(body)).into_response();
    // A receipt that fails to encode costs the client its evidence
    // header, not the download
    let header_value = Base64EncodedHeader::try_from(admitted.receipt)
        .inspect_err(|err| tracing::warn!(error = %err, "Failed to encode settlement receipt"))
        .ok()
        .and_then(|encoded| HeaderValue::from_str(&encoded.0).ok());
    if let Some(value) = header_value {
        response.headers_mut().insert(X_PAYMENT_RESPONSE, value);
    }
    Ok(response)
}

async fn serve_file<F>(
    State(state): State<AppState<F>>,
    Path(token): Path<String>,
) -> Response
where
    F: Facilitator + Send + Sync,
{
    let handle = match state.store.tokens().redeem(&token) {
        Ok(handle) => handle,
        Err(err) => return RedeemErrorResponse(err).into_response(),
    };

    match state.files.load(&handle.file_key) {
        Ok(Some(bytes)) => {
            let disposition = format!("attachment; filename=\"{}\"", handle.filename);
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, handle.mime_type),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                bytes,
            )
                .into_response()
        }
        Ok(None) => {
            tracing::error!(file_key = %handle.file_key, "File missing for valid token");
            (
                StatusCode::NOT_FOUND,
                Json(json!({"error": "File not found"})),
            )
                .into_response()
        }
        Err(err) => {
            tracing::error!(error = %err, "Failed to read file");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response()
        }
    }
}
