//! Facilitator interface and remote HTTP client.
//!
//! The facilitator is the third-party service that cryptographically
//! verifies payment proofs and executes (settles) the on-chain transfer.
//! Transport failures are a distinct failure class from a negative
//! verification or settlement result: the former is an infrastructure
//! fault, the latter a client problem. The gate relies on that split for
//! logging and response taxonomy.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    header::PaymentPayload,
    requirements::PaymentRequirements,
    types::X402Version,
};

/// Default bounded timeout for facilitator requests. Exceeding it is a
/// settlement failure, not a hang.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Request body for both `/verify` and `/settle`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilitatorRequest {
    pub x402_version: X402Version,
    pub payment_payload: PaymentPayload,
    pub payment_requirements: PaymentRequirements,
}

/// Response from `POST /verify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<String>,
    #[serde(default)]
    pub payer: Option<String>,
}

/// Response from `POST /settle`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
    #[serde(default)]
    pub transaction: Option<String>,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub payer: Option<String>,
}

/// x402 facilitator interface.
///
/// `settle` must only be called after `verify` returned `is_valid = true`
/// for the same payload and requirements; the gate enforces that ordering.
pub trait Facilitator {
    type Error: std::error::Error + Send + Sync + 'static;

    fn verify(
        &self,
        request: FacilitatorRequest,
    ) -> impl Future<Output = Result<VerifyResponse, Self::Error>> + Send;

    fn settle(
        &self,
        request: FacilitatorRequest,
    ) -> impl Future<Output = Result<SettleResponse, Self::Error>> + Send;
}

/// A remote facilitator reached over HTTP.
#[derive(Debug, Clone)]
pub struct RemoteFacilitatorClient {
    pub base_url: Url,
    pub client: reqwest::Client,
}

#[derive(Debug, thiserror::Error)]
pub enum RemoteFacilitatorClientError {
    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),
    #[error("HTTP request error: {0}")]
    HttpRequestError(#[from] reqwest::Error),
    #[error("Facilitator returned {status}: {body}")]
    BadStatus { status: u16, body: String },
}

impl RemoteFacilitatorClient {
    /// Create a client with the default bounded timeout.
    pub fn from_url(base_url: Url) -> Result<Self, RemoteFacilitatorClientError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        mut base_url: Url,
        timeout: Duration,
    ) -> Result<Self, RemoteFacilitatorClientError> {
        // Url::join replaces the last path segment unless the base ends
        // with a slash
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(RemoteFacilitatorClient { base_url, client })
    }

    async fn post<Res>(
        &self,
        path: &str,
        request: &FacilitatorRequest,
    ) -> Result<Res, RemoteFacilitatorClientError>
    where
        Res: for<'de> Deserialize<'de>,
    {
        let url = self.base_url.join(path)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(url = %url, "Calling facilitator");

        let response = self.client.post(url).json(request).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteFacilitatorClientError::BadStatus { status, body });
        }

        Ok(response.json().await?)
    }
}

impl Facilitator for RemoteFacilitatorClient {
    type Error = RemoteFacilitatorClientError;

    async fn verify(&self, request: FacilitatorRequest) -> Result<VerifyResponse, Self::Error> {
        let response: VerifyResponse = self.post("verify", &request).await?;

        #[cfg(feature = "tracing")]
        if response.is_valid {
            tracing::debug!(payer = ?response.payer, "Payment verified");
        } else {
            tracing::debug!(reason = ?response.invalid_reason, "Payment rejected by facilitator");
        }

        Ok(response)
    }

    async fn settle(&self, request: FacilitatorRequest) -> Result<SettleResponse, Self::Error> {
        let response: SettleResponse = self.post("settle", &request).await?;

        #[cfg(feature = "tracing")]
        if response.success {
            tracing::debug!(
                transaction = ?response.transaction,
                network = ?response.network,
                "Payment settled"
            );
        } else {
            tracing::debug!(reason = ?response.error_reason, "Settlement rejected");
        }

        Ok(response)
    }
}
