//! The payment gate: per-request orchestration of the x402 flow.
//!
//! One call to [`PaymentGate::admit`] walks a request through the whole
//! protocol: resolve the product, build the canonical requirements,
//! decode and verify the payment proof, settle it, record the settlement
//! and hand back a download token. The gate holds no per-request state;
//! everything durable lives in the store, keyed by transaction hash, so
//! a retried request converges on the same outcome.

use std::time::Duration;

use paydrop_store::{
    DownloadToken, Product, SettlementDetails, Store, TokenPolicy,
};
use paydrop_x402::{
    facilitator::{Facilitator, FacilitatorRequest},
    header::{Base64EncodedHeader, PaymentPayload, SettlementReceipt},
    requirements::{
        PaymentRequired, PaymentRequirements, RequirementBuilder, ResourceOffer,
    },
    types::X402Version,
};
use url::Url;

use crate::challenge::{ChallengeMode, paywall_html};
use crate::error::GateError;

/// A request that cleared the gate.
#[derive(Debug, Clone)]
pub struct AdmittedPayment {
    pub product: Product,
    pub token: DownloadToken,
    pub receipt: SettlementReceipt,
    /// True when the settlement had been admitted before and the
    /// original token was returned.
    pub replayed: bool,
}

/// Payment gate over one facilitator and one settlement asset.
pub struct PaymentGate<F> {
    facilitator: F,
    builder: RequirementBuilder,
    store: Store,
    public_base_url: Url,
    token_ttl: Duration,
}

impl<F: Facilitator> PaymentGate<F> {
    pub fn new(
        facilitator: F,
        builder: RequirementBuilder,
        store: Store,
        public_base_url: Url,
        token_ttl: Duration,
    ) -> Self {
        Self {
            facilitator,
            builder,
            store,
            public_base_url,
            token_ttl,
        }
    }

    /// Run the full payment flow for a product slug.
    ///
    /// `payment_header` is the raw `X-PAYMENT` value, if the client sent
    /// one. Every failure after product resolution is a 402 carrying the
    /// challenge; `mode` only affects the initial no-header challenge,
    /// since proof-bearing requests are wallet traffic.
    pub async fn admit(
        &self,
        slug: &str,
        payment_header: Option<&str>,
        mode: ChallengeMode,
    ) -> Result<AdmittedPayment, GateError> {
        let product = self
            .store
            .catalog()
            .get_by_slug(slug)?
            .ok_or(GateError::ProductNotFound)?;

        let requirements = self.requirements_for(&product, slug)?;

        let Some(header) = payment_header else {
            tracing::debug!(slug, "Challenging request without payment header");
            return Err(self.challenge(
                &product,
                &requirements,
                mode,
                "X-PAYMENT header is required",
                None,
            ));
        };

        let payload = match PaymentPayload::try_from(Base64EncodedHeader(header.to_string())) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::debug!(slug, error = %err, "Rejected malformed payment header");
                return Err(self.challenge(
                    &product,
                    &requirements,
                    ChallengeMode::Json,
                    &format!("Invalid payment header: {err}"),
                    None,
                ));
            }
        };

        let request = FacilitatorRequest {
            x402_version: X402Version::V1,
            payment_payload: payload,
            payment_requirements: requirements.clone(),
        };

        let verified = match self.facilitator.verify(request.clone()).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(slug, error = %err, "Facilitator unreachable during verification");
                return Err(self.challenge(
                    &product,
                    &requirements,
                    ChallengeMode::Json,
                    "Payment verification unavailable",
                    None,
                ));
            }
        };
        if !verified.is_valid {
            let reason = verified
                .invalid_reason
                .unwrap_or_else(|| "Payment verification failed".to_string());
            tracing::debug!(slug, %reason, "Payment rejected by facilitator");
            return Err(self.challenge(
                &product,
                &requirements,
                ChallengeMode::Json,
                &reason,
                verified.payer,
            ));
        }

        let settled = match self.facilitator.settle(request).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(slug, error = %err, "Facilitator unreachable during settlement");
                return Err(self.challenge(
                    &product,
                    &requirements,
                    ChallengeMode::Json,
                    "Payment settlement unavailable",
                    None,
                ));
            }
        };
        if !settled.success {
            let reason = settled
                .error_reason
                .unwrap_or_else(|| "Payment settlement failed".to_string());
            tracing::debug!(slug, %reason, "Settlement rejected by facilitator");
            return Err(self.challenge(
                &product,
                &requirements,
                ChallengeMode::Json,
                &reason,
                settled.payer,
            ));
        }
        let Some(transaction_hash) = settled.transaction else {
            tracing::warn!(slug, "Settlement succeeded without a transaction hash");
            return Err(self.challenge(
                &product,
                &requirements,
                ChallengeMode::Json,
                "Settlement response missing transaction hash",
                settled.payer,
            ));
        };

        let network = settled
            .network
            .unwrap_or_else(|| requirements.network.clone());
        let payer = settled.payer.or(verified.payer).unwrap_or_default();

        let details = SettlementDetails {
            transaction_hash: transaction_hash.clone(),
            network: network.clone(),
            payer_address: payer.clone(),
            recipient_address: product.seller_wallet.clone(),
            amount_paid: requirements.max_amount_required.to_string(),
            currency: self.builder.asset.name.clone(),
        };
        let policy = TokenPolicy {
            ttl: self.token_ttl,
            max_downloads: product.max_downloads,
        };
        let admission = self
            .store
            .ledger()
            .admit_settlement(&product.id, &details, policy)?;

        Ok(AdmittedPayment {
            product,
            token: admission.token,
            receipt: SettlementReceipt {
                success: true,
                transaction: transaction_hash,
                network,
                payer,
            },
            replayed: admission.replayed,
        })
    }

    fn requirements_for(
        &self,
        product: &Product,
        slug: &str,
    ) -> Result<PaymentRequirements, GateError> {
        let resource = self
            .public_base_url
            .join(&format!("download/{slug}"))
            .map_err(|err| GateError::Internal(format!("bad resource URL: {err}")))?;
        let offer = ResourceOffer::builder()
            .title(product.title.clone())
            .price_cents(product.price_cents as u64)
            .pay_to(product.seller_address()?)
            .build();
        Ok(self.builder.build(&offer, resource))
    }

    fn challenge(
        &self,
        product: &Product,
        requirements: &PaymentRequirements,
        mode: ChallengeMode,
        error: &str,
        payer: Option<String>,
    ) -> GateError {
        let challenge = PaymentRequired {
            x402_version: X402Version::V1,
            error: error.to_string(),
            accepts: vec![requirements.clone()],
            payer,
        };
        let html = match mode {
            ChallengeMode::Html => Some(paywall_html(product, &challenge)),
            ChallengeMode::Json => None,
        };
        GateError::PaymentRequired { challenge, html }
    }
}
