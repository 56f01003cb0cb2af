//! Payment requirement construction.
//!
//! A [`RequirementBuilder`] turns a priced resource into the canonical
//! [`PaymentRequirements`] the facilitator verifies against. The builder is
//! a pure function of its inputs: the same offer and resource URL always
//! produce byte-identical requirements, because facilitator verification
//! performs exact matching on the serialized value.

use alloy_primitives::Address;
use bon::Builder;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::types::{AmountValue, AnyJson, X402Version};

/// Canonical requirements for a single accepted payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// Scheme name, defined in "schemes" protocol
    pub scheme: String,
    /// Network name, defined in "schemes" protocol
    pub network: String,
    /// Maximum amount required for the payment in smallest units
    pub max_amount_required: AmountValue,
    /// Resource URL the payment grants access to
    pub resource: Url,
    /// Description of the resource
    pub description: String,
    /// MIME type of the payment payload
    pub mime_type: String,
    /// Destination address to pay to
    pub pay_to: String,
    /// Maximum timeout in seconds for the payment to be completed
    pub max_timeout_seconds: u64,
    /// Asset contract address
    pub asset: String,
    /// Extra fields for extensibility
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<AnyJson>,
}

/// The 402 challenge body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    pub x402_version: X402Version,
    pub error: String,
    pub accepts: Vec<PaymentRequirements>,
    /// The payer identified during verification, when available. Useful for
    /// client-side diagnostics after a rejected proof.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
}

/// The settlement asset a gate accepts, fixed at startup.
#[derive(Builder, Debug, Clone)]
pub struct SettlementAsset {
    /// Network name in x402 notation, e.g. "base-sepolia".
    #[builder(into)]
    pub network: String,
    /// Token contract address.
    pub address: Address,
    /// Decimal precision of the token.
    pub decimals: u8,
    /// Display name, carried in the `extra` field for EIP-712 signing.
    #[builder(into)]
    pub name: String,
    /// EIP-712 domain version, carried in the `extra` field.
    #[builder(into)]
    pub eip712_version: String,
}

impl SettlementAsset {
    /// USDC on Base Sepolia, the default testnet asset.
    pub fn usdc_base_sepolia() -> Self {
        SettlementAsset::builder()
            .network("base-sepolia")
            .address(alloy_primitives::address!(
                "0x036CbD53842c5426634e7929541eC2318f3dCF7e"
            ))
            .decimals(6)
            .name("USDC")
            .eip712_version("2")
            .build()
    }
}

/// A priced resource to build requirements for.
#[derive(Builder, Debug, Clone)]
pub struct ResourceOffer {
    /// Human-readable title, used in the requirement description.
    #[builder(into)]
    pub title: String,
    /// Price in USD cents. The single source of truth for the required
    /// amount; never taken from the client.
    pub price_cents: u64,
    /// The seller's wallet to pay to.
    pub pay_to: Address,
}

/// Builds canonical payment requirements for one settlement asset.
#[derive(Builder, Debug, Clone)]
pub struct RequirementBuilder {
    pub asset: SettlementAsset,
    /// Maximum seconds the client has to complete the payment.
    #[builder(default = 300)]
    pub max_timeout_seconds: u64,
}

impl RequirementBuilder {
    /// Build requirements for an offer at the given resource URL.
    ///
    /// Pure and deterministic: no I/O, no error paths. Invalid offers are
    /// rejected upstream by the catalog.
    pub fn build(&self, offer: &ResourceOffer, resource: Url) -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".to_string(),
            network: self.asset.network.clone(),
            max_amount_required: AmountValue::from_cents(offer.price_cents, self.asset.decimals),
            resource,
            description: format!("Download {}", offer.title),
            mime_type: "application/json".to_string(),
            pay_to: offer.pay_to.to_string(),
            max_timeout_seconds: self.max_timeout_seconds,
            asset: self.asset.address.to_string(),
            extra: Some(serde_json::json!({
                "name": self.asset.name,
                "version": self.asset.eip712_version,
            })),
        }
    }
}
