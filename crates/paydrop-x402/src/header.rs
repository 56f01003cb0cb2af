//! The `X-PAYMENT` / `X-PAYMENT-RESPONSE` header codec.
//!
//! Clients submit payment proofs as a base64-encoded JSON payload in the
//! `X-PAYMENT` request header. After settlement, the gate echoes the
//! settlement evidence back in the `X-PAYMENT-RESPONSE` header using the
//! same encoding. Decode failures always surface as [`crate::errors::Error`]
//! so the gate can answer with a structured 402 instead of an opaque
//! failure.

use std::fmt::Display;

use base64::{Engine, prelude::BASE64_STANDARD};
use serde::{Deserialize, Serialize};

use crate::types::{AnyJson, X402Version};

/// The name of the request header carrying the payment proof.
pub const X_PAYMENT: &str = "X-PAYMENT";

/// The name of the response header carrying the settlement receipt.
pub const X_PAYMENT_RESPONSE: &str = "X-PAYMENT-RESPONSE";

/// A client-supplied payment proof.
///
/// The inner `payload` (the signed transfer authorization) stays opaque to
/// the gate; only the facilitator interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    pub x402_version: X402Version,
    pub scheme: String,
    pub network: String,
    pub payload: AnyJson,
}

/// Settlement evidence attached to an admitted response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementReceipt {
    pub success: bool,
    pub transaction: String,
    pub network: String,
    pub payer: String,
}

/// A base64-encoded header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64EncodedHeader(pub String);

impl Serialize for Base64EncodedHeader {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Base64EncodedHeader {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Base64EncodedHeader(s))
    }
}

impl Display for Base64EncodedHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<PaymentPayload> for Base64EncodedHeader {
    type Error = serde_json::Error;

    fn try_from(value: PaymentPayload) -> Result<Self, Self::Error> {
        let json = serde_json::to_string(&value)?;
        let encoded = BASE64_STANDARD.encode(json);
        Ok(Base64EncodedHeader(encoded))
    }
}

impl TryFrom<Base64EncodedHeader> for PaymentPayload {
    type Error = crate::errors::Error;

    fn try_from(value: Base64EncodedHeader) -> Result<Self, Self::Error> {
        let decoded_bytes = BASE64_STANDARD.decode(&value.0)?;
        let json_str = String::from_utf8(decoded_bytes)?;
        let payload = serde_json::from_str(&json_str)?;
        Ok(payload)
    }
}

impl TryFrom<SettlementReceipt> for Base64EncodedHeader {
    type Error = serde_json::Error;

    fn try_from(value: SettlementReceipt) -> Result<Self, Self::Error> {
        let json = serde_json::to_string(&value)?;
        let encoded = BASE64_STANDARD.encode(json);
        Ok(Base64EncodedHeader(encoded))
    }
}

impl TryFrom<Base64EncodedHeader> for SettlementReceipt {
    type Error = crate::errors::Error;

    fn try_from(value: Base64EncodedHeader) -> Result<Self, Self::Error> {
        let decoded_bytes = BASE64_STANDARD.decode(&value.0)?;
        let json_str = String::from_utf8(decoded_bytes)?;
        let receipt = serde_json::from_str(&json_str)?;
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn example_payload() -> PaymentPayload {
        PaymentPayload {
            x402_version: X402Version::V1,
            scheme: "exact".to_string(),
            network: "base-sepolia".to_string(),
            payload: json!({
                "signature": "0xdeadbeef",
                "authorization": {
                    "from": "0x857b06519E91e3A54538791bDbb0E22373e36b66",
                    "to": "0x209693Bc6afc0C5328bA36FaF03C514EF312287C",
                    "value": "29990000",
                    "validAfter": "0",
                    "validBefore": "1924992000",
                    "nonce": "0x1234"
                }
            }),
        }
    }

    #[test]
    fn test_payment_payload_round_trip() {
        let payload = example_payload();
        let header = Base64EncodedHeader::try_from(payload.clone()).unwrap();
        let decoded = PaymentPayload::try_from(header).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_decode_rejects_invalid_base64() {
        let header = Base64EncodedHeader("not base64 at all!!!".to_string());
        assert!(matches!(
            PaymentPayload::try_from(header),
            Err(crate::errors::Error::Base64DecodeError(_))
        ));
    }

    #[test]
    fn test_decode_rejects_non_json_content() {
        let header = Base64EncodedHeader(BASE64_STANDARD.encode("just some text"));
        assert!(matches!(
            PaymentPayload::try_from(header),
            Err(crate::errors::Error::SerdeJsonError(_))
        ));
    }

    #[test]
    fn test_decode_rejects_missing_fields() {
        // Valid JSON, but not a payment payload
        let header = Base64EncodedHeader(BASE64_STANDARD.encode(r#"{"scheme": "exact"}"#));
        assert!(matches!(
            PaymentPayload::try_from(header),
            Err(crate::errors::Error::SerdeJsonError(_))
        ));
    }

    #[test]
    fn test_settlement_receipt_round_trip() {
        let receipt = SettlementReceipt {
            success: true,
            transaction: "0xabc123".to_string(),
            network: "base-sepolia".to_string(),
            payer: "0x857b06519E91e3A54538791bDbb0E22373e36b66".to_string(),
        };
        let header = Base64EncodedHeader::try_from(receipt.clone()).unwrap();
        let decoded = SettlementReceipt::try_from(header).unwrap();
        assert_eq!(decoded, receipt);
    }

    #[test]
    fn test_wire_field_names_are_camel_case() {
        let json = serde_json::to_value(example_payload()).unwrap();
        assert_eq!(json["x402Version"], 1);
        assert!(json.get("x402_version").is_none());
    }
}
