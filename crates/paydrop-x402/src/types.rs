//! Core types shared across the protocol layer.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

pub type AnyJson = serde_json::Value;

/// The x402 protocol version carried on every wire message.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum X402Version {
    V1,
}

impl Serialize for X402Version {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            X402Version::V1 => serializer.serialize_i8(1),
        }
    }
}

impl<'de> Deserialize<'de> for X402Version {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let v = i8::deserialize(deserializer)?;
        match v {
            1 => Ok(X402Version::V1),
            _ => Err(serde::de::Error::custom(format!(
                "Unknown X402 version: {}",
                v
            ))),
        }
    }
}

impl Display for X402Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            X402Version::V1 => write!(f, "1"),
        }
    }
}

/// An asset amount in smallest units.
///
/// Serialized as a decimal string, because facilitators compare
/// `maxAmountRequired` by exact string/integer match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmountValue(pub u128);

impl AmountValue {
    /// Convert a USD-cent price into smallest units of an asset with the
    /// given decimal precision. Exact integer arithmetic only.
    ///
    /// A 6-decimal stablecoin priced in cents multiplies by `10^4`.
    pub fn from_cents(price_cents: u64, decimals: u8) -> Self {
        let cents = price_cents as u128;
        if decimals >= 2 {
            AmountValue(cents * 10u128.pow(decimals as u32 - 2))
        } else {
            AmountValue(cents / 10u128.pow(2 - decimals as u32))
        }
    }
}

impl From<u64> for AmountValue {
    fn from(value: u64) -> Self {
        AmountValue(value as u128)
    }
}

impl From<u128> for AmountValue {
    fn from(value: u128) -> Self {
        AmountValue(value)
    }
}

impl Display for AmountValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for AmountValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for AmountValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let value = s.parse::<u128>().map_err(serde::de::Error::custom)?;
        Ok(AmountValue(value))
    }
}
