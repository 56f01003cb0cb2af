//! Process configuration.
//!
//! Everything the server needs is read once at startup from the
//! environment (with `.env` support via `dotenvy` in `main`). The
//! settlement asset defaults to USDC on Base Sepolia and can be
//! overridden per deployment; the protocol crate itself stays
//! network-agnostic.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use alloy_primitives::Address;
use paydrop_x402::requirements::SettlementAsset;
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {name}: {message}")]
    InvalidVar { name: &'static str, message: String },
}

/// Immutable server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// External base URL, used as the `resource` in payment requirements.
    pub public_base_url: Url,
    pub facilitator_url: Url,
    pub database_path: PathBuf,
    pub files_root: PathBuf,
    pub asset: SettlementAsset,
    pub token_ttl: Duration,
}

impl ServerConfig {
    /// Load configuration from the environment.
    ///
    /// `PAYDROP_PUBLIC_BASE_URL` and `PAYDROP_FACILITATOR_URL` are
    /// required; everything else has a development default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let asset = SettlementAsset::builder()
            .network(var_or("PAYDROP_NETWORK", "base-sepolia"))
            .address(parse_var(
                "PAYDROP_ASSET_ADDRESS",
                "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
                Address::from_str,
            )?)
            .decimals(parse_var("PAYDROP_ASSET_DECIMALS", "6", u8::from_str)?)
            .name(var_or("PAYDROP_ASSET_NAME", "USDC"))
            .eip712_version(var_or("PAYDROP_ASSET_EIP712_VERSION", "2"))
            .build();

        let ttl_hours = parse_var("PAYDROP_TOKEN_TTL_HOURS", "24", u64::from_str)?;

        Ok(ServerConfig {
            bind_addr: parse_var("PAYDROP_BIND_ADDR", "0.0.0.0:3000", SocketAddr::from_str)?,
            public_base_url: parse_required("PAYDROP_PUBLIC_BASE_URL", Url::parse)?,
            facilitator_url: parse_required("PAYDROP_FACILITATOR_URL", Url::parse)?,
            database_path: var_or("PAYDROP_DATABASE_PATH", "paydrop.db").into(),
            files_root: var_or("PAYDROP_FILES_ROOT", "files").into(),
            asset,
            token_ttl: Duration::from_secs(ttl_hours * 60 * 60),
        })
    }
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T, E: std::fmt::Display>(
    name: &'static str,
    default: &str,
    parse: impl Fn(&str) -> Result<T, E>,
) -> Result<T, ConfigError> {
    let raw = var_or(name, default);
    parse(&raw).map_err(|e| ConfigError::InvalidVar {
        name,
        message: e.to_string(),
    })
}

fn parse_required<T, E: std::fmt::Display>(
    name: &'static str,
    parse: impl Fn(&str) -> Result<T, E>,
) -> Result<T, ConfigError> {
    let raw = env::var(name).map_err(|_| ConfigError::MissingVar(name))?;
    parse(&raw).map_err(|e| ConfigError::InvalidVar {
        name,
        message: e.to_string(),
    })
}
