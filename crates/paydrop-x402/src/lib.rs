//! # Paydrop x402 protocol layer
//!
//! Wire types and protocol plumbing for gating a resource behind an x402
//! stablecoin payment:
//!
//! - **[`requirements`]**: payment requirement construction from a priced
//!   resource, including the exact cents-to-smallest-unit conversion.
//! - **[`header`]**: the `X-PAYMENT` / `X-PAYMENT-RESPONSE` header codec.
//! - **[`facilitator`]**: the remote verify/settle client.
//!
//! This crate is pure protocol: it performs no storage and makes no policy
//! decisions. The gate in `paydrop-server` orchestrates it.

pub mod errors;
pub mod header;
pub mod requirements;
pub mod types;

#[cfg(feature = "facilitator-client")]
pub mod facilitator;
