//! Payment-gated download server.
//!
//! Wires the x402 protocol crate and the store together behind two axum
//! routes: `GET /download/{slug}` runs the payment gate and returns a
//! download token; `GET /file/{token}` redeems the token for the file
//! bytes.

pub mod challenge;
pub mod config;
pub mod error;
pub mod gate;
pub mod routes;

pub use challenge::ChallengeMode;
pub use config::{ConfigError, ServerConfig};
pub use error::GateError;
pub use gate::{AdmittedPayment, PaymentGate};
pub use routes::{AppState, router};
