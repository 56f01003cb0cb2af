//! Persistence layer for the Paydrop download gate.
//!
//! All cross-request coordination in the gate goes through this crate:
//!
//! - **[`catalog`]**: digital products and their pricing (read-only to the
//!   payment core).
//! - **[`ledger`]**: settled payment transactions, at most one row per
//!   on-chain transaction hash, plus the atomic settlement-admission path.
//! - **[`tokens`]**: download token issuance and redemption with expiry and
//!   usage-limit enforcement.
//! - **[`files`]**: filesystem-backed file bytes, keyed by the product's
//!   file key.
//!
//! SQLite sits behind a shared `Arc<Mutex<Connection>>`; each component
//! holds a clone of the handle, so multi-statement operations run under one
//! lock and SQL transactions give the atomicity the admission and
//! redemption paths require.

pub mod catalog;
pub mod error;
pub mod files;
pub mod ledger;
pub mod tokens;

pub use catalog::{Product, ProductCatalog};
pub use error::{RedeemError, Result, StoreError};
pub use files::FsFileStore;
pub use ledger::{PaymentTransaction, SettlementAdmission, SettlementDetails, TransactionLedger};
pub use tokens::{DownloadToken, DownloadTokenService, FileHandle, TokenPolicy};

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::Connection;

/// Shared handle to the SQLite database.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (or create) the database at the given path and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database. Used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Store {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn catalog(&self) -> ProductCatalog {
        ProductCatalog::new(self.conn.clone())
    }

    pub fn ledger(&self) -> TransactionLedger {
        TransactionLedger::new(self.conn.clone())
    }

    pub fn tokens(&self) -> DownloadTokenService {
        DownloadTokenService::new(self.conn.clone())
    }
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS products (
    id            TEXT PRIMARY KEY,
    slug          TEXT NOT NULL UNIQUE,
    title         TEXT NOT NULL,
    description   TEXT NOT NULL DEFAULT '',
    price_cents   INTEGER NOT NULL CHECK (price_cents >= 1),
    seller_wallet TEXT NOT NULL,
    file_key      TEXT NOT NULL,
    filename      TEXT NOT NULL,
    mime_type     TEXT NOT NULL,
    file_size     INTEGER NOT NULL DEFAULT 0,
    max_downloads INTEGER
);

CREATE TABLE IF NOT EXISTS payment_transactions (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    transaction_hash  TEXT NOT NULL UNIQUE,
    network           TEXT NOT NULL,
    payer_address     TEXT NOT NULL,
    recipient_address TEXT NOT NULL,
    amount_paid       TEXT NOT NULL,
    currency          TEXT NOT NULL,
    status            TEXT NOT NULL DEFAULT 'confirmed',
    product_id        TEXT NOT NULL REFERENCES products(id),
    created_at        INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS download_tokens (
    id                     INTEGER PRIMARY KEY AUTOINCREMENT,
    token                  TEXT NOT NULL UNIQUE,
    product_id             TEXT NOT NULL REFERENCES products(id),
    payment_transaction_id INTEGER REFERENCES payment_transactions(id),
    expires_at             INTEGER NOT NULL,
    download_count         INTEGER NOT NULL DEFAULT 0,
    max_downloads          INTEGER
);

CREATE INDEX IF NOT EXISTS idx_download_tokens_payment
    ON download_tokens(payment_transaction_id);
";

/// Current time as microseconds since the Unix epoch.
///
/// Token expiry is compared at microsecond precision, with the boundary
/// inclusive: a token whose expiry equals "now" is already expired.
pub fn now_micros() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory_applies_schema() {
        let store = Store::open_in_memory().unwrap();
        // Schema application is idempotent
        let conn = store.conn.lock().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
    }

    #[test]
    fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("paydrop.db")).unwrap();
        drop(store);
        // Reopening an existing database succeeds
        Store::open(dir.path().join("paydrop.db")).unwrap();
    }
}
