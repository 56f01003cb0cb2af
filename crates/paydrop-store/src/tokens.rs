//! Download token issuance and redemption.
//!
//! A token is an unguessable credential granting time- and count-limited
//! access to a paid-for file. Tokens are never deleted: expiry is a
//! read-time check, and the usage limit is enforced by an atomic
//! conditional increment so concurrent redemptions cannot oversubscribe.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::RngCore;
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{RedeemError, Result};
use crate::now_micros;

/// Default token lifetime.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Issuance policy for a token.
#[derive(Debug, Clone, Copy)]
pub struct TokenPolicy {
    pub ttl: Duration,
    /// `None` = unlimited downloads until expiry.
    pub max_downloads: Option<u32>,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        TokenPolicy {
            ttl: DEFAULT_TOKEN_TTL,
            max_downloads: None,
        }
    }
}

/// A redeemable download token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadToken {
    pub id: i64,
    pub token: String,
    pub product_id: String,
    /// `None` only for tokens issued through the legacy unlinked path.
    pub payment_transaction_id: Option<i64>,
    /// Expiry as microseconds since the Unix epoch. Immutable once set.
    pub expires_at: i64,
    pub download_count: i64,
    pub max_downloads: Option<u32>,
}

/// Everything the file-serving collaborator needs to stream the download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    pub file_key: String,
    pub filename: String,
    pub mime_type: String,
}

/// SQLite-backed token service.
pub struct DownloadTokenService {
    conn: Arc<Mutex<Connection>>,
}

impl DownloadTokenService {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// Issue a fresh token for a product.
    ///
    /// `payment_transaction_id` links the token to its settled payment;
    /// `None` is the legacy unlinked issuance mode.
    pub fn issue(
        &self,
        product_id: &str,
        payment_transaction_id: Option<i64>,
        policy: TokenPolicy,
    ) -> Result<DownloadToken> {
        let expires_at = now_micros() + policy.ttl.as_micros() as i64;
        let conn = self.conn.lock().unwrap();
        let token = insert_token(
            &conn,
            product_id,
            payment_transaction_id,
            expires_at,
            policy.max_downloads,
        )?;
        tracing::debug!(token_id = token.id, product_id, "Issued download token");
        Ok(token)
    }

    /// Look up a token by its string. Does not consume a redemption.
    pub fn get(&self, token: &str) -> Result<Option<DownloadToken>> {
        let conn = self.conn.lock().unwrap();
        Ok(find_by_token(&conn, token)?)
    }

    /// Redeem a token, consuming one download.
    ///
    /// The limit check and the count increment are a single conditional
    /// `UPDATE`: with `max_downloads = k`, at most `k` concurrent
    /// redemptions can succeed.
    pub fn redeem(&self, token: &str) -> std::result::Result<FileHandle, RedeemError> {
        self.redeem_at(token, now_micros())
    }

    fn redeem_at(&self, token: &str, now: i64) -> std::result::Result<FileHandle, RedeemError> {
        let conn = self.conn.lock().unwrap();

        let row = conn
            .query_row(
                "SELECT t.id, t.expires_at, p.file_key, p.filename, p.mime_type
                 FROM download_tokens t
                 JOIN products p ON p.id = t.product_id
                 WHERE t.token = ?1",
                [token],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        FileHandle {
                            file_key: row.get(2)?,
                            filename: row.get(3)?,
                            mime_type: row.get(4)?,
                        },
                    ))
                },
            )
            .optional()?;

        let Some((token_id, expires_at, handle)) = row else {
            return Err(RedeemError::NotFound);
        };

        // Inclusive boundary: expiry at exactly "now" is already expired.
        if now >= expires_at {
            tracing::debug!(token_id, "Rejected expired download token");
            return Err(RedeemError::Expired);
        }

        let updated = conn.execute(
            "UPDATE download_tokens
             SET download_count = download_count + 1
             WHERE id = ?1
               AND (max_downloads IS NULL OR download_count < max_downloads)",
            [token_id],
        )?;

        if updated == 0 {
            tracing::debug!(token_id, "Rejected download token over its limit");
            return Err(RedeemError::LimitExceeded);
        }

        Ok(handle)
    }
}

pub(crate) fn insert_token(
    conn: &Connection,
    product_id: &str,
    payment_transaction_id: Option<i64>,
    expires_at: i64,
    max_downloads: Option<u32>,
) -> rusqlite::Result<DownloadToken> {
    let token = generate_token();
    conn.execute(
        "INSERT INTO download_tokens
             (token, product_id, payment_transaction_id, expires_at, download_count, max_downloads)
         VALUES (?1, ?2, ?3, ?4, 0, ?5)",
        params![token, product_id, payment_transaction_id, expires_at, max_downloads],
    )?;
    Ok(DownloadToken {
        id: conn.last_insert_rowid(),
        token,
        product_id: product_id.to_string(),
        payment_transaction_id,
        expires_at,
        download_count: 0,
        max_downloads,
    })
}

pub(crate) fn find_by_transaction(
    conn: &Connection,
    payment_transaction_id: i64,
) -> rusqlite::Result<Option<DownloadToken>> {
    conn.query_row(
        "SELECT id, token, product_id, payment_transaction_id, expires_at, download_count, max_downloads
         FROM download_tokens WHERE payment_transaction_id = ?1",
        [payment_transaction_id],
        deserialize_token,
    )
    .optional()
}

fn find_by_token(conn: &Connection, token: &str) -> rusqlite::Result<Option<DownloadToken>> {
    conn.query_row(
        "SELECT id, token, product_id, payment_transaction_id, expires_at, download_count, max_downloads
         FROM download_tokens WHERE token = ?1",
        [token],
        deserialize_token,
    )
    .optional()
}

fn deserialize_token(row: &rusqlite::Row) -> rusqlite::Result<DownloadToken> {
    Ok(DownloadToken {
        id: row.get(0)?,
        token: row.get(1)?,
        product_id: row.get(2)?,
        payment_transaction_id: row.get(3)?,
        expires_at: row.get(4)?,
        download_count: row.get(5)?,
        max_downloads: row.get(6)?,
    })
}

/// 256 bits of randomness, hex-encoded.
fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::thread;

    use crate::Store;
    use crate::catalog::example_product;

    use super::*;

    fn store_with_product() -> Store {
        let store = Store::open_in_memory().unwrap();
        store.catalog().insert(&example_product()).unwrap();
        store
    }

    #[test]
    fn test_issued_tokens_are_unique_and_unguessable_length() {
        let store = store_with_product();
        let tokens = store.tokens();
        let mut seen = HashSet::new();
        for _ in 0..50 {
            let t = tokens
                .issue(&example_product().id, None, TokenPolicy::default())
                .unwrap();
            assert_eq!(t.token.len(), 64);
            assert!(seen.insert(t.token));
        }
    }

    #[test]
    fn test_issue_sets_ttl_and_zero_count() {
        let store = store_with_product();
        let before = now_micros();
        let token = store
            .tokens()
            .issue(&example_product().id, None, TokenPolicy::default())
            .unwrap();
        let after = now_micros();

        let ttl = DEFAULT_TOKEN_TTL.as_micros() as i64;
        assert!(token.expires_at >= before + ttl);
        assert!(token.expires_at <= after + ttl);
        assert_eq!(token.download_count, 0);
        assert_eq!(token.max_downloads, None);
        assert_eq!(token.payment_transaction_id, None);
    }

    #[test]
    fn test_redeem_unknown_token() {
        let store = store_with_product();
        assert!(matches!(
            store.tokens().redeem("no-such-token"),
            Err(RedeemError::NotFound)
        ));
    }

    #[test]
    fn test_unlimited_token_counts_and_stays_valid() {
        let store = store_with_product();
        let tokens = store.tokens();
        let issued = tokens
            .issue(&example_product().id, None, TokenPolicy::default())
            .unwrap();

        let handle = tokens.redeem(&issued.token).unwrap();
        assert_eq!(handle.filename, "synthwave.zip");

        let after = tokens.get(&issued.token).unwrap().unwrap();
        assert_eq!(after.download_count, 1);

        // Still redeemable: no limit applies
        tokens.redeem(&issued.token).unwrap();
        assert_eq!(
            tokens.get(&issued.token).unwrap().unwrap().download_count,
            2
        );
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let store = store_with_product();
        let tokens = store.tokens();
        let issued = tokens
            .issue(&example_product().id, None, TokenPolicy::default())
            .unwrap();

        // One microsecond before expiry: still valid
        tokens.redeem_at(&issued.token, issued.expires_at - 1).unwrap();

        // Exactly at expiry: expired
        assert!(matches!(
            tokens.redeem_at(&issued.token, issued.expires_at),
            Err(RedeemError::Expired)
        ));
    }

    #[test]
    fn test_limit_enforced_exactly() {
        let store = store_with_product();
        let tokens = store.tokens();
        let policy = TokenPolicy {
            max_downloads: Some(3),
            ..TokenPolicy::default()
        };
        let issued = tokens.issue(&example_product().id, None, policy).unwrap();

        for _ in 0..3 {
            tokens.redeem(&issued.token).unwrap();
        }
        assert!(matches!(
            tokens.redeem(&issued.token),
            Err(RedeemError::LimitExceeded)
        ));
    }

    #[test]
    fn test_concurrent_redemptions_admit_at_most_limit() {
        let store = store_with_product();
        let policy = TokenPolicy {
            max_downloads: Some(3),
            ..TokenPolicy::default()
        };
        let issued = store
            .tokens()
            .issue(&example_product().id, None, policy)
            .unwrap();

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let store = store.clone();
                let token = issued.token.clone();
                thread::spawn(move || store.tokens().redeem(&token).is_ok())
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&admitted| admitted)
            .count();
        assert_eq!(admitted, 3);

        let after = store.tokens().get(&issued.token).unwrap().unwrap();
        assert_eq!(after.download_count, 3);
    }
}
