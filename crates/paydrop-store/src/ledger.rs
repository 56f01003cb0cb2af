//! Settled payment transactions.
//!
//! The ledger records each successful on-chain settlement exactly once,
//! keyed by transaction hash. Settlement admission (record the payment,
//! then find or create its download token) runs as a single SQL
//! transaction so a replayed settlement proof gets back the original
//! token instead of a second one.

use std::sync::{Arc, Mutex};

use rusqlite::{Connection, OptionalExtension, params};

use crate::error::Result;
use crate::now_micros;
use crate::tokens::{self, DownloadToken, TokenPolicy};

/// A settled payment, one row per on-chain transaction hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentTransaction {
    pub id: i64,
    pub transaction_hash: String,
    pub network: String,
    pub payer_address: String,
    pub recipient_address: String,
    /// Amount in the asset's atomic units, as a decimal string.
    pub amount_paid: String,
    pub currency: String,
    pub status: String,
    pub product_id: String,
    /// Microseconds since the Unix epoch.
    pub created_at: i64,
}

/// What the facilitator reported about a successful settlement.
#[derive(Debug, Clone)]
pub struct SettlementDetails {
    pub transaction_hash: String,
    pub network: String,
    pub payer_address: String,
    pub recipient_address: String,
    pub amount_paid: String,
    pub currency: String,
}

/// Result of admitting a settlement: the ledger row and its token.
///
/// `replayed` is true when the transaction hash had been admitted
/// before, in which case `token` is the originally issued one.
#[derive(Debug, Clone)]
pub struct SettlementAdmission {
    pub transaction: PaymentTransaction,
    pub token: DownloadToken,
    pub replayed: bool,
}

/// SQLite-backed transaction ledger.
pub struct TransactionLedger {
    conn: Arc<Mutex<Connection>>,
}

impl TransactionLedger {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// Record a settlement once per transaction hash.
    ///
    /// Returns the ledger row and whether it already existed. The UNIQUE
    /// constraint on `transaction_hash` is the arbiter; a duplicate insert
    /// is the "found" case, not an error.
    pub fn record_if_absent(
        &self,
        product_id: &str,
        details: &SettlementDetails,
    ) -> Result<(PaymentTransaction, bool)> {
        let conn = self.conn.lock().unwrap();
        let inserted = insert_if_absent(&conn, product_id, details)?;
        let transaction = find_by_hash(&conn, &details.transaction_hash)?.ok_or_else(|| {
            crate::StoreError::invalid_data(format!(
                "ledger row missing after insert: {}",
                details.transaction_hash
            ))
        })?;
        Ok((transaction, inserted == 0))
    }

    /// Record a settlement and issue (or re-find) its download token.
    ///
    /// Runs atomically: either both the ledger row and the token exist
    /// afterwards, or neither does. A duplicate transaction hash is not
    /// an error; the existing row and token are returned with
    /// `replayed = true`.
    pub fn admit_settlement(
        &self,
        product_id: &str,
        details: &SettlementDetails,
        policy: TokenPolicy,
    ) -> Result<SettlementAdmission> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let inserted = insert_if_absent(&tx, product_id, details)?;

        let transaction = find_by_hash(&tx, &details.transaction_hash)?.ok_or_else(|| {
            crate::StoreError::invalid_data(format!(
                "ledger row missing after insert: {}",
                details.transaction_hash
            ))
        })?;

        let (token, replayed) = match tokens::find_by_transaction(&tx, transaction.id)? {
            Some(existing) => (existing, true),
            None => {
                let expires_at = now_micros() + policy.ttl.as_micros() as i64;
                let token = tokens::insert_token(
                    &tx,
                    &transaction.product_id,
                    Some(transaction.id),
                    expires_at,
                    policy.max_downloads,
                )?;
                // inserted == 0 with no token would mean a legacy row;
                // the token is freshly issued either way
                (token, inserted == 0)
            }
        };

        tx.commit()?;

        if replayed {
            tracing::info!(
                transaction_hash = %details.transaction_hash,
                token_id = token.id,
                "Replayed settlement, returning original token"
            );
        } else {
            tracing::info!(
                transaction_hash = %details.transaction_hash,
                token_id = token.id,
                product_id,
                "Recorded settlement and issued download token"
            );
        }

        Ok(SettlementAdmission {
            transaction,
            token,
            replayed,
        })
    }

    /// Look up a settlement by its transaction hash.
    pub fn get_by_hash(&self, transaction_hash: &str) -> Result<Option<PaymentTransaction>> {
        let conn = self.conn.lock().unwrap();
        Ok(find_by_hash(&conn, transaction_hash)?)
    }
}

fn insert_if_absent(
    conn: &Connection,
    product_id: &str,
    details: &SettlementDetails,
) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT OR IGNORE INTO payment_transactions
             (transaction_hash, network, payer_address, recipient_address,
              amount_paid, currency, status, product_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'confirmed', ?7, ?8)",
        params![
            details.transaction_hash,
            details.network,
            details.payer_address,
            details.recipient_address,
            details.amount_paid,
            details.currency,
            product_id,
            now_micros(),
        ],
    )
}

fn find_by_hash(
    conn: &Connection,
    transaction_hash: &str,
) -> rusqlite::Result<Option<PaymentTransaction>> {
    conn.query_row(
        "SELECT id, transaction_hash, network, payer_address, recipient_address,
                amount_paid, currency, status, product_id, created_at
         FROM payment_transactions WHERE transaction_hash = ?1",
        [transaction_hash],
        |row| {
            Ok(PaymentTransaction {
                id: row.get(0)?,
                transaction_hash: row.get(1)?,
                network: row.get(2)?,
                payer_address: row.get(3)?,
                recipient_address: row.get(4)?,
                amount_paid: row.get(5)?,
                currency: row.get(6)?,
                status: row.get(7)?,
                product_id: row.get(8)?,
                created_at: row.get(9)?,
            })
        },
    )
    .optional()
}
