//! Product catalog.
//!
//! Products are created by the seller upload flow, which is outside the
//! payment core; the gate only reads them. `price_cents` is the single
//! source of truth for the required payment amount.

use std::str::FromStr;
use std::sync::{Arc, Mutex};

use alloy_primitives::Address;
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{Result, StoreError};

/// A digital product offered for sale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub price_cents: i64,
    /// EIP-55 checksummed seller wallet, validated on insert.
    pub seller_wallet: String,
    pub file_key: String,
    pub filename: String,
    pub mime_type: String,
    pub file_size: i64,
    /// Per-product download limit applied to issued tokens.
    /// `None` = unlimited until expiry, the default policy.
    pub max_downloads: Option<u32>,
}

impl Product {
    /// The seller wallet as a typed address.
    pub fn seller_address(&self) -> Result<Address> {
        Address::from_str(&self.seller_wallet)
            .map_err(|e| StoreError::invalid_data(format!("bad seller wallet: {e}")))
    }
}

/// SQLite-backed product catalog.
pub struct ProductCatalog {
    conn: Arc<Mutex<Connection>>,
}

impl ProductCatalog {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// Insert a product. The seller wallet must parse as an EVM address;
    /// it is stored in canonical checksummed form.
    pub fn insert(&self, product: &Product) -> Result<()> {
        if product.price_cents < 1 {
            return Err(StoreError::invalid_data("price_cents must be >= 1"));
        }
        let wallet = Address::from_str(&product.seller_wallet)
            .map_err(|e| StoreError::invalid_data(format!("bad seller wallet: {e}")))?;

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO products (id, slug, title, description, price_cents, seller_wallet,
                                   file_key, filename, mime_type, file_size, max_downloads)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                product.id,
                product.slug,
                product.title,
                product.description,
                product.price_cents,
                wallet.to_string(),
                product.file_key,
                product.filename,
                product.mime_type,
                product.file_size,
                product.max_downloads,
            ],
        )?;
        Ok(())
    }

    /// Look up a product by its URL slug.
    pub fn get_by_slug(&self, slug: &str) -> Result<Option<Product>> {
        let conn = self.conn.lock().unwrap();
        let product = conn
            .query_row(
                "SELECT id, slug, title, description, price_cents, seller_wallet,
                        file_key, filename, mime_type, file_size, max_downloads
                 FROM products WHERE slug = ?1",
                [slug],
                Self::deserialize_product,
            )
            .optional()?;
        Ok(product)
    }

    /// Look up a product by id.
    pub fn get(&self, id: &str) -> Result<Option<Product>> {
        let conn = self.conn.lock().unwrap();
        let product = conn
            .query_row(
                "SELECT id, slug, title, description, price_cents, seller_wallet,
                        file_key, filename, mime_type, file_size, max_downloads
                 FROM products WHERE id = ?1",
                [id],
                Self::deserialize_product,
            )
            .optional()?;
        Ok(product)
    }

    fn deserialize_product(row: &rusqlite::Row) -> rusqlite::Result<Product> {
        Ok(Product {
            id: row.get(0)?,
            slug: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            price_cents: row.get(4)?,
            seller_wallet: row.get(5)?,
            file_key: row.get(6)?,
            filename: row.get(7)?,
            mime_type: row.get(8)?,
            file_size: row.get(9)?,
            max_downloads: row.get(10)?,
        })
    }
}

#[cfg(test)]
pub(crate) fn example_product() -> Product {
    Product {
        id: "4f9c0d2e-7a31-4b1c-9b5e-08f1c2a6d001".to_string(),
        slug: "synthwave-sample-pack".to_string(),
        title: "Synthwave Sample Pack".to_string(),
        description: "120 royalty-free loops".to_string(),
        price_cents: 2999,
        seller_wallet: "0x036CbD53842c5426634e7929541eC2318f3dCF7e".to_string(),
        file_key: "uploads/synthwave.zip".to_string(),
        filename: "synthwave.zip".to_string(),
        mime_type: "application/zip".to_string(),
        file_size: 1_048_576,
        max_downloads: None,
    }
}

#[cfg(test)]
mod tests {
    use crate::Store;

    use super::*;

    #[test]
    fn test_insert_and_get_by_slug() {
        let store = Store::open_in_memory().unwrap();
        let catalog = store.catalog();
        let product = example_product();
        catalog.insert(&product).unwrap();

        let found = catalog.get_by_slug("synthwave-sample-pack").unwrap().unwrap();
        assert_eq!(found.title, "Synthwave Sample Pack");
        assert_eq!(found.price_cents, 2999);
        assert_eq!(found.max_downloads, None);
        // Wallet parses back to the same address
        assert_eq!(
            found.seller_address().unwrap().to_string(),
            found.seller_wallet
        );
    }

    #[test]
    fn test_unknown_slug_is_none() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.catalog().get_by_slug("missing").unwrap().is_none());
    }

    #[test]
    fn test_insert_rejects_bad_wallet() {
        let store = Store::open_in_memory().unwrap();
        let mut product = example_product();
        product.seller_wallet = "not-an-address".to_string();
        assert!(matches!(
            store.catalog().insert(&product),
            Err(StoreError::InvalidData(_))
        ));
    }

    #[test]
    fn test_insert_rejects_zero_price() {
        let store = Store::open_in_memory().unwrap();
        let mut product = example_product();
        product.price_cents = 0;
        assert!(store.catalog().insert(&product).is_err());
    }

    #[test]
    fn test_insert_normalizes_wallet_checksum() {
        let store = Store::open_in_memory().unwrap();
        let mut product = example_product();
        product.seller_wallet = product.seller_wallet.to_lowercase();
        store.catalog().insert(&product).unwrap();

        let found = store
            .catalog()
            .get_by_slug("synthwave-sample-pack")
            .unwrap()
            .unwrap();
        assert_eq!(
            found.seller_wallet,
            "0x036CbD53842c5426634e7929541eC2318f3dCF7e"
        );
    }
}
