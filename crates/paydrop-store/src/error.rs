//! Storage error types.

/// Errors from the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl StoreError {
    pub fn invalid_data(message: impl Into<String>) -> Self {
        StoreError::InvalidData(message.into())
    }
}

/// A specialized `Result` type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Outcomes of a token redemption attempt.
///
/// `NotFound`, `Expired` and `LimitExceeded` are terminal for the token;
/// the client's only recourse is a new purchase.
#[derive(Debug, thiserror::Error)]
pub enum RedeemError {
    #[error("Download token not found")]
    NotFound,

    #[error("Download token has expired")]
    Expired,

    #[error("Download limit exceeded")]
    LimitExceeded,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<rusqlite::Error> for RedeemError {
    fn from(err: rusqlite::Error) -> Self {
        RedeemError::Store(StoreError::Sqlite(err))
    }
}
