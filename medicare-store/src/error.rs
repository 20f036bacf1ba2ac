use medicare_core::MedicareError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Malformed document {collection}/{id}: {reason}")]
    Malformed {
        collection: String,
        id: String,
        reason: String,
    },

    #[error("{0}")]
    Other(String),
}

impl From<StoreError> for MedicareError {
    fn from(err: StoreError) -> Self {
        MedicareError::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
