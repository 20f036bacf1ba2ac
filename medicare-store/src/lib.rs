pub mod document_store;
pub mod error;
pub mod redb_store;
pub mod sqlite_history;
pub mod sqlite_store;

pub use document_store::DocumentStore;
pub use error::{Result, StoreError};
pub use redb_store::RedbDocumentStore;
pub use sqlite_history::HistoryLog;
pub use sqlite_store::SqliteDocumentStore;
