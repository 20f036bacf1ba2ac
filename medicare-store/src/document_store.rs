//! Hierarchical document storage.
//!
//! Documents are JSON values addressed by `collection/id`. Lookups on a
//! child field use slash paths (`email`, `user/id`, `membership/rfid`).
//! Writes replace the whole document; there are no transactions and
//! concurrent writers to the same document are last-write-wins.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::error::{Result, StoreError};

pub trait DocumentStore: Send + Sync {
    /// Backend name for logs and health output
    fn backend(&self) -> &'static str;

    fn get(&self, collection: &str, id: &str) -> Result<Option<Value>>;

    fn put(&self, collection: &str, id: &str, document: &Value) -> Result<()>;

    /// Remove a document, returning whether it existed.
    fn delete(&self, collection: &str, id: &str) -> Result<bool>;

    /// All documents of a collection, ordered by id.
    fn list(&self, collection: &str) -> Result<Vec<(String, Value)>>;

    /// Documents whose child at `path` equals `expected`.
    fn find_by(&self, collection: &str, path: &str, expected: &Value) -> Result<Vec<(String, Value)>> {
        Ok(self
            .list(collection)?
            .into_iter()
            .filter(|(_, doc)| child(doc, path) == Some(expected))
            .collect())
    }

    fn exists_where(&self, collection: &str, path: &str, expected: &Value) -> Result<bool> {
        Ok(!self.find_by(collection, path, expected)?.is_empty())
    }
}

/// Resolve a slash-separated child path inside a document.
pub fn child<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .try_fold(doc, |node, segment| node.get(segment))
}

/// Load and decode one document.
pub fn load<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
) -> Result<Option<T>> {
    match store.get(collection, id)? {
        Some(doc) => decode(collection, id, doc).map(Some),
        None => Ok(None),
    }
}

/// Encode and store one document.
pub fn save<T: Serialize>(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
    value: &T,
) -> Result<()> {
    let doc = serde_json::to_value(value)?;
    store.put(collection, id, &doc)
}

pub fn decode<T: DeserializeOwned>(collection: &str, id: &str, doc: Value) -> Result<T> {
    serde_json::from_value(doc).map_err(|e| StoreError::Malformed {
        collection: collection.to_string(),
        id: id.to_string(),
        reason: e.to_string(),
    })
}

/// Decode every document of a collection, skipping (and logging) malformed ones.
pub fn load_all<T: DeserializeOwned>(store: &dyn DocumentStore, collection: &str) -> Result<Vec<T>> {
    let mut values = Vec::new();
    for (id, doc) in store.list(collection)? {
        match decode(collection, &id, doc) {
            Ok(value) => values.push(value),
            Err(e) => tracing::warn!(collection = collection, id = %id, "Skipping document: {}", e),
        }
    }
    Ok(values)
}
