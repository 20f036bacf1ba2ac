//! ReDB-backed document store
//!
//! Key format: {collection}/{id}

use crate::document_store::DocumentStore;
use crate::error::Result;
use redb::{Database, ReadableTable, TableDefinition};
use serde_json::Value;
use std::path::Path;

const DOCUMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("documents");

pub struct RedbDocumentStore {
    db: Database,
}

#[allow(clippy::result_large_err)]
impl RedbDocumentStore {
    /// Open the store (create if not exists)
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::create(path)?;

        // Initialize table
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(DOCUMENTS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }
}

fn key(collection: &str, id: &str) -> String {
    format!("{}/{}", collection, id)
}

#[allow(clippy::result_large_err)]
impl DocumentStore for RedbDocumentStore {
    fn backend(&self) -> &'static str {
        "redb"
    }

    fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let key = key(collection, id);
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(DOCUMENTS)?;

        match table.get(key.as_str())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    fn put(&self, collection: &str, id: &str, document: &Value) -> Result<()> {
        let key = key(collection, id);
        let data = serde_json::to_vec(document)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(DOCUMENTS)?;
            table.insert(key.as_str(), data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let key = key(collection, id);
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(DOCUMENTS)?;
            table.remove(key.as_str())?.is_some()
        };
        write_txn.commit()?;
        Ok(removed)
    }

    fn list(&self, collection: &str) -> Result<Vec<(String, Value)>> {
        let prefix = format!("{}/", collection);
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(DOCUMENTS)?;

        let mut documents = Vec::new();
        for entry in table.range::<&str>(prefix.as_str()..)? {
            let (key, value) = entry?;
            let Some(id) = key.value().strip_prefix(&prefix) else {
                break;
            };
            documents.push((id.to_string(), serde_json::from_slice(value.value())?));
        }

        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn open_temp() -> (RedbDocumentStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RedbDocumentStore::open(dir.path().join("documents.redb")).unwrap();
        (store, dir)
    }

    #[test]
    fn test_put_and_get() {
        let (store, _dir) = open_temp();

        let doc = json!({ "id": "c1", "name": "Bandages" });
        store.put("categories", "c1", &doc).unwrap();

        assert_eq!(store.get("categories", "c1").unwrap(), Some(doc));
        assert_eq!(store.get("categories", "c2").unwrap(), None);
    }

    #[test]
    fn test_list_stops_at_collection_boundary() {
        let (store, _dir) = open_temp();

        store.put("items", "i1", &json!({ "n": 1 })).unwrap();
        store.put("items", "i2", &json!({ "n": 2 })).unwrap();
        store.put("itemsx", "i3", &json!({ "n": 3 })).unwrap();
        store.put("item", "i0", &json!({ "n": 0 })).unwrap();

        let items = store.list("items").unwrap();
        let ids: Vec<_> = items.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["i1", "i2"]);
    }

    #[test]
    fn test_delete_and_find() {
        let (store, _dir) = open_temp();

        store.put("users", "u1", &json!({ "email": "a@b.c" })).unwrap();
        assert!(store.exists_where("users", "email", &json!("a@b.c")).unwrap());
        assert!(store.delete("users", "u1").unwrap());
        assert!(!store.delete("users", "u1").unwrap());
        assert!(!store.exists_where("users", "email", &json!("a@b.c")).unwrap());
    }
}
