use std::path::PathBuf;
use tracing::{debug, info};

use crate::db::collection::Collection;
use crate::error::Result;
use crate::storage::conf::StoreConfig;
use crate::storage::file;
use crate::storage::lock::LockManager;
use crate::storage::record::*;

/// A file-backed document store (a group of named collections).
///
/// Each collection lives in its own JSON file under the configured data
/// directory. Reads never lock. Mutations on the same collection are
/// serialized, and every mutation rewrites the whole file atomically.
///
/// Clones share the same lock table, so hand out clones rather than creating
/// a second `Database` over the same directory.
#[derive(Debug, Clone)]
pub struct Database {
    /// The configuration this database was opened with.
    config: StoreConfig,

    /// One write lock per collection.
    locks: LockManager,
}

impl Database {
    /// Creates a database over `config.data_dir`.
    ///
    /// Nothing is touched on disk until the first write.
    pub fn new(config: StoreConfig) -> Self {
        info!(data_dir = %config.data_dir.display(), "opening store");
        Database {
            config,
            locks: LockManager::new(),
        }
    }

    /// Creates a database configured from the environment.
    ///
    /// See [StoreConfig::from_env].
    pub fn from_env() -> Self {
        Self::new(StoreConfig::from_env())
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns a handle to the named collection.
    ///
    /// The name is validated when an operation runs, not here.
    pub fn collection(&self, name: &str) -> Collection<'_> {
        Collection::new(self, name)
    }

    /// The path of the file backing `collection`.
    pub fn collection_path(&self, collection: &str) -> Result<PathBuf> {
        file::collection_path(&self.config.data_dir, collection)
    }

    /// Lists the collections that have been written to, sorted by name.
    pub async fn list_collections(&self) -> Result<Vec<String>> {
        file::list_collections(&self.config.data_dir).await
    }

    async fn read(&self, collection: &str) -> Result<Vec<Record>> {
        let path = self.collection_path(collection)?;
        file::read_collection_lenient(&path, collection).await
    }

    /// Runs a read-modify-write cycle on a collection while holding its
    /// write lock.
    ///
    /// `f` gets the current records and returns its output along with
    /// whether it changed anything. The file is only rewritten on change.
    async fn modify<T, F>(&self, collection: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<Record>) -> (T, bool),
    {
        let path = self.collection_path(collection)?;
        let _guard = self.locks.write_lock(collection).await;

        let mut records = file::read_collection(&path, collection).await?;
        let (out, changed) = f(&mut records);
        if changed {
            file::write_collection(&path, collection, &records, self.config.pretty).await?;
        }
        Ok(out)
    }

    /// Returns every record matching `query`, in insertion order.
    ///
    /// A collection that was never written is empty.
    pub async fn find(&self, collection: &str, query: &Query) -> Result<Vec<Record>> {
        let records = self.read(collection).await?;
        if query.is_empty() {
            return Ok(records);
        }
        Ok(records
            .into_iter()
            .filter(|r| matches(r, query))
            .collect())
    }

    /// Returns the record whose `_id` (or legacy `id`) is `id`.
    pub async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Record>> {
        let records = self.read(collection).await?;
        Ok(records.into_iter().find(|r| has_id(r, id)))
    }

    /// Counts the records matching `query`.
    pub async fn count(&self, collection: &str, query: &Query) -> Result<usize> {
        let records = self.read(collection).await?;
        Ok(records.iter().filter(|r| matches(r, query)).count())
    }

    /// Stores a new record built from `fields` and returns it.
    ///
    /// The stored record gets a fresh `_id` plus `createdAt`/`updatedAt`.
    pub async fn create(&self, collection: &str, fields: Record) -> Result<Record> {
        let record = self
            .modify(collection, |records| {
                let record = new_record(fields);
                records.push(record.clone());
                (record, true)
            })
            .await?;
        debug!(%collection, id = ?record.get(ID_FIELD), "created record");
        Ok(record)
    }

    /// Stores several new records with a single write.
    pub async fn insert_many(&self, collection: &str, items: Vec<Record>) -> Result<Vec<Record>> {
        let created = self
            .modify(collection, |records| {
                let created: Vec<Record> = items.into_iter().map(new_record).collect();
                records.extend(created.iter().cloned());
                let changed = !created.is_empty();
                (created, changed)
            })
            .await?;
        debug!(%collection, count = created.len(), "inserted records");
        Ok(created)
    }

    /// Merges `patch` into the record identified by `id`.
    ///
    /// Returns the updated record, or `None` (leaving the file untouched) if
    /// there's no such record.
    pub async fn update(&self, collection: &str, id: &str, patch: Record) -> Result<Option<Record>> {
        let updated = self
            .modify(collection, |records| {
                match records.iter_mut().find(|r| has_id(r, id)) {
                    Some(record) => {
                        apply_patch(record, patch);
                        (Some(record.clone()), true)
                    }
                    None => (None, false),
                }
            })
            .await?;
        debug!(%collection, %id, found = updated.is_some(), "update");
        Ok(updated)
    }

    /// Removes the record identified by `id`.
    ///
    /// Returns whether a record was removed. Deleting a missing id is not an
    /// error.
    pub async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let removed = self
            .modify(collection, |records| {
                match records.iter().position(|r| has_id(r, id)) {
                    Some(i) => {
                        records.remove(i);
                        (true, true)
                    }
                    None => (false, false),
                }
            })
            .await?;
        debug!(%collection, %id, removed, "delete");
        Ok(removed)
    }

    /// Removes every record matching `query` and returns how many were
    /// removed. An empty query clears the collection.
    pub async fn delete_many(&self, collection: &str, query: &Query) -> Result<usize> {
        let removed = self
            .modify(collection, |records| {
                let before = records.len();
                records.retain(|r| !matches(r, query));
                let removed = before - records.len();
                (removed, removed > 0)
            })
            .await?;
        debug!(%collection, removed, "delete many");
        Ok(removed)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::Error;
    use serde_json::{json, Value};
    use tempfile::tempdir;
    use tokio::fs;

    fn rec(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            other => panic!("expected an object, got {other}"),
        }
    }

    fn names(records: &[Record]) -> Vec<&str> {
        records.iter().filter_map(|r| r["name"].as_str()).collect()
    }

    #[tokio::test]
    async fn create_find_delete_many() {
        let dir = tempdir().unwrap();
        let db = Database::new(StoreConfig::new(dir.path()));

        for name in ["A", "B", "C"] {
            db.create("items", rec(json!({ "name": name }))).await.unwrap();
        }
        let all = db.find("items", &Query::new()).await.unwrap();
        assert_eq!(names(&all), ["A", "B", "C"]);

        let removed = db
            .delete_many("items", &rec(json!({ "name": "B" })))
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let all = db.find("items", &Query::new()).await.unwrap();
        assert_eq!(names(&all), ["A", "C"]);
    }

    #[tokio::test]
    async fn nothing_on_disk_until_written() {
        let dir = tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let db = Database::new(StoreConfig::new(&data_dir));

        assert!(db.find("courses", &Query::new()).await.unwrap().is_empty());
        assert!(db.find_by_id("courses", "x").await.unwrap().is_none());
        assert!(!db.delete("courses", "x").await.unwrap());
        assert_eq!(db.delete_many("courses", &Query::new()).await.unwrap(), 0);
        assert!(db.update("courses", "x", Record::new()).await.unwrap().is_none());
        assert!(!data_dir.exists());

        db.create("courses", Record::new()).await.unwrap();
        assert!(data_dir.join("courses.json").exists());
    }

    #[tokio::test]
    async fn legacy_id_lookup() {
        let dir = tempdir().unwrap();
        let db = Database::new(StoreConfig::new(dir.path()));
        fs::write(
            dir.path().join("alumni.json"),
            r#"[{"id": "legacy-1", "name": "Old"}, {"_id": "new-1", "name": "New"}]"#,
        )
        .await
        .unwrap();

        let old = db.find_by_id("alumni", "legacy-1").await.unwrap().unwrap();
        assert_eq!(old["name"], json!("Old"));

        let patched = db
            .update("alumni", "legacy-1", rec(json!({ "company": "Acme" })))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(patched["company"], json!("Acme"));
        assert!(patched.contains_key(UPDATED_AT_FIELD));

        assert!(db.delete("alumni", "legacy-1").await.unwrap());
        assert_eq!(db.count("alumni", &Query::new()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn corrupt_collection_blocks_writes() {
        let dir = tempdir().unwrap();
        let db = Database::new(StoreConfig::new(dir.path()));
        let path = db.collection_path("gallery").unwrap();
        fs::write(&path, "[{ truncated").await.unwrap();

        assert!(db.find("gallery", &Query::new()).await.unwrap().is_empty());

        let res = db.create("gallery", rec(json!({ "title": "x" }))).await;
        assert!(matches!(res, Err(Error::CorruptCollection { .. })));
        assert_eq!(fs::read_to_string(&path).await.unwrap(), "[{ truncated");
    }

    #[tokio::test]
    async fn invalid_names_are_rejected() {
        let dir = tempdir().unwrap();
        let db = Database::new(StoreConfig::new(dir.path()));
        let res = db.create("../escape", Record::new()).await;
        assert!(matches!(res, Err(Error::InvalidCollectionName(_))));
        assert!(matches!(
            db.find("", &Query::new()).await,
            Err(Error::InvalidCollectionName(_))
        ));
        assert!(db.locks.is_empty());
    }

    #[tokio::test]
    async fn insert_many_single_write() {
        let dir = tempdir().unwrap();
        let db = Database::new(StoreConfig::new(dir.path()));

        assert!(db.insert_many("batches", vec![]).await.unwrap().is_empty());
        assert!(db.list_collections().await.unwrap().is_empty());

        let created = db
            .insert_many(
                "batches",
                vec![rec(json!({ "name": "Morning" })), rec(json!({ "name": "Evening" }))],
            )
            .await
            .unwrap();
        assert_eq!(created.len(), 2);
        assert_ne!(created[0][ID_FIELD], created[1][ID_FIELD]);

        let stored = db.find("batches", &Query::new()).await.unwrap();
        assert_eq!(stored, created);
        assert_eq!(db.list_collections().await.unwrap(), ["batches"]);
    }
}
