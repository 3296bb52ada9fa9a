use crate::db::database::Database;
use crate::error::Result;
use crate::storage::record::{Query, Record};

/// A collection of records. Equivalent to a table in a relational database.
///
/// This is a lightweight handle bound to one name; every call is forwarded
/// to the [Database] it was created from.
#[derive(Debug, Clone)]
pub struct Collection<'a> {
    db: &'a Database,
    name: String,
}

impl<'a> Collection<'a> {
    pub fn new(db: &'a Database, name: &str) -> Self {
        Collection {
            db,
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn find(&self, query: &Query) -> Result<Vec<Record>> {
        self.db.find(&self.name, query).await
    }

    /// Returns every record in the collection.
    pub async fn find_all(&self) -> Result<Vec<Record>> {
        self.db.find(&self.name, &Query::new()).await
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Record>> {
        self.db.find_by_id(&self.name, id).await
    }

    pub async fn count(&self, query: &Query) -> Result<usize> {
        self.db.count(&self.name, query).await
    }

    pub async fn create(&self, fields: Record) -> Result<Record> {
        self.db.create(&self.name, fields).await
    }

    pub async fn insert_many(&self, items: Vec<Record>) -> Result<Vec<Record>> {
        self.db.insert_many(&self.name, items).await
    }

    pub async fn update(&self, id: &str, patch: Record) -> Result<Option<Record>> {
        self.db.update(&self.name, id, patch).await
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        self.db.delete(&self.name, id).await
    }

    pub async fn delete_many(&self, query: &Query) -> Result<usize> {
        self.db.delete_many(&self.name, query).await
    }
}
