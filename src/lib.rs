//! A small file-per-collection JSON document store.
//!
//! ```no_run
//! use jsonshelf::{Database, StoreConfig};
//! use serde_json::json;
//!
//! # async fn demo() -> jsonshelf::Result<()> {
//! let db = Database::new(StoreConfig::new("./data"));
//! let courses = db.collection("courses");
//!
//! let fields = json!({ "name": "DSA", "category": "Programming" });
//! let course = courses.create(fields.as_object().cloned().unwrap_or_default()).await?;
//! assert!(course.contains_key("_id"));
//! # Ok(())
//! # }
//! ```

pub mod db;
pub mod error;
pub mod logging;
pub mod storage;

pub use db::collection::Collection;
pub use db::database::Database;
pub use error::{Error, Result};
pub use storage::conf::StoreConfig;
pub use storage::record::{Query, Record};
