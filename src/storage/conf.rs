use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// The directory collections are stored in when nothing else is configured.
pub const DEFAULT_DATA_DIR: &str = "./data";

/// The extension of a collection file. A collection named `courses`
/// lives in `<data_dir>/courses.json`.
pub const COLLECTION_FILE_EXT: &str = "json";

/// The extension of the scratch file a collection is written to before
/// it's renamed into place.
pub const TEMP_FILE_EXT: &str = "tmp";

/// The longest collection name (in bytes) that will be accepted.
pub const MAX_COLLECTION_NAME_LEN: usize = 128;

/// Environment variable overriding [StoreConfig::data_dir].
pub const DATA_DIR_ENV: &str = "JSONSHELF_DATA_DIR";

/// Environment variable overriding [StoreConfig::pretty].
///
/// Accepts `0`/`false`/`no`/`off` (any case) to disable pretty printing.
pub const PRETTY_ENV: &str = "JSONSHELF_PRETTY";

/// Configuration for a [crate::db::database::Database].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// The directory holding one file per collection. Created lazily on
    /// the first write.
    pub data_dir: PathBuf,

    /// Write collection files as indented JSON.
    pub pretty: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            pretty: true,
        }
    }
}

impl StoreConfig {
    /// Creates a config rooted at `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        StoreConfig {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Builds a config from the defaults, overridden by [DATA_DIR_ENV] and
    /// [PRETTY_ENV] when they're set.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut conf = StoreConfig::default();
        if let Some(dir) = lookup(DATA_DIR_ENV).filter(|d| !d.trim().is_empty()) {
            conf.data_dir = PathBuf::from(dir);
        }
        if let Some(pretty) = lookup(PRETTY_ENV) {
            conf.pretty = !matches!(
                pretty.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "no" | "off"
            );
        }
        conf
    }
}
