//! Reading and writing whole collection files.
//!
//! A collection file holds a single JSON array of records. It is always
//! replaced as a whole: the new contents go to a uniquely named scratch file
//! next to it, which is synced and then renamed over the old file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::storage::conf::*;
use crate::storage::record::Record;

/// Checks that a collection name maps to a plain file inside the data
/// directory.
pub fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_COLLECTION_NAME_LEN
        && !name.starts_with('.')
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.'));
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidCollectionName(name.to_string()))
    }
}

/// Returns the path of the file backing `collection`.
pub fn collection_path(data_dir: &Path, collection: &str) -> Result<PathBuf> {
    validate_name(collection)?;
    Ok(data_dir.join(format!("{collection}.{COLLECTION_FILE_EXT}")))
}

/// Reads the raw file, mapping "doesn't exist" to `None`.
async fn read_bytes(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path).await {
        Ok(buff) => Ok(Some(buff)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::storage(path, e)),
    }
}

/// Decodes a collection file. Blank content is an empty collection.
fn decode(collection: &str, buff: &[u8]) -> Result<Vec<Record>> {
    if buff.iter().all(u8::is_ascii_whitespace) {
        return Ok(vec![]);
    }
    serde_json::from_slice(buff).map_err(|source| Error::CorruptCollection {
        collection: collection.to_string(),
        source,
    })
}

/// Reads a collection for a mutation.
///
/// A missing file is an empty collection. A corrupt file is an error, so
/// the caller never overwrites data it couldn't read.
pub async fn read_collection(path: &Path, collection: &str) -> Result<Vec<Record>> {
    match read_bytes(path).await? {
        Some(buff) => decode(collection, &buff),
        None => Ok(vec![]),
    }
}

/// Reads a collection for a query.
///
/// Like [read_collection], except a corrupt file is logged and treated as
/// empty. Other I/O failures are still returned.
pub async fn read_collection_lenient(path: &Path, collection: &str) -> Result<Vec<Record>> {
    match read_collection(path, collection).await {
        Err(Error::CorruptCollection { collection, source }) => {
            warn!(%collection, path = %path.display(), error = %source, "corrupt collection file, reading as empty");
            Ok(vec![])
        }
        res => res,
    }
}

/// Encodes and atomically writes a whole collection.
pub async fn write_collection(
    path: &Path,
    collection: &str,
    records: &[Record],
    pretty: bool,
) -> Result<()> {
    let encoded = if pretty {
        serde_json::to_vec_pretty(records)
    } else {
        serde_json::to_vec(records)
    };
    let buff = encoded.map_err(|source| Error::Serialize {
        collection: collection.to_string(),
        source,
    })?;
    atomic_write(path, &buff).await?;
    debug!(%collection, records = records.len(), bytes = buff.len(), "wrote collection");
    Ok(())
}

async fn write_synced(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(content).await?;
    file.sync_all().await?;
    Ok(())
}

/// Writes `content` to `path` via write -> sync -> rename.
///
/// The parent directory is created if needed. On failure the scratch file is
/// removed and `path` is left as it was.
pub async fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::storage(parent, e))?;
    }

    let temp_path = path.with_extension(format!("{}.{}", Uuid::new_v4().simple(), TEMP_FILE_EXT));

    if let Err(e) = write_synced(&temp_path, content).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(Error::storage(&temp_path, e));
    }
    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(Error::storage(path, e));
    }
    Ok(())
}

/// Lists the collections stored in `data_dir`, sorted by name.
///
/// A data directory that doesn't exist yet holds no collections.
pub async fn list_collections(data_dir: &Path) -> Result<Vec<String>> {
    let mut entries = match fs::read_dir(data_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
        Err(e) => return Err(Error::storage(data_dir, e)),
    };

    let mut names = vec![];
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| Error::storage(data_dir, e))?
    {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(COLLECTION_FILE_EXT) {
            continue;
        }
        let is_file = entry
            .file_type()
            .await
            .map_err(|e| Error::storage(&path, e))?
            .is_file();
        let name = path.file_stem().and_then(|s| s.to_str());
        if let Some(name) = name.filter(|n| is_file && validate_name(n).is_ok()) {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}
