use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::bin::check_key;
use crate::{Cache, CacheRecord, Error, Headers, Result};

#[derive(Debug, Serialize, Deserialize)]
struct RecordMeta {
    key: String,
    headers: Headers,
}

/// On-disk cache bin.
///
/// Each key maps to one `<sha256>.rec` file under `root`: a JSON line with
/// the key and headers, then the body bytes. The file's modification time is
/// the record's timestamp.
///
/// Records are staged in a temp file and renamed into place, so a reader
/// always sees the headers and body of a single write. `touch` only bumps the
/// modification time of the file it opens and never rewrites contents.
#[derive(Debug, Clone)]
pub struct FileCache {
    root: PathBuf,
}

impl FileCache {
    /// Open (and create if needed) a bin rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| Error::Record {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, key: &str) -> PathBuf {
        let digest = hex::encode(Sha256::digest(key.as_bytes()));
        self.root.join(format!("{digest}.rec"))
    }
}

fn record_err(path: &Path) -> impl Fn(io::Error) -> Error + '_ {
    move |source| Error::Record {
        path: path.to_path_buf(),
        source,
    }
}

/// Split a stored record into its metadata line and body.
fn split_record(raw: Vec<u8>) -> Result<(RecordMeta, Bytes)> {
    let raw = Bytes::from(raw);
    let end = raw.iter().position(|&b| b == b'\n').unwrap_or(raw.len());
    let meta = serde_json::from_slice(&raw[..end])?;
    let body = if end < raw.len() {
        raw.slice(end + 1..)
    } else {
        Bytes::new()
    };
    Ok((meta, body))
}

impl Cache for FileCache {
    fn read(&self, key: &str) -> Result<Option<CacheRecord>> {
        check_key(key)?;
        let path = self.path(key);

        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(Error::Record { path, source }),
        };
        let last_modified = file
            .metadata()
            .and_then(|m| m.modified())
            .map_err(record_err(&path))?;
        let mut raw = Vec::new();
        file.read_to_end(&mut raw).map_err(record_err(&path))?;

        let (meta, data) = split_record(raw)?;
        if meta.key != key {
            tracing::warn!(key, stored = %meta.key, "cache file holds a different key");
            return Ok(None);
        }

        Ok(Some(CacheRecord {
            data,
            headers: meta.headers,
            last_modified,
        }))
    }

    fn write(&self, key: &str, data: &[u8], headers: &Headers) -> Result<()> {
        check_key(key)?;
        let path = self.path(key);

        let meta = RecordMeta {
            key: key.to_string(),
            headers: headers.clone(),
        };
        // serde_json escapes newlines, so the metadata is always one line.
        let mut line = serde_json::to_vec(&meta)?;
        line.push(b'\n');

        let mut staged = NamedTempFile::new_in(&self.root).map_err(record_err(&path))?;
        staged.write_all(&line).map_err(record_err(&path))?;
        staged.write_all(data).map_err(record_err(&path))?;
        staged.as_file().sync_all().map_err(record_err(&path))?;
        staged
            .persist(&path)
            .map_err(|e| record_err(&path)(e.error))?;

        tracing::debug!(key, bytes = data.len(), path = %path.display(), "file cache write");
        Ok(())
    }

    fn touch(&self, key: &str) -> Result<bool> {
        check_key(key)?;
        let path = self.path(key);

        let file = match OpenOptions::new().write(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(source) => return Err(Error::Record { path, source }),
        };
        file.set_modified(SystemTime::now())
            .map_err(record_err(&path))?;
        Ok(true)
    }

    fn remove(&self, key: &str) -> Result<bool> {
        check_key(key)?;
        let path = self.path(key);

        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(Error::Record { path, source }),
        }
    }
}
