use std::time::SystemTime;

use bytes::Bytes;

use crate::{Headers, Result};

/// A stored body together with the response headers it was written with.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRecord {
    pub data: Bytes,
    pub headers: Headers,

    /// Time of the last write or touch. Freshness is measured from here.
    pub last_modified: SystemTime,
}

/// Keyed storage for previously fetched bodies.
///
/// Implementations must tolerate concurrent calls from several worker threads
/// against the same key. The last write to a key wins.
pub trait Cache: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<CacheRecord>>;

    fn write(&self, key: &str, data: &[u8], headers: &Headers) -> Result<()>;

    /// Refresh the record's timestamp without rewriting its body.
    ///
    /// Returns `false` if there is no record under `key`.
    fn touch(&self, key: &str) -> Result<bool>;

    fn remove(&self, key: &str) -> Result<bool>;
}

pub(crate) fn check_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(crate::Error::InvalidKey);
    }
    Ok(())
}
