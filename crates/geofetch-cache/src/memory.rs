use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use bytes::Bytes;

use crate::bin::check_key;
use crate::{Cache, CacheRecord, Headers, LruCache, Result};

/// In-process cache bin.
///
/// Holds at most `capacity` records and evicts the least recently used one.
/// Reads and touches both count as use.
pub struct MemCache {
    lru: Mutex<LruCache<String, CacheRecord>>,
}

impl MemCache {
    pub const DEFAULT_CAPACITY: usize = 16;

    pub fn new(capacity: usize) -> Self {
        Self {
            lru: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    // Records are replaced whole, so a poisoned lock still guards valid data.
    fn lock(&self) -> MutexGuard<'_, LruCache<String, CacheRecord>> {
        self.lru.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl Cache for MemCache {
    fn read(&self, key: &str) -> Result<Option<CacheRecord>> {
        check_key(key)?;
        Ok(self.lock().get(&key.to_string()))
    }

    fn write(&self, key: &str, data: &[u8], headers: &Headers) -> Result<()> {
        check_key(key)?;
        let record = CacheRecord {
            data: Bytes::copy_from_slice(data),
            headers: headers.clone(),
            last_modified: SystemTime::now(),
        };
        self.lock().insert(key.to_string(), record);
        tracing::debug!(key, bytes = data.len(), "memory cache write");
        Ok(())
    }

    fn touch(&self, key: &str) -> Result<bool> {
        check_key(key)?;
        let mut lru = self.lock();
        match lru.get_mut(&key.to_string()) {
            Some(record) => {
                record.last_modified = SystemTime::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn remove(&self, key: &str) -> Result<bool> {
        check_key(key)?;
        Ok(self.lock().erase(&key.to_string()))
    }
}
