use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

/// How a fetch may use its cache bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheUsage {
    /// Read fresh entries, revalidate stale ones, write successful responses.
    #[default]
    ReadWrite,

    /// Serve any cached entry regardless of age; fetch and write on a miss.
    CacheFirst,

    /// Never contact the network.
    CacheOnly,

    /// Read the cache but never write to it.
    ReadOnly,

    /// Ignore the cache entirely.
    NoCache,
}

impl CacheUsage {
    pub fn reads(self) -> bool {
        self != CacheUsage::NoCache
    }

    pub fn writes(self) -> bool {
        matches!(self, CacheUsage::ReadWrite | CacheUsage::CacheFirst)
    }
}

/// Usage mode plus the expiration rule applied to cached entries.
///
/// # Examples
///
/// ```
/// use std::time::{Duration, SystemTime};
/// use geofetch::{CachePolicy, CacheUsage};
///
/// let policy = CachePolicy::default().max_age(Duration::from_secs(60));
/// assert!(!policy.is_expired(SystemTime::now()));
/// assert!(policy.is_expired(SystemTime::now() - Duration::from_secs(120)));
///
/// let offline = CachePolicy::new(CacheUsage::CacheFirst).max_age(Duration::ZERO);
/// assert!(!offline.is_expired(SystemTime::UNIX_EPOCH));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CachePolicy {
    pub usage: CacheUsage,

    /// Entries older than this are stale. `None` never expires by age.
    pub max_age: Option<Duration>,

    /// Entries written before this instant are stale.
    pub min_time: Option<SystemTime>,
}

impl CachePolicy {
    pub const NO_CACHE: Self = Self::new(CacheUsage::NoCache);
    pub const CACHE_ONLY: Self = Self::new(CacheUsage::CacheOnly);

    pub const fn new(usage: CacheUsage) -> Self {
        Self {
            usage,
            max_age: None,
            min_time: None,
        }
    }

    #[must_use]
    pub fn usage(mut self, usage: CacheUsage) -> Self {
        self.usage = usage;
        self
    }

    #[must_use]
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    #[must_use]
    pub fn min_time(mut self, min_time: SystemTime) -> Self {
        self.min_time = Some(min_time);
        self
    }

    /// Whether an entry last written or touched at `time` is stale.
    pub fn is_expired(&self, time: SystemTime) -> bool {
        if self.usage == CacheUsage::CacheFirst {
            return false;
        }

        if self.min_time.is_some_and(|min| time < min) {
            return true;
        }

        match (self.max_age, SystemTime::now().duration_since(time)) {
            (Some(max_age), Ok(age)) => age > max_age,
            _ => false,
        }
    }
}
