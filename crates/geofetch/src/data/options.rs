use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use geofetch_cache::{Cache, FileCache};

use super::config::ProxySettings;
use super::policy::CachePolicy;
use crate::error::Result;

/// A username and password for HTTP basic authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Credentials keyed by URL prefix.
///
/// Lookup picks the longest registered prefix of the request URL.
///
/// # Examples
///
/// ```
/// use geofetch::{AuthenticationMap, Credentials};
///
/// let mut auth = AuthenticationMap::new();
/// auth.add("http://tiles.example.com/", Credentials::new("reader", "pw"));
/// auth.add("http://tiles.example.com/private/", Credentials::new("admin", "pw2"));
///
/// let found = auth.get("http://tiles.example.com/private/0/0/0.png").unwrap();
/// assert_eq!(found.username, "admin");
/// assert!(auth.get("http://elsewhere.example.com/").is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthenticationMap {
    entries: Vec<(String, Credentials)>,
}

impl AuthenticationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register credentials for every URL starting with `prefix`.
    pub fn add(&mut self, prefix: impl Into<String>, credentials: Credentials) {
        let prefix = prefix.into();
        self.entries.retain(|(existing, _)| *existing != prefix);
        self.entries.push((prefix, credentials));
    }

    pub fn get(&self, url: &str) -> Option<&Credentials> {
        self.entries
            .iter()
            .filter(|(prefix, _)| url.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, credentials)| credentials)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Per-call options: the cache bin and its policy, proxy and credentials.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use geofetch::{CachePolicy, FetchOptions, MemCache};
///
/// let options = FetchOptions::default()
///     .cache(Arc::new(MemCache::default()))
///     .policy(CachePolicy::default().max_age(Duration::from_secs(3600)));
///
/// assert!(options.cache_bin().is_some());
/// ```
#[derive(Clone, Default)]
pub struct FetchOptions {
    /// Shared cache bin. `None` disables caching.
    pub cache: Option<Arc<dyn Cache>>,

    pub policy: CachePolicy,

    /// Overrides the configured and environment proxies for this call.
    pub proxy: Option<ProxySettings>,

    pub authentication: Option<Arc<AuthenticationMap>>,
}

impl fmt::Debug for FetchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchOptions")
            .field("cache", &self.cache.as_ref().map(|_| "{ ... }"))
            .field("policy", &self.policy)
            .field("proxy", &self.proxy)
            .field("authentication", &self.authentication)
            .finish()
    }
}

impl FetchOptions {
    #[must_use]
    pub fn cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Use an on-disk bin rooted at `root`, creating the directory if needed.
    pub fn file_cache(self, root: impl Into<PathBuf>) -> Result<Self> {
        Ok(self.cache(Arc::new(FileCache::open(root)?)))
    }

    #[must_use]
    pub fn policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn proxy(mut self, proxy: ProxySettings) -> Self {
        self.proxy = Some(proxy);
        self
    }

    #[must_use]
    pub fn authentication(mut self, authentication: Arc<AuthenticationMap>) -> Self {
        self.authentication = Some(authentication);
        self
    }

    /// The bin to consult, if caching is enabled by both bin and policy.
    pub fn cache_bin(&self) -> Option<&dyn Cache> {
        self.cache
            .as_deref()
            .filter(|_| self.policy.usage.reads())
    }

    pub fn credentials_for(&self, url: &str) -> Option<&Credentials> {
        self.authentication.as_ref()?.get(url)
    }
}
