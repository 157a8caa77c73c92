use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const ENV_USER_AGENT: &str = "GEOFETCH_USERAGENT";
pub const ENV_TIMEOUT: &str = "GEOFETCH_HTTP_TIMEOUT";
pub const ENV_CONNECT_TIMEOUT: &str = "GEOFETCH_HTTP_CONNECTTIMEOUT";
pub const ENV_RETRY_DELAY: &str = "GEOFETCH_HTTP_RETRY_DELAY";
pub const ENV_DEBUG: &str = "GEOFETCH_HTTP_DEBUG";
pub const ENV_SIMULATE_CODE: &str = "GEOFETCH_SIMULATE_HTTP_RESPONSE_CODE";
pub const ENV_DISABLE: &str = "GEOFETCH_HTTP_DISABLE";
pub const ENV_PROXY_HOST: &str = "GEOFETCH_PROXY";
pub const ENV_PROXY_PORT: &str = "GEOFETCH_PROXYPORT";
pub const ENV_PROXY_AUTH: &str = "GEOFETCH_PROXYAUTH";

const DEFAULT_PROXY_PORT: u16 = 8080;

fn default_proxy_port() -> u16 {
    DEFAULT_PROXY_PORT
}

/// An HTTP proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProxySettings {
    pub host: String,

    #[serde(default = "default_proxy_port")]
    pub port: u16,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,
}

impl ProxySettings {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            username: None,
            password: None,
        }
    }

    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// `http://host:port`, or the host unchanged if it already has a scheme.
    pub fn url(&self) -> String {
        if self.host.contains("://") {
            format!("{}:{}", self.host, self.port)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }

    /// Read `GEOFETCH_PROXY`, `GEOFETCH_PROXYPORT` and `GEOFETCH_PROXYAUTH`.
    pub fn from_env() -> Result<Option<Self>> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build proxy settings from an arbitrary variable source.
    ///
    /// Returns `None` when no proxy host is set. `GEOFETCH_PROXYAUTH` has the
    /// form `user:password`.
    pub fn from_lookup<F>(lookup: F) -> Result<Option<Self>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(host) = lookup(ENV_PROXY_HOST).filter(|h| !h.trim().is_empty()) else {
            return Ok(None);
        };

        let port = match lookup(ENV_PROXY_PORT) {
            Some(raw) => raw.trim().parse().map_err(|_| Error::Config {
                name: ENV_PROXY_PORT.to_string(),
                value: raw.clone(),
            })?,
            None => DEFAULT_PROXY_PORT,
        };

        let mut proxy = Self::new(host.trim(), port);
        if let Some(auth) = lookup(ENV_PROXY_AUTH) {
            let (user, password) = auth.split_once(':').unwrap_or((auth.as_str(), ""));
            proxy = proxy.credentials(user, password);
        }
        Ok(Some(proxy))
    }
}

/// Process-level HTTP settings, read once at startup.
///
/// Handed by value to the transport and [`crate::Fetcher`] constructors.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use geofetch::FetchConfig;
///
/// let config = FetchConfig::default()
///     .user_agent("tiler/2.0")
///     .timeout(Duration::from_secs(30))
///     .retry_delay(Duration::from_millis(250));
///
/// assert_eq!(config.user_agent, "tiler/2.0");
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "ConfigFile")]
pub struct FetchConfig {
    pub user_agent: String,

    /// Overall request timeout. `None` means unlimited.
    pub timeout: Option<Duration>,

    /// Connection establishment timeout. `None` means unlimited.
    pub connect_timeout: Option<Duration>,

    /// Delay armed on recoverable failures.
    pub retry_delay: Duration,

    pub proxy: Option<ProxySettings>,

    /// Verbose per-request tracing.
    pub debug: bool,

    /// Replace every real status code with this one. Testing only.
    pub simulate_response_code: Option<u16>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("geofetch/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: None,
            connect_timeout: None,
            retry_delay: Duration::from_millis(500),
            proxy: None,
            debug: false,
            simulate_response_code: None,
        }
    }
}

impl FetchConfig {
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = unlimited_if_zero(timeout);
        self
    }

    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = unlimited_if_zero(timeout);
        self
    }

    #[must_use]
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    #[must_use]
    pub fn proxy(mut self, proxy: ProxySettings) -> Self {
        self.proxy = Some(proxy);
        self
    }

    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    #[must_use]
    pub fn simulate_response_code(mut self, code: u16) -> Self {
        self.simulate_response_code = Some(code);
        self
    }

    /// Overlay the `GEOFETCH_*` environment on the defaults.
    ///
    /// Proxy variables are not read here; a transport reads them when built.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// [`FetchConfig::from_env`] over an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(user_agent) = lookup(ENV_USER_AGENT) {
            config.user_agent = user_agent;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT) {
            config.timeout = unlimited_if_zero(parse_seconds(ENV_TIMEOUT, &raw)?);
        }
        if let Some(raw) = lookup(ENV_CONNECT_TIMEOUT) {
            config.connect_timeout = unlimited_if_zero(parse_seconds(ENV_CONNECT_TIMEOUT, &raw)?);
        }
        if let Some(raw) = lookup(ENV_RETRY_DELAY) {
            config.retry_delay = parse_seconds(ENV_RETRY_DELAY, &raw)?;
        }
        if lookup(ENV_DEBUG).is_some() {
            config.debug = true;
            tracing::info!("HTTP debugging enabled");
        }

        if let Some(raw) = lookup(ENV_SIMULATE_CODE) {
            let code = raw.trim().parse().unwrap_or(404);
            tracing::warn!(code, "simulating network errors with a fixed response code");
            config.simulate_response_code = Some(code);
        }
        if lookup(ENV_DISABLE).is_some() {
            tracing::warn!("HTTP traffic disabled");
            config.simulate_response_code = Some(500);
        }

        Ok(config)
    }

    /// Parse a TOML document. Durations are given in (fractional) seconds.
    ///
    /// ```
    /// use geofetch::FetchConfig;
    ///
    /// let config = FetchConfig::from_toml_str(r#"
    ///     user_agent = "tiler/2.0"
    ///     timeout = 30
    ///     retry_delay = 0.25
    ///
    ///     [proxy]
    ///     host = "proxy.internal"
    /// "#).unwrap();
    ///
    /// assert_eq!(config.proxy.unwrap().port, 8080);
    /// ```
    pub fn from_toml_str(document: &str) -> Result<Self> {
        Ok(toml::from_str(document)?)
    }
}

/// On-disk shape of [`FetchConfig`].
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    user_agent: Option<String>,
    timeout: Option<f64>,
    connect_timeout: Option<f64>,
    retry_delay: Option<f64>,
    proxy: Option<ProxySettings>,
    debug: Option<bool>,
    simulate_response_code: Option<u16>,
}

impl TryFrom<ConfigFile> for FetchConfig {
    type Error = Error;

    fn try_from(file: ConfigFile) -> Result<Self> {
        let defaults = FetchConfig::default();
        let seconds = |name: &str, value: Option<f64>| -> Result<Option<Duration>> {
            value
                .map(|secs| {
                    Duration::try_from_secs_f64(secs).map_err(|_| Error::Config {
                        name: name.to_string(),
                        value: secs.to_string(),
                    })
                })
                .transpose()
        };

        Ok(Self {
            user_agent: file.user_agent.unwrap_or(defaults.user_agent),
            timeout: seconds("timeout", file.timeout)?.and_then(unlimited_if_zero),
            connect_timeout: seconds("connect_timeout", file.connect_timeout)?
                .and_then(unlimited_if_zero),
            retry_delay: seconds("retry_delay", file.retry_delay)?.unwrap_or(defaults.retry_delay),
            proxy: file.proxy,
            debug: file.debug.unwrap_or(defaults.debug),
            simulate_response_code: file.simulate_response_code,
        })
    }
}

fn unlimited_if_zero(duration: Duration) -> Option<Duration> {
    (!duration.is_zero()).then_some(duration)
}

fn parse_seconds(name: &str, raw: &str) -> Result<Duration> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| Error::Config {
            name: name.to_string(),
            value: raw.to_string(),
        })
}
