#[cfg(feature = "reqwest")]
mod reqwest_impl {
    use std::error::Error as StdError;
    use std::io::{self, Read};
    use std::sync::{Mutex, PoisonError};
    use std::time::{Duration, Instant};

    use geofetch_cache::Headers;
    use reqwest::blocking::Client;

    use crate::core::{boundary_from_mime, decode_multipart, parse_http_date};
    use crate::data::{
        FetchConfig, FetchOptions, FetchPhase, Progress, ProgressCallback, ProxySettings, Request,
        Response,
    };
    use crate::effects::transport::Transport;
    use crate::error::{Error, Result};

    const CHUNK_SIZE: usize = 16 * 1024;
    const MAX_PREALLOC: u64 = 8 * 1024 * 1024;

    /// Production transport using `reqwest`'s blocking client.
    ///
    /// The proxy is chosen per request: the one in [`FetchOptions`], else the
    /// configured one, else the `GEOFETCH_PROXY*` environment captured at
    /// construction, else none. System proxy variables are ignored.
    pub struct ReqwestTransport {
        client: Client,
        config: FetchConfig,
        env_proxy: Option<ProxySettings>,
        /// Client for the most recent per-request proxy override.
        override_client: Mutex<Option<(ProxySettings, Client)>>,
    }

    impl ReqwestTransport {
        /// Build a transport, reading the proxy environment once.
        pub fn new(config: &FetchConfig) -> Result<Self> {
            Self::with_environment_proxy(config, ProxySettings::from_env()?)
        }

        /// Build a transport with an explicit stand-in for the proxy environment.
        pub fn with_environment_proxy(
            config: &FetchConfig,
            env_proxy: Option<ProxySettings>,
        ) -> Result<Self> {
            let config = config.clone();
            let client = build_client(&config, config.proxy.as_ref().or(env_proxy.as_ref()))?;
            Ok(Self {
                client,
                config,
                env_proxy,
                override_client: Mutex::new(None),
            })
        }

        pub fn config(&self) -> &FetchConfig {
            &self.config
        }

        fn default_proxy(&self) -> Option<&ProxySettings> {
            self.config.proxy.as_ref().or(self.env_proxy.as_ref())
        }

        fn rebuild(&mut self) -> Result<()> {
            self.client = build_client(&self.config, self.default_proxy())?;
            *self
                .override_client
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner) = None;
            Ok(())
        }

        fn client_for(&self, proxy: Option<&ProxySettings>) -> Result<Client> {
            let Some(proxy) = proxy.filter(|p| Some(*p) != self.default_proxy()) else {
                return Ok(self.client.clone());
            };

            let mut cached = self
                .override_client
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some((settings, client)) = cached.as_ref()
                && settings == proxy
            {
                return Ok(client.clone());
            }

            let client = build_client(&self.config, Some(proxy))?;
            *cached = Some((proxy.clone(), client.clone()));
            Ok(client)
        }
    }

    impl Transport for ReqwestTransport {
        fn get(
            &self,
            request: &Request,
            options: &FetchOptions,
            progress: Option<&ProgressCallback>,
        ) -> Response {
            let started = Instant::now();
            let url = request.full_url();

            if progress.is_some_and(ProgressCallback::is_canceled) {
                return Response::canceled("canceled before the request was sent");
            }

            if self.config.debug {
                if let Some(proxy) = options.proxy.as_ref().or(self.default_proxy()) {
                    tracing::info!(url = %url, proxy = %proxy.url(), "using proxy");
                }
                tracing::info!(url = %url, headers = ?request.headers(), "sending request");
            }

            let client = match self.client_for(options.proxy.as_ref()) {
                Ok(client) => client,
                Err(e) => return Response::failed(e.to_string()).with_duration(started.elapsed()),
            };

            let mut builder = client.get(&url);
            for (name, value) in request.headers().iter() {
                builder = builder.header(name, value);
            }
            if let Some(credentials) = options.credentials_for(&url) {
                builder = builder.basic_auth(&credentials.username, Some(&credentials.password));
            }

            if let Some(progress) = progress {
                progress.report(&Progress {
                    phase: FetchPhase::Connecting,
                    bytes_downloaded: 0,
                    total_bytes: None,
                });
            }

            let mut remote = match builder.send() {
                Ok(remote) => remote,
                Err(e) => {
                    let message = describe(&e);
                    tracing::debug!(url = %url, error = %message, "request failed");
                    let response = if e.is_timeout() {
                        Response::timed_out(message)
                    } else {
                        Response::failed(message)
                    };
                    return response.with_duration(started.elapsed());
                }
            };

            let status = match self.config.simulate_response_code {
                Some(simulated) => {
                    tracing::debug!(url = %url, real = remote.status().as_u16(), simulated, "simulating response code");
                    simulated
                }
                None => remote.status().as_u16(),
            };

            let headers: Headers = remote
                .headers()
                .iter()
                .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)))
                .collect();
            if self.config.debug {
                tracing::info!(url = %url, status, headers = ?headers, "response received");
            }

            let total = remote.content_length();
            let body = match read_body(&mut remote, total, progress) {
                Ok(Some(body)) => body,
                Ok(None) => {
                    return Response::canceled("canceled during transfer")
                        .with_duration(started.elapsed());
                }
                Err(e) => {
                    let response = if io_timed_out(&e) {
                        Response::timed_out(e.to_string())
                    } else {
                        Response::failed(e.to_string())
                    };
                    return response.with_duration(started.elapsed());
                }
            };

            let mime_type = headers.get("content-type").unwrap_or_default().to_string();
            let last_modified = headers.get("last-modified").and_then(parse_http_date);
            let mut response = Response::new(status)
                .with_headers(headers)
                .with_mime_type(mime_type.clone())
                .with_last_modified(last_modified);

            if mime_type.len() > 9 && mime_type.to_ascii_lowercase().starts_with("multipart") {
                let boundary = boundary_from_mime(&mime_type);
                let decoded = decode_multipart(&body, &boundary);
                if let Some(e) = decoded.error {
                    tracing::warn!(url = %url, error = %e, parts = decoded.parts.len(), "multipart decoding stopped early");
                    response = response.with_protocol_violation(e.to_string());
                }
                response = response.with_parts(decoded.parts);
            } else {
                response = response.with_body(body);
            }

            response.with_duration(started.elapsed())
        }

        fn set_user_agent(&mut self, user_agent: &str) -> Result<()> {
            self.config.user_agent = user_agent.to_string();
            self.rebuild()
        }

        fn set_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
            self.config.timeout = timeout;
            self.rebuild()
        }

        fn set_connect_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
            self.config.connect_timeout = timeout;
            self.rebuild()
        }
    }

    fn build_client(config: &FetchConfig, proxy: Option<&ProxySettings>) -> Result<Client> {
        let mut builder = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout);
        if let Some(connect_timeout) = config.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }

        builder = match proxy {
            Some(settings) => {
                let url = settings.url();
                let mut proxy = reqwest::Proxy::all(&url).map_err(|e| Error::InvalidProxy {
                    proxy: url.clone(),
                    reason: e.to_string(),
                })?;
                if let Some(username) = &settings.username {
                    proxy = proxy.basic_auth(username, settings.password.as_deref().unwrap_or_default());
                }
                builder.proxy(proxy)
            }
            None => builder.no_proxy(),
        };

        Ok(builder.build()?)
    }

    /// Read the whole body, reporting progress per chunk.
    ///
    /// Returns `Ok(None)` if `progress` asks to stop.
    pub(super) fn read_body<R: Read>(
        remote: &mut R,
        total: Option<u64>,
        progress: Option<&ProgressCallback>,
    ) -> io::Result<Option<Vec<u8>>> {
        let mut body = Vec::with_capacity(total.unwrap_or(0).min(MAX_PREALLOC) as usize);
        let mut chunk = vec![0u8; CHUNK_SIZE];

        loop {
            let n = match remote.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            body.extend_from_slice(&chunk[..n]);

            if let Some(progress) = progress
                && progress.report(&Progress {
                    phase: FetchPhase::Downloading,
                    bytes_downloaded: body.len() as u64,
                    total_bytes: total,
                })
            {
                return Ok(None);
            }
        }

        if let Some(progress) = progress {
            progress.report(&Progress {
                phase: FetchPhase::Completed,
                bytes_downloaded: body.len() as u64,
                total_bytes: total,
            });
        }
        Ok(Some(body))
    }

    fn io_timed_out(e: &io::Error) -> bool {
        e.kind() == io::ErrorKind::TimedOut
            || e.get_ref()
                .and_then(|inner| inner.downcast_ref::<reqwest::Error>())
                .is_some_and(reqwest::Error::is_timeout)
    }

    /// An error and its sources, joined with `: `.
    fn describe(e: &dyn StdError) -> String {
        let mut message = e.to_string();
        let mut source = e.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use std::io::Cursor;

        #[test]
        fn reads_whole_body_with_progress() {
            let data = vec![7u8; CHUNK_SIZE * 2 + 10];
            let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
            let log = std::sync::Arc::clone(&seen);
            let progress = ProgressCallback::with_reporter(move |p| {
                log.lock().unwrap().push((p.phase, p.bytes_downloaded));
                false
            });

            let body = read_body(&mut Cursor::new(data.clone()), Some(data.len() as u64), Some(&progress))
                .unwrap()
                .unwrap();
            assert_eq!(body, data);

            let seen = seen.lock().unwrap();
            assert_eq!(seen.last(), Some(&(FetchPhase::Completed, data.len() as u64)));
            assert!(seen.iter().any(|(phase, _)| *phase == FetchPhase::Downloading));
        }

        #[test]
        fn stops_when_canceled() {
            let progress = ProgressCallback::with_reporter(|_| true);
            let outcome = read_body(&mut Cursor::new(vec![0u8; CHUNK_SIZE * 4]), None, Some(&progress)).unwrap();
            assert!(outcome.is_none());
            assert!(progress.is_canceled());
        }

        #[test]
        fn timeout_detection() {
            assert!(io_timed_out(&io::Error::from(io::ErrorKind::TimedOut)));
            assert!(!io_timed_out(&io::Error::from(io::ErrorKind::ConnectionReset)));
        }

        #[test]
        fn invalid_proxy_is_reported() {
            let config = FetchConfig::default().proxy(ProxySettings::new("bad host with spaces", 1));
            let err = ReqwestTransport::with_environment_proxy(&config, None).err().unwrap();
            assert!(matches!(err, Error::InvalidProxy { .. } | Error::Client(_)));
        }
    }
}

#[cfg(feature = "reqwest")]
pub use reqwest_impl::ReqwestTransport;
