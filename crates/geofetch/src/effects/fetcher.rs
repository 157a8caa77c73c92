use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use geofetch_cache::Cache;
use tempfile::NamedTempFile;

use crate::core::{cache_key, classify, requires_revalidation, retry_delay};
use crate::data::{
    CacheUsage, FetchConfig, FetchOptions, FetchResult, ProgressCallback, Request,
    RequestMetadata, Response, ResultKind,
};
use crate::effects::decoder::Decoder;
use crate::effects::transport::Transport;
use crate::error::{Error, Result};

/// Requests between average-duration reports in debug mode.
const STATS_INTERVAL: u64 = 60;

/// Request count and cumulative duration for one [`Fetcher`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    pub requests: u64,
    pub total: Duration,
}

impl FetchStats {
    pub fn average(&self) -> Option<Duration> {
        u32::try_from(self.requests)
            .ok()
            .filter(|&n| n > 0)
            .map(|n| self.total / n)
    }
}

/// The cache orchestrator.
///
/// Owns one transport and is meant to be owned by one worker thread; give
/// every worker its own `Fetcher` and share only the cache bin (through
/// [`FetchOptions::cache`]).
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use geofetch::{FetchConfig, FetchOptions, Fetcher, MemCache, Request};
///
/// let mut fetcher = Fetcher::from_config(FetchConfig::from_env()?)?;
/// let options = FetchOptions::default().cache(Arc::new(MemCache::default()));
///
/// let result = fetcher.fetch(&Request::new("http://tiles.example.com/0/0/0.png"), &options, None);
/// if result.succeeded() {
///     println!("{} bytes, cached: {}", result.value.unwrap_or_default().len(), result.from_cache);
/// }
/// # Ok::<(), geofetch::Error>(())
/// ```
pub struct Fetcher<T: Transport> {
    transport: T,
    config: FetchConfig,
    stats: FetchStats,
}

#[cfg(feature = "reqwest")]
impl Fetcher<crate::effects::http::ReqwestTransport> {
    /// A fetcher over a [`crate::ReqwestTransport`] built from `config`.
    pub fn from_config(config: FetchConfig) -> Result<Self> {
        let transport = crate::effects::http::ReqwestTransport::new(&config)?;
        Ok(Self::new(transport, config))
    }
}

impl<T: Transport> Fetcher<T> {
    pub fn new(transport: T, config: FetchConfig) -> Self {
        Self {
            transport,
            config,
            stats: FetchStats::default(),
        }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn stats(&self) -> FetchStats {
        self.stats
    }

    pub fn set_user_agent(&mut self, user_agent: impl Into<String>) -> Result<()> {
        let user_agent = user_agent.into();
        self.transport.set_user_agent(&user_agent)?;
        self.config.user_agent = user_agent;
        Ok(())
    }

    pub fn set_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.transport.set_timeout(timeout)?;
        self.config.timeout = timeout;
        Ok(())
    }

    pub fn set_connect_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.transport.set_connect_timeout(timeout)?;
        self.config.connect_timeout = timeout;
        Ok(())
    }

    /// Fetch `request`, consulting and updating the cache bin in `options`.
    ///
    /// 1. A cached entry is served as is unless the policy finds it stale or
    ///    its stored `cache-control` says `no-cache`.
    /// 2. Under [`CacheUsage::CacheOnly`] the transport is never called; a
    ///    miss yields a response classified as not found.
    /// 3. A `304` answer touches the entry and keeps serving it.
    /// 4. A `200` live answer is written back when the policy permits writes.
    ///    This is the only path that writes.
    pub fn get(
        &mut self,
        request: &Request,
        options: &FetchOptions,
        progress: Option<&ProgressCallback>,
    ) -> Response {
        let started = Instant::now();
        let url = request.full_url();
        let key = cache_key(&url);
        let bin = options.cache_bin();
        let usage = options.policy.usage;

        let mut candidate = None;
        let mut expired = false;
        if let Some(bin) = bin {
            match bin.read(&key) {
                Ok(Some(record)) => {
                    expired = requires_revalidation(&record.headers)
                        || options.policy.is_expired(record.last_modified);
                    candidate = Some(Response::from_cache_record(record));
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(key = %key, error = %e, "cache read failed, treating as a miss"),
            }
        }

        let response = match candidate {
            Some(hit) if !expired => hit,
            candidate if usage == CacheUsage::CacheOnly => {
                candidate.unwrap_or_else(Response::cache_miss)
            }
            candidate => {
                let remote = self.transport.get(request, options, progress);
                if remote.status() == 304 {
                    if let Some(bin) = bin {
                        touch(bin, &key);
                    }
                    candidate.unwrap_or(remote)
                } else {
                    if remote.is_ok()
                        && usage.writes()
                        && let Some(bin) = bin
                    {
                        store(bin, &key, &remote);
                    }
                    remote
                }
            }
        };

        self.record(&url, &response, started.elapsed());
        response
    }

    /// Fetch `request` and classify the outcome. The value is part 0's bytes.
    pub fn fetch(
        &mut self,
        request: &Request,
        options: &FetchOptions,
        progress: Option<&ProgressCallback>,
    ) -> FetchResult<Bytes> {
        let response = self.get(request, options, progress);
        self.complete(request, response, progress, |response| {
            Ok(response.part(0).map(|part| part.data.clone()).unwrap_or_default())
        })
    }

    /// Fetch `request` and decode part 0 with `decoder`.
    ///
    /// A successful response the decoder declines becomes
    /// [`ResultKind::NoDecoder`]; one it fails on becomes
    /// [`ResultKind::DecodeFailed`].
    pub fn fetch_decoded<D: Decoder>(
        &mut self,
        request: &Request,
        options: &FetchOptions,
        progress: Option<&ProgressCallback>,
        decoder: &D,
    ) -> FetchResult<D::Output> {
        let url = request.full_url();
        let response = self.get(request, options, progress);
        self.complete(request, response, progress, |response| {
            if !decoder.accepts(response.mime_type(), &url) {
                return Err((
                    ResultKind::NoDecoder,
                    format!("Content-Type={}", response.mime_type()),
                ));
            }
            let data = response.part(0).map(|part| &part.data[..]).unwrap_or_default();
            decoder.decode(data).map_err(|e| {
                if self.config.debug {
                    tracing::warn!(url = %url, error = %e, "failed to decode response");
                }
                (ResultKind::DecodeFailed, e.to_string())
            })
        })
    }

    /// [`Fetcher::fetch`], re-issued up to `max_retries` times while the
    /// outcome is recoverable.
    ///
    /// Waits [`retry_delay`] of the armed delay between attempts and resets
    /// `progress` before each one.
    pub fn fetch_with_retry(
        &mut self,
        request: &Request,
        options: &FetchOptions,
        progress: &ProgressCallback,
        max_retries: u32,
    ) -> FetchResult<Bytes> {
        let mut retry_count = 0;
        loop {
            progress.reset();
            let result = self.fetch(request, options, Some(progress));

            match result.retry_after {
                Some(base) if retry_count < max_retries => {
                    let delay = retry_delay(retry_count, base);
                    tracing::debug!(
                        url = %result.metadata.url,
                        kind = %result.kind,
                        retry = retry_count + 1,
                        delay_ms = delay.as_millis() as u64,
                        "retrying recoverable failure"
                    );
                    thread::sleep(delay);
                    retry_count += 1;
                }
                _ => return result,
            }
        }
    }

    /// Fetch `url` without caching and write its body to `path`.
    ///
    /// Multipart responses contribute part 1, others part 0. The file is
    /// replaced atomically.
    pub fn download(&mut self, url: &str, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();
        let response = self.get(&Request::new(url), &FetchOptions::default(), None);

        if !response.is_ok() {
            return Err(Error::Fetch {
                url: url.to_string(),
                kind: classify(&response).kind,
                code: response.status(),
            });
        }

        let index = if response.parts().len() > 1 { 1 } else { 0 };
        let part = response.part(index).ok_or_else(|| Error::EmptyResponse {
            url: url.to_string(),
        })?;

        let write_err = |source| Error::Write {
            path: path.to_path_buf(),
            source,
        };
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut staged = NamedTempFile::new_in(dir).map_err(write_err)?;
        staged.write_all(&part.data).map_err(write_err)?;
        staged.persist(path).map_err(|e| write_err(e.error))?;

        tracing::info!(url, path = %path.display(), bytes = part.size(), "downloaded");
        Ok(path.to_path_buf())
    }

    fn complete<V, F>(
        &self,
        request: &Request,
        response: Response,
        progress: Option<&ProgressCallback>,
        decode: F,
    ) -> FetchResult<V>
    where
        F: FnOnce(&Response) -> std::result::Result<V, (ResultKind, String)>,
    {
        let classification = classify(&response);
        let mut kind = classification.kind;
        let mut value = None;
        let mut error_detail = None;
        let mut retry_after = None;

        if kind == ResultKind::Ok {
            match decode(&response) {
                Ok(decoded) => value = Some(decoded),
                Err((failed, detail)) => {
                    kind = failed;
                    error_detail = Some(detail);
                }
            }
        } else {
            if !response.parts().is_empty() {
                let body = response.part_as_string(0);
                if self.config.debug {
                    tracing::warn!(url = %request.full_url(), body = %body, "server reports");
                }
                error_detail = Some(body);
            }

            if classification.recoverable {
                let delay = self.config.retry_delay;
                retry_after = Some(delay);
                if let Some(progress) = progress {
                    progress.arm_retry(delay);
                    progress.cancel();
                    if response.status() == 503 {
                        progress.set_message("Server deferral");
                    }
                }
                if self.config.debug {
                    tracing::info!(url = %request.full_url(), %kind, "recoverable error");
                }
            }
        }

        FetchResult {
            kind,
            value,
            error_detail,
            retry_after,
            metadata: RequestMetadata::describe(request, &response),
            from_cache: response.from_cache(),
            last_modified: response.last_modified(),
            duration: response.duration(),
            response,
        }
    }

    fn record(&mut self, url: &str, response: &Response, elapsed: Duration) {
        self.stats.requests += 1;
        self.stats.total += elapsed;

        let elapsed_ms = elapsed.as_millis() as u64;
        if self.config.debug {
            tracing::info!(
                url,
                status = response.status(),
                from_cache = response.from_cache(),
                elapsed_ms,
                "GET"
            );
            if self.stats.requests % STATS_INTERVAL == 0
                && let Some(average) = self.stats.average()
            {
                tracing::info!(
                    requests = self.stats.requests,
                    average_ms = average.as_millis() as u64,
                    "average request duration"
                );
            }
        } else {
            tracing::debug!(
                url,
                status = response.status(),
                from_cache = response.from_cache(),
                elapsed_ms,
                "GET"
            );
        }
    }
}

fn touch(bin: &dyn Cache, key: &str) {
    match bin.touch(key) {
        Ok(true) => tracing::debug!(key, "not modified, cache entry refreshed"),
        Ok(false) => tracing::debug!(key, "not modified, but no cache entry to refresh"),
        Err(e) => tracing::warn!(key, error = %e, "cache touch failed"),
    }
}

fn store(bin: &dyn Cache, key: &str, response: &Response) {
    let mut headers = response.headers().clone();
    if !headers.contains("content-type") && !response.mime_type().is_empty() {
        headers.insert("content-type", response.mime_type());
    }
    let data = response.part(0).map(|part| &part.data[..]).unwrap_or_default();

    if let Err(e) = bin.write(key, data, &headers) {
        tracing::warn!(key, error = %e, "cache write failed");
    }
}
