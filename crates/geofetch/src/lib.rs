//! Cached HTTP fetching of tiles and objects.
//!
//! # Architecture
//!
//! This crate follows the three-layer pattern:
//! - `data` - Immutable request, response, policy and configuration types
//! - `core` - Pure transformations (multipart framing, failure classification,
//!   cache keys, retry backoff)
//! - `effects` - I/O behind the [`Transport`] trait and the [`Fetcher`]
//!   orchestrator that layers a [`Cache`] over it
//!
//! # Key Features
//!
//! - **Cache-aware**: fresh entries are served without touching the network,
//!   `304 Not Modified` extends an entry's freshness, and only successful
//!   live responses are written back
//! - **Failures as data**: a fetch never returns `Err`; callers branch on
//!   [`ResultKind`] and read diagnostics from [`RequestMetadata`]
//! - **Per-worker ownership**: each thread owns its own [`Fetcher`] and
//!   transport; only the cache bin is shared

mod core;
mod data;
mod effects;
mod error;

pub use crate::core::{
    Classification, Decoded, MultipartDecoder, MultipartError, boundary_from_mime, cache_key,
    classify, decode_multipart, encode_multipart, format_http_date, is_recoverable,
    parse_http_date, requires_revalidation, retry_delay,
};
pub use data::{
    AuthenticationMap, CachePolicy, CacheUsage, Credentials, FetchConfig, FetchOptions,
    FetchPhase, FetchResult, Param, Part, Progress, ProgressCallback, ProxySettings, Request,
    RequestMetadata, Response, ResultKind, StatusCategory,
};
pub use effects::{Decoder, FetchStats, Fetcher, JsonDecoder, TextDecoder, Transport};

#[cfg(feature = "reqwest")]
pub use effects::ReqwestTransport;

pub use error::{Error, Result};
pub use geofetch_cache::{Cache, CacheRecord, FileCache, Headers, LruCache, MemCache};
