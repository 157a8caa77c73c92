//! Keyed cache bins for fetched tiles and objects.
//!
//! # Architecture
//!
//! - `headers.rs` - Case-insensitive metadata map stored beside each body
//! - `lru.rs` - Bounded least-recently-used container
//! - `bin.rs` - The [`Cache`] capability consumed by the fetch orchestrator
//! - `memory.rs` - In-process bin over [`LruCache`]
//! - `file.rs` - On-disk bin with atomic record placement
//!
//! Bins are shared between worker threads, so every implementation is
//! `Send + Sync`. Concurrent writes to one key are last-writer-wins.

pub use bin::{Cache, CacheRecord};
pub use error::{Error, Result};
pub use file::FileCache;
pub use headers::Headers;
pub use lru::LruCache;
pub use memory::MemCache;

mod bin;
mod error;
mod file;
mod headers;
mod lru;
mod memory;
