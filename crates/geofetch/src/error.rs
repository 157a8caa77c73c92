//! Error types for geofetch.
//!
//! These cover construction and configuration only. Fetch outcomes are
//! reported through [`crate::ResultKind`], never as `Err`.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::data::ResultKind;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid value for {name}: '{value}'")]
    Config { name: String, value: String },

    #[error("failed to parse configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[cfg(feature = "reqwest")]
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("invalid proxy '{proxy}': {reason}")]
    InvalidProxy { proxy: String, reason: String },

    #[error("failed to write '{path}': {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Cache(#[from] geofetch_cache::Error),

    #[error("response from {url} carried no body")]
    EmptyResponse { url: String },

    #[error("fetch of {url} failed: {kind} (HTTP {code})")]
    Fetch {
        url: String,
        kind: ResultKind,
        code: u16,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
