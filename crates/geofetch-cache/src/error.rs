use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cache key must not be empty")]
    InvalidKey,

    #[error("failed to access cache record '{path}': {source}")]
    Record { path: PathBuf, source: io::Error },

    #[error("corrupt cache metadata: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
