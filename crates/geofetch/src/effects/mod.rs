//! I/O operations for fetching.
//!
//! Network access sits behind the [`Transport`] trait; the [`Fetcher`]
//! combines a transport with a cache bin and turns responses into results.

mod decoder;
mod fetcher;
mod http;
mod transport;

pub use decoder::{Decoder, JsonDecoder, TextDecoder};
pub use fetcher::{FetchStats, Fetcher};
pub use transport::Transport;

#[cfg(feature = "reqwest")]
pub use http::ReqwestTransport;
