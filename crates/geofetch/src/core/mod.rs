//! Pure transformations for fetching.
//!
//! Nothing here touches the network, the cache or the clock beyond reading
//! the current time for freshness checks.

mod cache_control;
mod classify;
mod http_date;
mod key;
mod multipart;
mod retry;

pub use cache_control::requires_revalidation;
pub use classify::{Classification, classify, is_recoverable};
pub use http_date::{format_http_date, parse_http_date};
pub use key::cache_key;
pub use multipart::{
    Decoded, MultipartDecoder, MultipartError, boundary_from_mime, decode_multipart,
    encode_multipart,
};
pub use retry::retry_delay;
