//! Immutable data types for fetching.
//!
//! Requests, responses, cache policies and configuration are plain values:
//! built by the caller (or the transport), handed across layers, and read
//! afterwards without mutation.

pub mod config;
pub mod options;
pub mod policy;
pub mod progress;
pub mod request;
pub mod response;
pub mod result;

pub use config::{FetchConfig, ProxySettings};
pub use options::{AuthenticationMap, Credentials, FetchOptions};
pub use policy::{CachePolicy, CacheUsage};
pub use progress::{FetchPhase, Progress, ProgressCallback};
pub use request::{Param, Request};
pub use response::{Part, Response, StatusCategory};
pub use result::{FetchResult, RequestMetadata, ResultKind};
