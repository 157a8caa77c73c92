use std::fmt;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use geofetch_cache::Headers;
use serde::{Deserialize, Serialize};

use super::request::Request;
use super::response::Response;

/// The closed set of fetch outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    Ok,
    Canceled,
    Timeout,
    /// No status was obtained: DNS failure, refused connection and the like.
    TransportFailure,
    NotFound,
    /// Only reachable when no cached entry backs the request.
    NotModified,
    Unauthorized,
    ServerError,
    UnknownError,
    /// Multipart framing error.
    ProtocolViolation,
    /// No decoder accepts the content type.
    NoDecoder,
    DecodeFailed,
}

impl ResultKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResultKind::Ok => "ok",
            ResultKind::Canceled => "canceled",
            ResultKind::Timeout => "timeout",
            ResultKind::TransportFailure => "transport failure",
            ResultKind::NotFound => "not found",
            ResultKind::NotModified => "not modified",
            ResultKind::Unauthorized => "unauthorized",
            ResultKind::ServerError => "server error",
            ResultKind::UnknownError => "unknown error",
            ResultKind::ProtocolViolation => "protocol violation",
            ResultKind::NoDecoder => "no decoder",
            ResultKind::DecodeFailed => "decode failed",
        }
    }
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Diagnostics attached to every fetch result, success or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestMetadata {
    pub url: String,

    /// The HTTP status, absent when no server answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_code: Option<u16>,

    /// Why no status was obtained.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub request_headers: Headers,
    pub response_headers: Headers,
}

impl RequestMetadata {
    pub fn describe(request: &Request, response: &Response) -> Self {
        let (response_code, error) = match response.status() {
            0 if response.message().is_empty() => (None, Some("unknown request error".to_string())),
            0 => (None, Some(response.message().to_string())),
            code => (Some(code), None),
        };

        Self {
            url: request.full_url(),
            response_code,
            error,
            request_headers: request.headers().clone(),
            response_headers: response.headers().clone(),
        }
    }
}

/// The outcome of [`crate::Fetcher::fetch`] and its variants.
#[derive(Debug, Clone)]
pub struct FetchResult<T = Bytes> {
    pub kind: ResultKind,

    /// The decoded body, present only when `kind` is [`ResultKind::Ok`].
    pub value: Option<T>,

    pub response: Response,

    /// The server's error body, or the decoder's complaint.
    pub error_detail: Option<String>,

    /// Set for recoverable failures: re-issue after this delay.
    pub retry_after: Option<Duration>,

    pub metadata: RequestMetadata,
    pub from_cache: bool,
    pub last_modified: Option<SystemTime>,
    pub duration: Duration,
}

impl<T> FetchResult<T> {
    pub fn succeeded(&self) -> bool {
        self.kind == ResultKind::Ok
    }

    pub fn is_recoverable(&self) -> bool {
        self.retry_after.is_some()
    }

    /// The value, or `None` for failures.
    pub fn into_value(self) -> Option<T> {
        self.value
    }
}
