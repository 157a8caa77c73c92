use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use geofetch_cache::{CacheRecord, Headers};

use crate::core::parse_http_date;

/// One body segment of a response with its own headers.
///
/// Non-multipart responses carry exactly one part with no headers of its own.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Part {
    pub headers: Headers,
    pub data: Bytes,
}

impl Part {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            headers: Headers::new(),
            data: data.into(),
        }
    }

    #[must_use]
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Coarse HTTP status classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCategory {
    Unknown,
    Informational,
    Success,
    Redirection,
    ClientError,
    ServerError,
}

impl StatusCategory {
    pub fn of(status: u16) -> Self {
        match status {
            0..=99 => StatusCategory::Unknown,
            100..=199 => StatusCategory::Informational,
            200..=299 => StatusCategory::Success,
            300..=399 => StatusCategory::Redirection,
            400..=499 => StatusCategory::ClientError,
            _ => StatusCategory::ServerError,
        }
    }
}

/// The outcome of one GET.
///
/// Built by a transport or, for cache hits, by the fetcher. A status of `0`
/// means no server answered; [`Response::message`] then says why.
#[derive(Debug, Clone, Default)]
pub struct Response {
    status: u16,
    canceled: bool,
    timed_out: bool,
    cache_miss: bool,
    from_cache: bool,
    duration: Duration,
    mime_type: String,
    last_modified: Option<SystemTime>,
    message: String,
    headers: Headers,
    parts: Vec<Part>,
    protocol_violation: Option<String>,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// A transport failure before any status was assigned.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn timed_out(message: impl Into<String>) -> Self {
        Self {
            timed_out: true,
            ..Self::failed(message)
        }
    }

    pub fn canceled(message: impl Into<String>) -> Self {
        Self {
            canceled: true,
            ..Self::failed(message)
        }
    }

    /// Returned when the cache is the only permitted source and holds nothing.
    pub fn cache_miss() -> Self {
        Self {
            cache_miss: true,
            ..Self::failed("not found in cache")
        }
    }

    /// A response served from a cache record.
    pub fn from_cache_record(record: CacheRecord) -> Self {
        let mime_type = record.headers.get("content-type").unwrap_or_default().to_string();
        let last_modified = record
            .headers
            .get("last-modified")
            .and_then(parse_http_date)
            .or(Some(record.last_modified));

        Self {
            status: 200,
            from_cache: true,
            mime_type,
            last_modified,
            parts: vec![Part::new(record.data)],
            headers: record.headers,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    #[must_use]
    pub fn with_part(mut self, part: Part) -> Self {
        self.parts.push(part);
        self
    }

    #[must_use]
    pub fn with_parts(mut self, parts: Vec<Part>) -> Self {
        self.parts = parts;
        self
    }

    /// Convenience for a single-part body.
    #[must_use]
    pub fn with_body(self, data: impl Into<Bytes>) -> Self {
        self.with_part(Part::new(data))
    }

    #[must_use]
    pub fn with_last_modified(mut self, time: Option<SystemTime>) -> Self {
        self.last_modified = time;
        self
    }

    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Record that multipart decoding stopped early.
    #[must_use]
    pub fn with_protocol_violation(mut self, note: impl Into<String>) -> Self {
        self.protocol_violation = Some(note.into());
        self
    }

    #[must_use]
    pub fn with_canceled(mut self, canceled: bool) -> Self {
        self.canceled = canceled;
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn category(&self) -> StatusCategory {
        StatusCategory::of(self.status)
    }

    /// `200` and not canceled.
    pub fn is_ok(&self) -> bool {
        self.status == 200 && !self.canceled
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled
    }

    pub fn is_timed_out(&self) -> bool {
        self.timed_out
    }

    pub fn is_cache_miss(&self) -> bool {
        self.cache_miss
    }

    pub fn from_cache(&self) -> bool {
        self.from_cache
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn last_modified(&self) -> Option<SystemTime> {
        self.last_modified
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Header names (lower-case) to values, for metadata records.
    pub fn headers_as_map(&self) -> BTreeMap<String, String> {
        self.headers.clone().into()
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn part(&self, index: usize) -> Option<&Part> {
        self.parts.get(index)
    }

    /// Part `index` as lossy UTF-8, or an empty string if absent.
    pub fn part_as_string(&self, index: usize) -> String {
        self.parts
            .get(index)
            .map(|part| String::from_utf8_lossy(&part.data).into_owned())
            .unwrap_or_default()
    }

    pub fn protocol_violation(&self) -> Option<&str> {
        self.protocol_violation.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories() {
        assert_eq!(StatusCategory::of(0), StatusCategory::Unknown);
        assert_eq!(StatusCategory::of(101), StatusCategory::Informational);
        assert_eq!(StatusCategory::of(204), StatusCategory::Success);
        assert_eq!(StatusCategory::of(304), StatusCategory::Redirection);
        assert_eq!(StatusCategory::of(404), StatusCategory::ClientError);
        assert_eq!(StatusCategory::of(503), StatusCategory::ServerError);
    }

    #[test]
    fn ok_requires_200_and_not_canceled() {
        assert!(Response::new(200).is_ok());
        assert!(!Response::new(206).is_ok());
        assert!(!Response::new(200).with_canceled(true).is_ok());
    }

    #[test]
    fn cache_record_becomes_successful_response() {
        let record = CacheRecord {
            data: Bytes::from_static(b"cached"),
            headers: Headers::new()
                .with("Content-Type", "image/jpeg")
                .with("Last-Modified", "Sun, 06 Nov 1994 08:49:37 GMT"),
            last_modified: SystemTime::now(),
        };

        let response = Response::from_cache_record(record);
        assert!(response.is_ok());
        assert!(response.from_cache());
        assert_eq!(response.mime_type(), "image/jpeg");
        assert_eq!(response.part_as_string(0), "cached");
        assert_eq!(
            response.last_modified(),
            parse_http_date("Sun, 06 Nov 1994 08:49:37 GMT")
        );
        assert_eq!(
            response.headers_as_map().get("content-type").map(String::as_str),
            Some("image/jpeg")
        );
    }

    #[test]
    fn missing_part_reads_as_empty() {
        assert_eq!(Response::new(200).part_as_string(3), "");
    }

    #[test]
    fn failures_have_no_status() {
        let response = Response::timed_out("operation timed out");
        assert_eq!(response.status(), 0);
        assert!(response.is_timed_out());
        assert_eq!(response.message(), "operation timed out");
    }
}
