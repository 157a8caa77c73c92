use crate::data::{Response, ResultKind, StatusCategory};

/// A response's outcome and whether re-issuing it later may succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub kind: ResultKind,
    pub recoverable: bool,
}

/// Map a response onto the outcome taxonomy.
///
/// Checks run in order: cancellation, timeout, a cache-only miss, no status,
/// then the status code itself. Any `2xx` that was not canceled is
/// [`ResultKind::Ok`].
pub fn classify(response: &Response) -> Classification {
    let status = response.status();
    let kind = if response.is_canceled() {
        ResultKind::Canceled
    } else if response.is_timed_out() {
        ResultKind::Timeout
    } else if response.is_cache_miss() {
        ResultKind::NotFound
    } else if status == 0 {
        ResultKind::TransportFailure
    } else if response.category() == StatusCategory::Success {
        ResultKind::Ok
    } else {
        match status {
            404 => ResultKind::NotFound,
            304 => ResultKind::NotModified,
            401 | 403 => ResultKind::Unauthorized,
            _ if response.category() == StatusCategory::ServerError => ResultKind::ServerError,
            _ => ResultKind::UnknownError,
        }
    };

    Classification {
        kind,
        recoverable: is_recoverable(kind, status),
    }
}

/// Whether a failure of `kind` with HTTP `status` is worth retrying.
///
/// Server errors, timeouts and transport failures are. Unknown errors are
/// too, except client errors other than `408 Request Timeout` and
/// `429 Too Many Requests`.
pub fn is_recoverable(kind: ResultKind, status: u16) -> bool {
    match kind {
        ResultKind::ServerError | ResultKind::Timeout | ResultKind::TransportFailure => true,
        ResultKind::UnknownError => {
            StatusCategory::of(status) != StatusCategory::ClientError || matches!(status, 408 | 429)
        }
        _ => false,
    }
}
