use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Phases of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchPhase {
    /// Waiting for the response head.
    #[default]
    Connecting,

    /// Reading the body.
    Downloading,

    Completed,
}

impl fmt::Display for FetchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchPhase::Connecting => write!(f, "Connecting"),
            FetchPhase::Downloading => write!(f, "Downloading"),
            FetchPhase::Completed => write!(f, "Completed"),
        }
    }
}

/// A transfer progress snapshot passed to reporters.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub phase: FetchPhase,

    pub bytes_downloaded: u64,

    /// Total expected bytes, if the server sent a Content-Length.
    pub total_bytes: Option<u64>,
}

impl Progress {
    /// Percentage complete, or `None` if the total is unknown.
    #[must_use]
    pub fn percentage(&self) -> Option<f64> {
        self.total_bytes.map(|total| {
            if total == 0 {
                if self.is_completed() { 100.0 } else { 0.0 }
            } else {
                (self.bytes_downloaded as f64 / total as f64) * 100.0
            }
        })
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.phase == FetchPhase::Completed
    }
}

type Reporter = Arc<dyn Fn(&Progress) -> bool + Send + Sync>;

/// Progress reporting and cancellation shared between a caller and a fetch.
///
/// The transport polls [`ProgressCallback::report`] while reading the body
/// and aborts once the callback is canceled. On recoverable failures the
/// fetcher arms a retry delay and cancels the callback, so the layer that
/// owns it can re-issue the request later.
///
/// All methods take `&self`; wrap the callback in an `Arc` to cancel from
/// another thread.
#[derive(Default)]
pub struct ProgressCallback {
    canceled: AtomicBool,
    retry_delay: Mutex<Option<Duration>>,
    message: Mutex<String>,
    reporter: Option<Reporter>,
}

impl fmt::Debug for ProgressCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressCallback")
            .field("canceled", &self.is_canceled())
            .field("retry_delay", &self.retry_delay())
            .field("message", &self.message())
            .field("reporter", &self.reporter.as_ref().map(|_| "{ ... }"))
            .finish()
    }
}

impl ProgressCallback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `reporter` on every progress update. Returning `true` cancels.
    pub fn with_reporter<F>(reporter: F) -> Self
    where
        F: Fn(&Progress) -> bool + Send + Sync + 'static,
    {
        Self {
            reporter: Some(Arc::new(reporter)),
            ..Self::default()
        }
    }

    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    /// Forward `progress` to the reporter. Returns `true` if the transfer
    /// should stop.
    pub fn report(&self, progress: &Progress) -> bool {
        if let Some(reporter) = &self.reporter
            && reporter(progress)
        {
            self.cancel();
        }
        self.is_canceled()
    }

    /// Ask the owner to retry after `delay`.
    pub fn arm_retry(&self, delay: Duration) {
        *lock(&self.retry_delay) = Some(delay);
    }

    pub fn retry_delay(&self) -> Option<Duration> {
        *lock(&self.retry_delay)
    }

    pub fn set_message(&self, message: impl Into<String>) {
        *lock(&self.message) = message.into();
    }

    pub fn message(&self) -> String {
        lock(&self.message).clone()
    }

    /// Clear cancellation, retry hint and message before re-issuing.
    pub fn reset(&self) {
        self.canceled.store(false, Ordering::SeqCst);
        *lock(&self.retry_delay) = None;
        lock(&self.message).clear();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
