use std::time::Duration;

use crate::data::{FetchOptions, ProgressCallback, Request, Response};
use crate::error::Result;

/// Blocking HTTP GET capability.
///
/// A transport is owned by one worker at a time; it is `Send` so it can be
/// handed to a thread, but never shared between threads.
///
/// # Contract
///
/// `get` never fails: DNS errors, refused connections, timeouts and
/// cancellation are reported as a [`Response`] with status `0` and a
/// message. Implementations must
///
/// - apply the proxy from `options`, else their configured or environment
///   proxy,
/// - send basic-auth credentials registered for the request URL,
/// - stop reading once `progress` reports cancellation,
/// - fill in MIME type and last-modified time from the response headers,
/// - split `multipart/*` bodies into parts.
///
/// # Implementations
///
/// - [`crate::ReqwestTransport`]: production implementation using `reqwest`
/// - Scripted implementations for testing
pub trait Transport: Send {
    fn get(
        &self,
        request: &Request,
        options: &FetchOptions,
        progress: Option<&ProgressCallback>,
    ) -> Response;

    fn set_user_agent(&mut self, _user_agent: &str) -> Result<()> {
        Ok(())
    }

    fn set_timeout(&mut self, _timeout: Option<Duration>) -> Result<()> {
        Ok(())
    }

    fn set_connect_timeout(&mut self, _timeout: Option<Duration>) -> Result<()> {
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn get(
        &self,
        request: &Request,
        options: &FetchOptions,
        progress: Option<&ProgressCallback>,
    ) -> Response {
        (**self).get(request, options, progress)
    }

    fn set_user_agent(&mut self, user_agent: &str) -> Result<()> {
        (**self).set_user_agent(user_agent)
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        (**self).set_timeout(timeout)
    }

    fn set_connect_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        (**self).set_connect_timeout(timeout)
    }
}
