use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;

use geofetch_cache::Headers;

use crate::core::format_http_date;

/// A query parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Int(v) => write!(f, "{v}"),
            Param::Float(v) => write!(f, "{v}"),
            Param::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for Param {
    fn from(v: i64) -> Self {
        Param::Int(v)
    }
}

impl From<i32> for Param {
    fn from(v: i32) -> Self {
        Param::Int(v.into())
    }
}

impl From<u32> for Param {
    fn from(v: u32) -> Self {
        Param::Int(v.into())
    }
}

impl From<f64> for Param {
    fn from(v: f64) -> Self {
        Param::Float(v)
    }
}

impl From<&str> for Param {
    fn from(v: &str) -> Self {
        Param::Text(v.to_string())
    }
}

impl From<String> for Param {
    fn from(v: String) -> Self {
        Param::Text(v)
    }
}

/// An outgoing GET request.
///
/// Literal spaces in the URL are percent-encoded on construction. Query
/// parameters are appended in key order when the full URL is rendered.
///
/// # Examples
///
/// ```
/// use geofetch::Request;
///
/// let request = Request::new("http://tiles.example.com/wms?service=WMS")
///     .param("width", 256)
///     .param("layers", "base map")
///     .header("Accept", "image/png");
///
/// assert_eq!(
///     request.full_url(),
///     "http://tiles.example.com/wms?service=WMS&layers=base map&width=256"
/// );
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    url: String,
    params: BTreeMap<String, Param>,
    headers: Headers,
}

impl Request {
    pub fn new(url: impl AsRef<str>) -> Self {
        Self {
            url: url.as_ref().replace(' ', "%20"),
            params: BTreeMap::new(),
            headers: Headers::new(),
        }
    }

    /// The base URL, without parameters.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The URL with every parameter appended.
    pub fn full_url(&self) -> String {
        let mut full = self.url.clone();
        let mut separator = if self.url.contains('?') { '&' } else { '?' };
        for (name, value) in &self.params {
            full.push(separator);
            full.push_str(name);
            full.push('=');
            full.push_str(&value.to_string());
            separator = '&';
        }
        full
    }

    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<Param>) -> Self {
        self.set_param(name, value);
        self
    }

    pub fn set_param(&mut self, name: impl Into<String>, value: impl Into<Param>) {
        self.params.insert(name.into(), value.into());
    }

    pub fn params(&self) -> impl Iterator<Item = (&str, &Param)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn set_header(&mut self, name: impl AsRef<str>, value: impl AsRef<str>) {
        self.headers.insert(name, value);
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Make the request conditional on the resource having changed since `time`.
    #[must_use]
    pub fn with_last_modified(self, time: SystemTime) -> Self {
        self.header("If-Modified-Since", format_http_date(time))
    }
}
