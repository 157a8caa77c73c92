use std::fmt;
use std::marker::PhantomData;
use std::string::FromUtf8Error;

use serde::de::DeserializeOwned;

/// Turns a fetched body into a typed value.
pub trait Decoder {
    type Output;
    type Error: fmt::Display;

    /// Whether this decoder understands content of `mime_type` fetched from `url`.
    fn accepts(&self, mime_type: &str, url: &str) -> bool;

    fn decode(&self, data: &[u8]) -> Result<Self::Output, Self::Error>;
}

/// UTF-8 text of any content type.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextDecoder;

impl Decoder for TextDecoder {
    type Output = String;
    type Error = FromUtf8Error;

    fn accepts(&self, _mime_type: &str, _url: &str) -> bool {
        true
    }

    fn decode(&self, data: &[u8]) -> Result<String, FromUtf8Error> {
        String::from_utf8(data.to_vec())
    }
}

/// JSON documents deserialized into `T`.
///
/// Accepts `*json` content types, URLs ending in `.json`, and responses
/// without a content type.
pub struct JsonDecoder<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonDecoder<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for JsonDecoder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("JsonDecoder")
    }
}

impl<T: DeserializeOwned> Decoder for JsonDecoder<T> {
    type Output = T;
    type Error = serde_json::Error;

    fn accepts(&self, mime_type: &str, url: &str) -> bool {
        let essence = mime_type.split(';').next().unwrap_or_default().trim();
        essence.is_empty()
            || essence.to_ascii_lowercase().ends_with("json")
            || url.split(['?', '#']).next().unwrap_or_default().ends_with(".json")
    }

    fn decode(&self, data: &[u8]) -> Result<T, serde_json::Error> {
        serde_json::from_slice(data)
    }
}
