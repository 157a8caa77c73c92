use url::Url;

/// Cache key for a request URL.
///
/// Parsable URLs are normalized: scheme and host are lower-cased, default
/// ports and fragments are dropped. Anything else is used as given.
pub fn cache_key(url: &str) -> String {
    match Url::parse(url.trim()) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.into()
        }
        Err(_) => url.trim().to_string(),
    }
}
