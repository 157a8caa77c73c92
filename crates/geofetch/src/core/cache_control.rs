use geofetch_cache::Headers;

/// Whether stored `cache-control` metadata demands revalidation on every use.
///
/// `no-cache` permits storing a response but not serving it unchecked.
pub fn requires_revalidation(headers: &Headers) -> bool {
    headers.get("cache-control").is_some_and(|value| {
        value.split(',').any(|directive| {
            let directive = directive.trim();
            directive.eq_ignore_ascii_case("no-cache")
                || directive
                    .get(..9)
                    .is_some_and(|head| head.eq_ignore_ascii_case("no-cache="))
        })
    })
}
