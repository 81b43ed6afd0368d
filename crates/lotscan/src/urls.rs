//! Listing URL resolution and normalization.

use url::Url;

/// Resolve a possibly-relative listing link against a marketplace origin.
///
/// Protocol-relative links get `https:`, bare `www.` hosts get `https://`,
/// and anything else not already absolute is treated as a path from the
/// origin root.
pub fn absolutize(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    if href.starts_with("//") {
        return Some(format!("https:{href}"));
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    if href.starts_with("www.") {
        return Some(format!("https://{href}"));
    }

    let base = Url::parse(base).ok()?;
    let joined = if href.starts_with('/') {
        base.join(href)
    } else {
        base.join(&format!("/{href}"))
    };
    joined.ok().map(|u| u.to_string())
}

/// Strip query string and fragment, leaving scheme, host and path.
///
/// This is the deduplication identity of a listing.
pub fn normalize(url: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            parsed.set_fragment(None);
            Some(parsed.to_string())
        }
        Err(_) => url
            .split(['?', '#'])
            .next()
            .filter(|s| !s.is_empty())
            .map(str::to_string),
    }
}
