//! Path canonicalization and sensitive-read classification.
//!
//! The backend routes everything with a trailing slash; requests without one
//! get a redirect that drops the POST body, so the client normalizes before
//! dispatch. Classification decides which GETs carry the anti-forgery token.

/// Reads against these path fragments carry the anti-forgery token even
/// though GETs are normally exempt.
const SENSITIVE_FRAGMENTS: [&str; 4] = ["stats", "users", "cart", "orders"];

/// Appends a trailing slash to the path portion, preserving any query string.
pub fn canonicalize(path: &str) -> String {
    let (before, query) = match path.split_once('?') {
        Some((before, query)) => (before, Some(query)),
        None => (path, None),
    };
    let mut canonical = String::with_capacity(path.len() + 1);
    canonical.push_str(before);
    if !before.ends_with('/') {
        canonical.push('/');
    }
    if let Some(query) = query {
        canonical.push('?');
        canonical.push_str(query);
    }
    canonical
}

/// True when a read-only request still needs the anti-forgery token.
/// Matches on the path only; query strings never reclassify a request.
pub fn is_sensitive_read(path: &str) -> bool {
    let path = path.split('?').next().unwrap_or(path);
    SENSITIVE_FRAGMENTS
        .iter()
        .any(|fragment| path.contains(fragment))
}
