//! Cache key derivation for idempotent requests

use axum::http::Method;

/// Separator joining method, path, and token.
///
/// A raw newline can never appear in an HTTP method, a request path, or a
/// header value, so joining with it cannot make two distinct
/// `(method, path, token)` triples collide.
const SEPARATOR: char = '\n';

/// Derive the cache key for a `(method, path, token)` triple.
///
/// Returns `None` for an empty token: protection is opt-in, and a request
/// that carried no usable token is simply not protected.
#[must_use]
pub fn derive_key(method: &Method, path: &str, token: &str) -> Option<String> {
    if token.is_empty() {
        return None;
    }

    Some(format!("{method}{SEPARATOR}{path}{SEPARATOR}{token}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_triple_same_key() {
        let a = derive_key(&Method::POST, "/api/data/notes", "tok-1");
        let b = derive_key(&Method::POST, "/api/data/notes", "tok-1");
        assert_eq!(a, b);
        assert!(a.is_some());
    }

    #[test]
    fn test_any_component_changes_the_key() {
        let base = derive_key(&Method::POST, "/api/data/notes", "tok-1").unwrap();

        assert_ne!(
            base,
            derive_key(&Method::PUT, "/api/data/notes", "tok-1").unwrap()
        );
        assert_ne!(
            base,
            derive_key(&Method::POST, "/api/data/tags", "tok-1").unwrap()
        );
        assert_ne!(
            base,
            derive_key(&Method::POST, "/api/data/notes", "tok-2").unwrap()
        );
    }

    #[test]
    fn test_empty_token_yields_no_key() {
        assert_eq!(derive_key(&Method::POST, "/api/data/notes", ""), None);
    }

    #[test]
    fn test_punctuation_in_token_cannot_shift_boundaries() {
        // Tokens often carry ':' or '/'; none of these may collide with a
        // differently-split triple.
        let a = derive_key(&Method::POST, "/orders", "a:b").unwrap();
        let b = derive_key(&Method::POST, "/orders:a", "b").unwrap();
        assert_ne!(a, b);

        let c = derive_key(&Method::POST, "/orders/a", "b").unwrap();
        assert_ne!(a, c);
        assert_ne!(b, c);
    }

    #[test]
    fn test_token_with_spaces_is_distinct() {
        let a = derive_key(&Method::DELETE, "/x", "two words").unwrap();
        let b = derive_key(&Method::DELETE, "/x two", "words").unwrap();
        assert_ne!(a, b);
    }
}
