//! Canonical query-URL derivation.
//!
//! The cache key for a raw user query is the thesis site's search URL for
//! it: the query's whitespace-separated words joined with `+` between a
//! fixed head and tail. The derivation is deterministic, so identical
//! queries (up to whitespace) always map to the same key and repeat
//! requests hit the corpus cache.

use crate::error::{Result, RetrievalError};

/// Build the canonical search URL for a raw query.
///
/// Fails with a `Schema` error when the query contains no words at all:
/// an empty query can never match a thesis and must not create a cache
/// entry.
pub fn url_for_query(raw_query: &str, head: &str, tail: &str) -> Result<String> {
    let words: Vec<&str> = raw_query.split_whitespace().collect();
    if words.is_empty() {
        return Err(RetrievalError::Schema(
            "query is empty, no theses can be found".into(),
        ));
    }
    Ok(format!("{}{}{}", head, words.join("+"), tail))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEAD: &str = "https://theses.example/?q=";
    const TAIL: &str = "&status=soutenue";

    #[test]
    fn test_words_joined_with_plus() {
        let url = url_for_query("machine learning theses", HEAD, TAIL).unwrap();
        assert_eq!(
            url,
            "https://theses.example/?q=machine+learning+theses&status=soutenue"
        );
    }

    #[test]
    fn test_whitespace_normalization_is_idempotent() {
        let a = url_for_query("deep   learning", HEAD, TAIL).unwrap();
        let b = url_for_query("  deep learning  ", HEAD, TAIL).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_distinct_queries_get_distinct_keys() {
        let a = url_for_query("graph theory", HEAD, TAIL).unwrap();
        let b = url_for_query("graph theories", HEAD, TAIL).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_empty_query_is_rejected() {
        let err = url_for_query("   ", HEAD, TAIL).unwrap_err();
        assert!(matches!(err, RetrievalError::Schema(_)));
    }
}
