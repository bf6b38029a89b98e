//! Search utilities for the conversation list filter.
//!
//! Matching is a case-insensitive substring test against the partner's display name.

/// Normalize raw search-bar text into a query.
///
/// Whitespace is part of the query. Returns `None` only for empty text, meaning no filtering.
///
/// # Examples
/// - "Jo" -> Some("jo")
/// - " Jo" -> Some(" jo")
/// - "" -> None
pub fn normalize_query(text: &str) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text.to_lowercase())
    }
}

/// Check if a name contains an already-normalized query (case-insensitive).
/// An absent name never matches.
pub fn name_matches(name: Option<&str>, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }
    match name {
        Some(name) => name.to_lowercase().contains(query),
        None => false,
    }
}
