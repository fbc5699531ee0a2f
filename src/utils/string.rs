//! String utilities
//!
//! Contains helper functions for safe string manipulation.

/// Number of leading characters of a key left visible by `mask_key`
const VISIBLE_KEY_CHARS: usize = 4;

/// Safely truncate a string at a character boundary
///
/// # Example
/// ```
/// use client_pool::utils::truncate_str;
///
/// let text = "Hello, 世界!";
/// assert_eq!(truncate_str(text, 8), "Hello, 世");
/// assert_eq!(truncate_str(text, 100), "Hello, 世界!");
/// ```
pub fn truncate_str(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Mask an API key for logging, keeping only a short prefix
///
/// Keys too short to leave anything hidden are masked completely.
///
/// # Example
/// ```
/// use client_pool::utils::mask_key;
///
/// assert_eq!(mask_key("sk-1234567890"), "sk-1***");
/// assert_eq!(mask_key("short"), "***");
/// ```
pub fn mask_key(key: &str) -> String {
    if key.chars().count() <= VISIBLE_KEY_CHARS * 2 {
        return "***".to_string();
    }
    format!("{}***", truncate_str(key, VISIBLE_KEY_CHARS))
}
