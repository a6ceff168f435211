//! Process-wide cache of anchored regex terminals
//!
//! Pattern terminals (Unicode classes and squashed choices) are matched at
//! one position only, so every pattern is compiled as `\A(?:pattern)` and run
//! against the input suffix. Parses run on their own threads, so compiled
//! patterns are shared across threads rather than cached per thread.

use hashbrown::HashMap;
use regex::Regex;
use std::sync::{Mutex, OnceLock, PoisonError};

// Keyed by the unanchored pattern source
static REGEX_CACHE: OnceLock<Mutex<HashMap<String, Regex>>> = OnceLock::new();

fn get_regex_cache() -> &'static Mutex<HashMap<String, Regex>> {
    REGEX_CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Compile `pattern` anchored at the start of the haystack, bypassing the cache
pub fn compile_anchored(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(r"\A(?:{})", pattern))
}

/// Get or compile an anchored pattern
///
/// # Returns
/// * `Some(Regex)` if the pattern is valid
/// * `None` if the pattern is invalid
#[inline]
pub fn get_or_compile(pattern: &str) -> Option<Regex> {
    let mut cache = get_regex_cache()
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if let Some(regex) = cache.get(pattern) {
        return Some(regex.clone());
    }

    let regex = compile_anchored(pattern).ok()?;
    cache.insert(pattern.to_string(), regex.clone());
    Some(regex)
}

/// Length of the anchored match of `pattern` at the start of `haystack`
///
/// Returns `Err(())` when the pattern does not compile.
#[inline]
pub(crate) fn match_len(pattern: &str, haystack: &str) -> Result<Option<usize>, ()> {
    let regex = get_or_compile(pattern).ok_or(())?;
    Ok(regex.find(haystack).map(|m| m.end()))
}

/// True when `pattern` has been compiled and cached
pub fn is_cached(pattern: &str) -> bool {
    get_regex_cache()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .contains_key(pattern)
}

/// Clear the regex cache
pub fn clear_cache() {
    get_regex_cache()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clear();
}

/// Get the number of cached patterns
pub fn cache_size() -> usize {
    get_regex_cache()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .len()
}
