//! Locale-aware string ordering.
//!
//! Strings are ordered by a key that folds case and diacritics, so
//! "de Vicente" sorts before "Zhu" and "Émile" next to "Emile". Ties on the
//! key fall back to the raw strings.

use std::cmp::Ordering;

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Case- and accent-folded key for `s`.
pub fn collation_key(s: &str) -> String {
    s.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Compare two strings by collation key, then by raw value.
pub(crate) fn compare(a: &str, b: &str) -> Ordering {
    collation_key(a)
        .cmp(&collation_key(b))
        .then_with(|| a.cmp(b))
}
