//! Fuzzy string scoring for catalog fields.
//!
//! A thin, stateless layer over Jaro-Winkler: both inputs are lower-cased
//! and trimmed before comparison, so the score is symmetric under case and
//! surrounding whitespace. Scores are always in `[0.0, 1.0]`.

use crate::models::Item;

/// Normalized Jaro-Winkler similarity between two strings.
///
/// Returns `1.0` for strings that are identical after normalization and
/// values near `0.0` for disjoint strings. If either input normalizes to
/// empty the similarity is defined as `0.0` (an empty string matches
/// nothing, including another empty string).
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    strsim::jaro_winkler(&a, &b)
}

/// Fuzzy score of an item against a query: the maximum of the per-field
/// similarities for title, brand, and description.
///
/// Max rather than average: a strong match on any single field counts
/// fully, so querying a bare brand name still surfaces the item.
pub fn item_similarity(query: &str, item: &Item) -> f64 {
    similarity(query, &item.title)
        .max(similarity(query, &item.brand))
        .max(similarity(query, &item.description))
}
