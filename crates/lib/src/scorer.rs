//! Edit-distance scoring of extracted values against reference values.

use crate::schema::FieldValue;

/// The Levenshtein distance between two strings, counted in Unicode scalar values.
///
/// Zero iff the strings are equal.
pub fn score(produced: &str, reference: &str) -> usize {
    strsim::levenshtein(produced, reference)
}

/// Scores an extracted value, treating an absent value or missing reference as `""`.
pub fn score_values(produced: Option<&FieldValue>, reference: Option<&str>) -> usize {
    score(value_text(produced), reference.unwrap_or_default())
}

/// Normalized similarity in `[0, 1]`; `1.0` for identical strings, including two empty ones.
pub fn similarity(produced: &str, reference: &str) -> f64 {
    strsim::normalized_levenshtein(produced, reference)
}

pub fn similarity_values(produced: Option<&FieldValue>, reference: Option<&str>) -> f64 {
    similarity(value_text(produced), reference.unwrap_or_default())
}

fn value_text(value: Option<&FieldValue>) -> &str {
    value.and_then(FieldValue::as_str).unwrap_or_default()
}
