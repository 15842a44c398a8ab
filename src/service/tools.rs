//! Value conversions shared by the schema models.
//!
//! OPNsense speaks strings almost everywhere: numbers, `"1"`/`"0"` flags and
//! empty strings for "unset". These helpers translate between that and the
//! typed, nullable attribute values kept in state.

use std::collections::BTreeSet;

// =========================================================================
// Ints
// =========================================================================

/// Parse a decimal string, falling back to `-1`.
pub fn string_to_int64(s: &str) -> i64 {
    s.parse().unwrap_or(-1)
}

/// Parse a decimal string, yielding null when it does not parse.
pub fn string_to_int64_null(s: &str) -> Option<i64> {
    s.parse().ok()
}

/// Format an integer, with `-1` meaning "unset" (empty string).
pub fn int64_to_string_negative(i: i64) -> String {
    if i == -1 {
        String::new()
    } else {
        i.to_string()
    }
}

// =========================================================================
// Bools
// =========================================================================

/// `true` → `"1"`, `false` → `"0"`.
pub fn bool_to_string(b: bool) -> String {
    if b { "1" } else { "0" }.to_string()
}

/// Only `"1"` is true.
pub fn string_to_bool(s: &str) -> bool {
    s == "1"
}

// =========================================================================
// Strings
// =========================================================================

/// Empty strings become null.
pub fn string_or_null(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

/// The string inside a nullable attribute, empty when null.
pub fn value_string(v: &Option<String>) -> String {
    v.clone().unwrap_or_default()
}

// =========================================================================
// Sets
// =========================================================================

/// Collect a string list into a set, dropping the empty padding entries
/// OPNsense puts into lists.
pub fn string_slice_to_set(values: &[String]) -> BTreeSet<String> {
    values
        .iter()
        .filter(|v| !v.is_empty())
        .cloned()
        .collect()
}

/// The members of a nullable set attribute, in sorted order.
pub fn set_to_string_slice(set: &Option<BTreeSet<String>>) -> Vec<String> {
    set.iter().flatten().cloned().collect()
}
