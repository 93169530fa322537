//! Literal sanitization for filter-language string literals.
//!
//! The filter language uses `*` as its wildcard while the storage layer matches patterns with
//! SQL `LIKE` semantics (`%` wildcard, `\` escape character). A literal `*` is written `\*`.

/// Escape character understood by the storage layer's pattern matching.
pub const LIKE_ESCAPE: char = '\\';

/// Storage-layer wildcard.
pub const STORAGE_WILDCARD: char = '%';

const ESCAPED_WILDCARD: &str = "\\*";
const ESCAPED_WILDCARD_PLACEHOLDER: &str = "\u{0}ESCAPED_WILDCARD\u{0}";

/// Rewrites filter-language wildcards into storage-layer ones.
///
/// Steps run in this exact order: `%` becomes `\%`, `\*` is parked on a placeholder, every
/// remaining `*` becomes `%`, the placeholder is restored as a plain `*`.
pub fn escape_wildcards(value: &str) -> String {
    let value = value.replace(STORAGE_WILDCARD, "\\%");
    let value = value.replace(ESCAPED_WILDCARD, ESCAPED_WILDCARD_PLACEHOLDER);
    let value = value.replace('*', "%");
    value.replace(ESCAPED_WILDCARD_PLACEHOLDER, "*")
}

/// Sanitizes a raw string literal (quotes included) as written in a filter.
pub fn sanitize_literal(raw: &str) -> String {
    strip_quotes(&escape_wildcards(raw)).to_string()
}

/// Whether a sanitized literal must be matched as a pattern rather than compared for equality.
pub fn has_wildcard(sanitized: &str) -> bool {
    sanitized.contains(STORAGE_WILDCARD)
}

fn strip_quotes(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}
