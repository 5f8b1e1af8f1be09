//! Helpers for sanitizing paths and names.
//!
//! Span fields only ever carry file names, and user supplied names are
//! reduced to a safe character set before they touch the filesystem.

use std::path::Path;

/// Returns only the filename component of a path (no directory).
///
/// Safe for span fields: reveals the file name without exposing the full path.
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Replaces every character outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Sanitizes a caller supplied output filename and forces `extension`.
///
/// Directory components are discarded, so the result is always a bare name.
/// `extension` is given without the leading dot.
pub fn sanitize_output_filename(name: &str, extension: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let mut sanitized = sanitize_filename(base);

    let trimmed = sanitized.trim_matches('.');
    if trimmed.is_empty() {
        sanitized = "output".to_string();
    }

    let suffix = format!(".{}", extension.to_ascii_lowercase());
    if !sanitized.to_ascii_lowercase().ends_with(&suffix) {
        sanitized.push_str(&suffix);
    }
    sanitized
}

/// Reduces an operation type tag to something usable inside a file name.
pub fn sanitize_operation_tag(tag: &str) -> String {
    let cleaned: String = tag
        .chars()
        .take(48)
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "operation".to_string()
    } else {
        cleaned
    }
}
