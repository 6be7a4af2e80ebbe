//! Small shared helpers

/// Sanitizes a title for use as a filesystem path component
///
/// Keeps alphanumerics, spaces, hyphens and underscores; everything else is
/// dropped. Trailing whitespace is trimmed so the result never ends with a
/// space. An input that sanitizes to nothing becomes "untitled".
pub fn sanitize_title(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '-' || *c == '_')
        .collect();
    let cleaned = cleaned.trim_end();
    if cleaned.is_empty() {
        "untitled".to_string()
    } else {
        cleaned.to_string()
    }
}
