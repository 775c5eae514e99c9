//! Filename sanitization.

/// Map an arbitrary string to a filesystem-safe string.
///
/// Retains only letters, digits, `_`, `-`, `.`, and space, in original order;
/// every other character (including path separators) is dropped, not replaced.
/// Distinct inputs that differ only in disallowed characters can therefore
/// sanitize to the same output, and a later write silently overwrites an
/// earlier one. Known trade-off of the naming scheme.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ' '))
        .collect()
}
