//! Text helpers for codes and display strings.

use crate::error::ValidationError;

/// Trim and uppercase a catalog code, rejecting blank input.
pub fn normalize_code(raw: &str) -> Result<String, ValidationError> {
    let code = raw.trim().to_uppercase();
    if code.is_empty() {
        return Err(ValidationError::Required("code"));
    }
    Ok(code)
}

/// Trim a required free-text field, rejecting blank input.
pub fn required(field: &'static str, raw: &str) -> Result<String, ValidationError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ValidationError::Required(field));
    }
    Ok(value.to_string())
}

/// Trim an optional field, mapping blank to `None`.
pub fn optional(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Shorten `text` to at most `max` characters, ending with `suffix` when cut.
pub fn truncate(text: &str, max: usize, suffix: &str) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(suffix.chars().count());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(suffix);
    out
}

/// Case-insensitive substring match.
pub fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_trimmed_and_uppercased() {
        assert_eq!(normalize_code("  cat-01 ").unwrap(), "CAT-01");
        assert!(matches!(normalize_code("   "), Err(ValidationError::Required("code"))));
    }

    #[test]
    fn optional_blank_becomes_none() {
        assert_eq!(optional(Some("  ".into())), None);
        assert_eq!(optional(Some(" x ".into())), Some("x".into()));
        assert_eq!(optional(None), None);
    }

    #[test]
    fn truncate_keeps_short_text() {
        assert_eq!(truncate("short", 100, "..."), "short");
        assert_eq!(truncate("exactly10!", 10, "..."), "exactly10!");
    }

    #[test]
    fn truncate_counts_suffix_within_limit() {
        let out = truncate("Proyector multimedia Epson", 12, "...");
        assert_eq!(out, "Proyector...");
        assert_eq!(out.chars().count(), 12);
    }

    #[test]
    fn truncate_is_char_boundary_safe() {
        assert_eq!(truncate("añoñoñoño", 5, "…"), "añoñ…");
    }

    #[test]
    fn contains_ignores_case() {
        assert!(contains_ci("Laboratorio de Ciencias", "CIENCIAS"));
        assert!(!contains_ci("Bodega central", "norte"));
    }
}
