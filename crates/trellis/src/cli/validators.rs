//! CLI input validation functions.
//!
//! These validators are used by clap's `value_parser` attribute to validate
//! user input at parse time, providing immediate feedback for invalid values.

use crate::commands::init::{BACKEND_MEMORY, BACKEND_SQLITE};
use crate::domain::validate_id;

/// Maximum length of a requirement name.
pub const MAX_NAME_LENGTH: usize = 200;

/// Validate a requirement id.
///
/// Delegates to the domain validator so the CLI and the storage layer agree
/// on what an id may look like.
pub fn validate_requirement_id(s: &str) -> Result<String, String> {
    let trimmed = s.trim();
    validate_id(trimmed).map_err(|e| format!("Requirement {e}"))?;
    Ok(trimmed.to_string())
}

/// Validate a project (scope) id. Same rules as requirement ids.
pub fn validate_project(s: &str) -> Result<String, String> {
    let trimmed = s.trim();
    validate_id(trimmed).map_err(|e| format!("Project {e}"))?;
    Ok(trimmed.to_string())
}

/// Validate a storage backend name.
pub fn validate_backend(s: &str) -> Result<String, String> {
    let trimmed = s.trim().to_ascii_lowercase();
    match trimmed.as_str() {
        BACKEND_SQLITE | BACKEND_MEMORY => Ok(trimmed),
        other => Err(format!(
            "Unknown backend '{other}'. Expected '{BACKEND_SQLITE}' or '{BACKEND_MEMORY}'"
        )),
    }
}

/// Validate a requirement name.
///
/// Names are single-line and at most [`MAX_NAME_LENGTH`] characters.
pub fn validate_name(s: &str) -> Result<String, String> {
    let s = s.trim();

    if s.is_empty() {
        return Err("Name cannot be empty".to_string());
    }

    let len = s.chars().count();
    if len > MAX_NAME_LENGTH {
        return Err(format!(
            "Name cannot exceed {MAX_NAME_LENGTH} characters, got {len} characters"
        ));
    }

    if s.contains('\n') || s.contains('\r') {
        return Err("Name cannot contain newline characters".to_string());
    }

    if let Some(pos) = s.chars().position(|c| is_disallowed_control(c, false)) {
        return Err(format!(
            "Name contains invalid control character at position {pos}"
        ));
    }

    Ok(s.to_string())
}

/// Validate a description. Multi-line text is fine; other control characters are not.
pub fn validate_description(s: &str) -> Result<String, String> {
    if let Some(pos) = s.chars().position(|c| is_disallowed_control(c, true)) {
        return Err(format!(
            "Description contains invalid control character at position {pos}"
        ));
    }
    Ok(s.to_string())
}

/// C0 (except tab) and C1 control characters. Line breaks pass when
/// `allow_newlines` is set.
fn is_disallowed_control(c: char, allow_newlines: bool) -> bool {
    let code = c as u32;
    if c == '\t' || (allow_newlines && (c == '\n' || c == '\r')) {
        return false;
    }
    code < 0x20 || (0x7F..=0x9F).contains(&code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("SYS-1", "SYS-1")]
    #[case("  SW-12 ", "SW-12")]
    #[case("req.3.1", "req.3.1")]
    fn test_valid_requirement_ids(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(validate_requirement_id(input).unwrap(), expected);
    }

    #[rstest]
    #[case("", "empty")]
    #[case("A B", "whitespace")]
    #[case("A/B", "'/'")]
    fn test_invalid_requirement_ids(#[case] input: &str, #[case] expected: &str) {
        let err = validate_requirement_id(input).unwrap_err();
        assert!(err.starts_with("Requirement id"), "{err}");
        assert!(err.contains(expected), "{err}");
    }

    #[test]
    fn test_project_uses_same_rules() {
        assert_eq!(validate_project("portal").unwrap(), "portal");
        assert!(validate_project("my project").is_err());
    }

    #[rstest]
    #[case("sqlite", "sqlite")]
    #[case("MEMORY", "memory")]
    fn test_valid_backends(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(validate_backend(input).unwrap(), expected);
    }

    #[test]
    fn test_unknown_backend() {
        assert!(validate_backend("postgres").unwrap_err().contains("Unknown backend"));
    }

    #[test]
    fn test_name_rules() {
        assert_eq!(validate_name("  Login page ").unwrap(), "Login page");
        assert!(validate_name("").is_err());
        assert!(validate_name("a\u{0007}b").is_err());
        assert!(validate_name(&"x".repeat(MAX_NAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_description_allows_newlines_only() {
        assert!(validate_description("line one\nline two\r\n\tindented").is_ok());
        assert!(validate_description("bell\u{0007}").is_err());
    }
}
