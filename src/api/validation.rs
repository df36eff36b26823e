//! Input validation for registration and practice submissions.
//!
//! Validation runs at the boundary, before any mutation. For collecting
//! multiple field errors into one response, use `ValidationErrorBuilder`
//! from the `error` module.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Characters allowed in a username.
    static ref USERNAME_CHARS_REGEX: Regex = Regex::new(r"^[A-Za-z0-9_-]+$").unwrap();

    /// RFC-shaped email syntax; deliverability beyond the shape is not
    /// checked here.
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$"
    ).unwrap();
}

/// Local parts that belong to mailboxes, not people.
const ROLE_BASED_LOCAL_PARTS: [&str; 4] = ["support", "info", "admin", "contact"];

/// Known throwaway-address providers.
const DISPOSABLE_DOMAINS: [&str; 3] = ["mailinator.com", "tempmail.com", "10minutemail.com"];

/// Validate a username: 3-30 characters, alphanumeric plus hyphen and
/// underscore, no leading/trailing/consecutive special characters.
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.len() < 3 {
        return Err("Username must be at least 3 characters long".to_string());
    }
    if username.len() > 30 {
        return Err("Username cannot exceed 30 characters".to_string());
    }
    if username.contains(' ') {
        return Err("Username cannot contain spaces".to_string());
    }
    if !USERNAME_CHARS_REGEX.is_match(username) {
        return Err(
            "Username can only contain letters, numbers, hyphens, and underscores".to_string(),
        );
    }
    if username.contains("--") || username.contains("__") {
        return Err("Username cannot contain consecutive hyphens or underscores".to_string());
    }
    let first = username.chars().next().unwrap();
    let last = username.chars().last().unwrap();
    if matches!(first, '-' | '_') || matches!(last, '-' | '_') {
        return Err("Username cannot start or end with hyphens or underscores".to_string());
    }
    Ok(())
}

/// Validate an email address and return it with the domain lowercased.
/// Rejects role-based local parts and disposable domains regardless of
/// case.
pub fn validate_email(email: &str) -> Result<String, String> {
    if !EMAIL_REGEX.is_match(email) {
        return Err("Enter a valid email address".to_string());
    }

    // The regex guarantees exactly one '@'.
    let (local, domain) = email.rsplit_once('@').unwrap();
    let domain = domain.to_lowercase();

    if ROLE_BASED_LOCAL_PARTS.contains(&local.to_lowercase().as_str()) {
        return Err("Registration using role-based email addresses is not allowed".to_string());
    }
    if DISPOSABLE_DOMAINS.contains(&domain.as_str()) {
        return Err("Disposable email addresses are not allowed".to_string());
    }

    Ok(format!("{}@{}", local, domain))
}

/// Validate a recorded practice session's measurements.
pub fn validate_session(time_taken_ms: i64, speed: f64, accuracy: f64) -> Result<(), String> {
    if time_taken_ms <= 0 {
        return Err("time_taken must be a positive number of milliseconds".to_string());
    }
    if !speed.is_finite() || speed <= 0.0 {
        return Err("speed must be a positive number".to_string());
    }
    if !accuracy.is_finite() || !(0.0..=100.0).contains(&accuracy) {
        return Err("accuracy must be between 0 and 100".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_username_accepts_reasonable_names() {
        assert!(validate_username("ada").is_ok());
        assert!(validate_username("speed_demon-99").is_ok());
        assert!(validate_username("a2c").is_ok());
        assert!(validate_username(&"x".repeat(30)).is_ok());
    }

    #[test]
    fn test_validate_username_length_bounds() {
        assert!(validate_username("ab").is_err());
        assert!(validate_username(&"x".repeat(31)).is_err());
    }

    #[test]
    fn test_validate_username_rejects_spaces() {
        assert!(validate_username("ada lovelace").is_err());
        assert!(validate_username(" ada").is_err());
    }

    #[test]
    fn test_validate_username_rejects_edge_special_chars() {
        assert!(validate_username("-ada").is_err());
        assert!(validate_username("ada-").is_err());
        assert!(validate_username("_ada").is_err());
        assert!(validate_username("ada_").is_err());
    }

    #[test]
    fn test_validate_username_rejects_consecutive_special_chars() {
        assert!(validate_username("ada--b").is_err());
        assert!(validate_username("ada__b").is_err());
        assert!(validate_username("ada-_b").is_ok());
    }

    #[test]
    fn test_validate_username_rejects_other_characters() {
        assert!(validate_username("ada!").is_err());
        assert!(validate_username("ada.b").is_err());
        assert!(validate_username("ada@b").is_err());
    }

    #[test]
    fn test_validate_email_syntax() {
        assert!(validate_email("ada@example.com").is_ok());
        assert!(validate_email("a.b+tag@sub.example.co.uk").is_ok());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("missing@tld").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("spaces in@example.com").is_err());
    }

    #[test]
    fn test_validate_email_rejects_role_based_local_parts() {
        assert!(validate_email("admin@example.com").is_err());
        assert!(validate_email("Support@example.com").is_err());
        assert!(validate_email("INFO@example.com").is_err());
        assert!(validate_email("contact@example.com").is_err());
        // Role word embedded in a longer local part is fine.
        assert!(validate_email("administrator@example.com").is_ok());
    }

    #[test]
    fn test_validate_email_rejects_disposable_domains() {
        assert!(validate_email("ada@mailinator.com").is_err());
        assert!(validate_email("ada@Mailinator.COM").is_err());
        assert!(validate_email("ada@tempmail.com").is_err());
        assert!(validate_email("ada@10minutemail.com").is_err());
    }

    #[test]
    fn test_validate_email_normalizes_domain_case() {
        assert_eq!(
            validate_email("Ada@Example.COM").unwrap(),
            "Ada@example.com"
        );
    }

    #[test]
    fn test_validate_session_bounds() {
        assert!(validate_session(60_000, 55.0, 96.5).is_ok());
        assert!(validate_session(0, 55.0, 96.5).is_err());
        assert!(validate_session(-10, 55.0, 96.5).is_err());
        assert!(validate_session(60_000, 0.0, 96.5).is_err());
        assert!(validate_session(60_000, -5.0, 96.5).is_err());
        assert!(validate_session(60_000, 55.0, 100.5).is_err());
        assert!(validate_session(60_000, 55.0, -0.1).is_err());
        assert!(validate_session(60_000, f64::NAN, 96.5).is_err());
        assert!(validate_session(60_000, 55.0, 100.0).is_ok());
        assert!(validate_session(60_000, 55.0, 0.0).is_ok());
    }
}
