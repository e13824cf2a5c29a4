//! Input rules for user-supplied account fields.

use regex::Regex;
use std::sync::LazyLock;

use crate::password::MIN_PASSWORD_LENGTH;

pub const MIN_USERNAME_LENGTH: usize = 3;
pub const MAX_USERNAME_LENGTH: usize = 30;

// Word characters, optionally joined by single '.' or '-', then a 2-3 letter TLD.
static EMAIL_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_]+([.-]?[A-Za-z0-9_]+)*@[A-Za-z0-9_]+([.-]?[A-Za-z0-9_]+)*(\.[A-Za-z0-9_]{2,3})+$")
        .ok()
});

/// Trim a username and check its length. Returns the trimmed value.
pub fn normalize_username(username: &str) -> Result<&str, &'static str> {
    let username = username.trim();
    let len = username.chars().count();
    if len < MIN_USERNAME_LENGTH {
        return Err("Username must be at least 3 characters");
    }
    if len > MAX_USERNAME_LENGTH {
        return Err("Username cannot be longer than 30 characters");
    }
    Ok(username)
}

/// Trim and lower-case an email, then check its format.
pub fn normalize_email(email: &str) -> Result<String, &'static str> {
    let email = email.trim().to_lowercase();
    let valid = EMAIL_RE.as_ref().is_some_and(|re| re.is_match(&email));
    if !valid {
        return Err("Invalid email format");
    }
    Ok(email)
}

pub fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err("Password must be at least 6 characters");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_bounds() {
        assert!(normalize_username("ab").is_err());
        assert_eq!(normalize_username("abc"), Ok("abc"));
        assert_eq!(normalize_username(&"a".repeat(30)).map(str::len), Ok(30));
        assert!(normalize_username(&"a".repeat(31)).is_err());
    }

    #[test]
    fn test_username_is_trimmed_before_length_check() {
        assert_eq!(normalize_username("  bob  "), Ok("bob"));
        assert!(normalize_username("  ab  ").is_err());
    }

    #[test]
    fn test_email_is_case_folded() {
        assert_eq!(
            normalize_email("  U1@Example.COM "),
            Ok("u1@example.com".to_string())
        );
    }

    #[test]
    fn test_email_format() {
        for valid in ["u1@e.com", "first.last@mail.example.org", "a-b@c-d.io"] {
            assert!(normalize_email(valid).is_ok(), "{valid} should be valid");
        }
        for invalid in [
            "invalid-email",
            "@example.com",
            "user@",
            "user@example",
            "user@example.c",
            "user@example.comm",
            "us..er@example.com",
            "user name@example.com",
        ] {
            assert!(normalize_email(invalid).is_err(), "{invalid} should be invalid");
        }
    }

    #[test]
    fn test_password_length() {
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());
    }
}
