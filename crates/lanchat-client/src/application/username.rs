//! Validation of the username typed at the prompt.
//!
//! The server accepts any UTF-8 username, including an empty one.  The
//! client is stricter so that every relayed line parses back unambiguously.

use lanchat_core::protocol::event::FIELD_DELIMITER;
use lanchat_core::SYSTEM_USERNAME;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UsernameError {
    #[error("username cannot be empty")]
    Empty,
    #[error("username cannot contain ':'")]
    ContainsDelimiter,
    #[error("username \"SERVER\" is reserved")]
    Reserved,
}

/// Trims `input` and checks it can be used as a username.
///
/// # Errors
///
/// Returns [`UsernameError`] describing why the name was refused.
pub fn validate_username(input: &str) -> Result<String, UsernameError> {
    let name = input.trim();
    if name.is_empty() {
        return Err(UsernameError::Empty);
    }
    if name.contains(FIELD_DELIMITER) {
        return Err(UsernameError::ContainsDelimiter);
    }
    if name == SYSTEM_USERNAME {
        return Err(UsernameError::Reserved);
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_name_is_trimmed() {
        assert_eq!(validate_username("  alice \n"), Ok("alice".to_string()));
    }

    #[test]
    fn test_blank_name_is_rejected() {
        assert_eq!(validate_username("   "), Err(UsernameError::Empty));
    }

    #[test]
    fn test_name_with_delimiter_is_rejected() {
        assert_eq!(
            validate_username("a:b"),
            Err(UsernameError::ContainsDelimiter)
        );
    }

    #[test]
    fn test_reserved_name_is_rejected() {
        assert_eq!(validate_username("SERVER"), Err(UsernameError::Reserved));
    }
}
