//! Identifier validation for statements that cannot be parameterized.
//!
//! `CREATE DATABASE` and friends take the name as part of the statement text,
//! so the name is checked against a strict allow-list and rejected on the first
//! character that does not fit. Nothing is ever stripped or rewritten.

use crate::error::IdentifierError;

/// Longest identifier accepted (Postgres truncates at 63 bytes).
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Checks that `name` matches `[A-Za-z_][A-Za-z0-9_]*` and is not too long.
///
/// # Errors
///
/// Returns the first violation found.
pub fn validate_identifier(name: &str) -> Result<&str, IdentifierError> {
    if name.is_empty() {
        return Err(IdentifierError::Empty);
    }

    for (position, character) in name.chars().enumerate() {
        let allowed = if position == 0 {
            character.is_ascii_alphabetic() || character == '_'
        } else {
            character.is_ascii_alphanumeric() || character == '_'
        };
        if !allowed {
            return Err(IdentifierError::InvalidCharacter {
                name: name.to_string(),
                character,
                position,
            });
        }
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(IdentifierError::TooLong {
            name: name.to_string(),
            max: MAX_IDENTIFIER_LENGTH,
        });
    }

    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identifiers() {
        assert_eq!(validate_identifier("valid_name_1"), Ok("valid_name_1"));
        assert!(validate_identifier("_private").is_ok());
        assert!(validate_identifier("A").is_ok());
    }

    #[test]
    fn test_injection_rejected_at_first_bad_character() {
        let err = validate_identifier("users; DROP TABLE x").unwrap_err();
        assert_eq!(
            err,
            IdentifierError::InvalidCharacter {
                name: "users; DROP TABLE x".to_string(),
                character: ';',
                position: 5,
            }
        );
    }

    #[test]
    fn test_leading_digit_rejected() {
        let err = validate_identifier("1db").unwrap_err();
        assert!(matches!(
            err,
            IdentifierError::InvalidCharacter { position: 0, character: '1', .. }
        ));
    }

    #[test]
    fn test_quotes_and_unicode_rejected() {
        assert!(validate_identifier("db\"x").is_err());
        assert!(validate_identifier("dbé").is_err());
        assert!(validate_identifier("my-db").is_err());
    }

    #[test]
    fn test_empty_and_too_long() {
        assert_eq!(validate_identifier(""), Err(IdentifierError::Empty));
        let long = "a".repeat(64);
        assert!(matches!(
            validate_identifier(&long),
            Err(IdentifierError::TooLong { max: 63, .. })
        ));
        assert!(validate_identifier(&"a".repeat(63)).is_ok());
    }
}
