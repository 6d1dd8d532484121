//! Input validation rules shared by the CLI and the credential service.

use crate::error::{AppError, AppResult};

pub const BUCKET_NAME_RULES: &str =
    "Must be 3-63 characters, lowercase letters, numbers, and hyphens only";

fn is_lower_alnum(c: u8) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit()
}

/// S3-style bucket naming: 3-63 characters, lowercase letters, digits and
/// single hyphens, starting and ending with a letter or digit.
pub fn is_valid_bucket_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    if bytes.len() < 3 || bytes.len() > 63 {
        return false;
    }
    if !is_lower_alnum(bytes[0]) || !is_lower_alnum(bytes[bytes.len() - 1]) {
        return false;
    }
    bytes
        .iter()
        .all(|&c| is_lower_alnum(c) || c == b'-')
        && !name.contains("--")
}

pub fn validate_bucket_name(name: &str) -> AppResult<()> {
    if is_valid_bucket_name(name) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "Invalid bucket name. {}",
            BUCKET_NAME_RULES
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_valid_names() {
        for name in ["my-bucket-1", "abc", "user-42-abcdefgh", "0a0"] {
            assert!(is_valid_bucket_name(name), "{}", name);
        }
        assert!(is_valid_bucket_name(&"a".repeat(63)));
    }

    #[test]
    fn test_rejects_invalid_names() {
        for name in ["ab", "My-Bucket", "a--b", "-abc", "abc-", "a_b_c", "bücket", ""] {
            assert!(!is_valid_bucket_name(name), "{}", name);
        }
        assert!(!is_valid_bucket_name(&"a".repeat(64)));
    }

    #[test]
    fn test_validate_returns_validation_error() {
        assert!(matches!(
            validate_bucket_name("ab"),
            Err(AppError::Validation(_))
        ));
        assert!(validate_bucket_name("my-bucket-1").is_ok());
    }
}
