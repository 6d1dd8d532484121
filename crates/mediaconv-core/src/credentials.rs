//! Credential token generation.
//!
//! Access keys mimic the AWS shape (`AKIA` + 16 base-32 characters), secrets
//! are 40 base-32 characters, and generated buckets are scoped to the user.

use data_encoding::BASE32;
use rand::Rng;

pub const ACCESS_KEY_PREFIX: &str = "AKIA";
pub const ACCESS_KEY_LEN: usize = 20;
pub const SECRET_KEY_LEN: usize = 40;

fn random_base32(byte_len: usize) -> String {
    let mut rng = rand::rng();
    let random_bytes: Vec<u8> = (0..byte_len).map(|_| rng.random()).collect();
    BASE32.encode(&random_bytes)
}

pub fn generate_access_key() -> String {
    // 15 bytes encode to 24 characters.
    let encoded = random_base32(15);
    format!("{}{}", ACCESS_KEY_PREFIX, &encoded[..16])
}

pub fn generate_secret_key() -> String {
    // 30 bytes encode to 48 characters.
    let encoded = random_base32(30);
    encoded[..SECRET_KEY_LEN].to_string()
}

pub fn generate_bucket_name(user_id: i64) -> String {
    let suffix = random_base32(6);
    format!("user-{}-{}", user_id, suffix[..8].to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::is_valid_bucket_name;

    fn is_base32(s: &str) -> bool {
        s.bytes()
            .all(|c| c.is_ascii_uppercase() || (b'2'..=b'7').contains(&c))
    }

    #[test]
    fn test_access_key_shape() {
        let key = generate_access_key();
        assert_eq!(key.len(), ACCESS_KEY_LEN);
        assert!(key.starts_with("AKIA"));
        assert!(is_base32(&key[4..]));
    }

    #[test]
    fn test_secret_key_shape() {
        let secret = generate_secret_key();
        assert_eq!(secret.len(), SECRET_KEY_LEN);
        assert!(is_base32(&secret));
        assert_ne!(secret, generate_secret_key());
    }

    #[test]
    fn test_generated_bucket_is_valid() {
        let bucket = generate_bucket_name(42);
        assert!(bucket.starts_with("user-42-"));
        assert_eq!(bucket.len(), "user-42-".len() + 8);
        assert!(is_valid_bucket_name(&bucket));
    }
}
