//! Deployment identity generation
//!
//! Ids are short, human-shareable strings drawn from the operating system's
//! secure random source. Bytes are mapped onto the charset by modulo
//! reduction, so characters are unpredictable but not perfectly uniform for
//! charsets whose size is not a power of two. Do not use these as secrets.

use rand::RngCore;
use rand::rngs::OsRng;
use thiserror::Error;

/// Charset used for deployment ids (lowercase so ids are valid DNS labels)
pub const DEFAULT_CHARSET: &str = "123456789qwertyuiopasdfghjklzxcvbnm";

/// Length of generated deployment ids
pub const DEFAULT_LENGTH: usize = 10;

/// Maximum length of a DNS label, and therefore of a servable id
pub const MAX_ID_LENGTH: usize = 63;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("invalid argument: length must be a positive integer")]
    InvalidLength,

    #[error("invalid argument: charset must not be empty")]
    EmptyCharset,
}

/// Generates `length` characters, each picked from `charset`
pub fn generate(length: usize, charset: &str) -> Result<String, IdError> {
    if length == 0 {
        return Err(IdError::InvalidLength);
    }

    let chars: Vec<char> = charset.chars().collect();
    if chars.is_empty() {
        return Err(IdError::EmptyCharset);
    }

    let mut bytes = vec![0u8; length];
    OsRng.fill_bytes(&mut bytes);

    Ok(bytes
        .iter()
        .map(|b| chars[*b as usize % chars.len()])
        .collect())
}

/// Generates a deployment id with the default length and charset
pub fn generate_id() -> String {
    // Defaults are non-empty constants, so generation cannot fail.
    generate(DEFAULT_LENGTH, DEFAULT_CHARSET).unwrap_or_default()
}

/// Checks that `id` can safely be used as a subdomain and as a key segment
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LENGTH
        && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
}
