//! Password policy and hashing.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use std::borrow::Cow;
use validator::ValidationError;

use crate::error::ApiError;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Characters that count toward the "special character" requirement.
const SPECIAL_CHARACTERS: &str = "!@#%^&*()_+=-{}[]:;\"'<>,?/|\\";

/// Characters never accepted in a password.
const FORBIDDEN_CHARACTERS: [char; 2] = ['$', '.'];

/// Validator hook enforcing the password policy: at least eight characters
/// with a lowercase letter, an uppercase letter, a digit and a special
/// character, and none of `$` or `.`.
pub fn validate_strength(password: &str) -> Result<(), ValidationError> {
    let strong = password.chars().count() >= MIN_PASSWORD_LENGTH
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| SPECIAL_CHARACTERS.contains(c))
        && !password.contains(&FORBIDDEN_CHARACTERS[..]);

    if strong {
        Ok(())
    } else {
        let mut error = ValidationError::new("password_strength");
        error.message = Some(Cow::from(
            "Password needs at least 8 characters with a lowercase letter, an uppercase letter, a digit and a special character ($ and . are not allowed)",
        ));
        Err(error)
    }
}

pub fn get_argon2() -> Argon2<'static> {
    Argon2::default()
}

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    get_argon2()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            log::error!("Password hashing failed: {}", e);
            ApiError::Store(crate::store::StoreError::Backend(
                "password hashing failed".to_string(),
            ))
        })
}

/// True when `password` matches the stored PHC string.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => get_argon2()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            log::warn!("Stored password hash could not be parsed: {}", e);
            false
        }
    }
}
