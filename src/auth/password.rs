//! Password hashing and verification
//!
//! Uses bcrypt; accounts are created from the command line only.

use crate::error::AppError;
use bcrypt::{hash, verify, DEFAULT_COST};

const MIN_PASSWORD_CHARS: usize = 10;

pub fn hash_password(password: &str) -> Result<String, AppError> {
    hash(password, DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

/// Verify a password against a stored hash. A malformed hash counts as a mismatch.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match verify(password, hash) {
        Ok(matches) => matches,
        Err(e) => {
            tracing::warn!("Stored password hash could not be checked: {}", e);
            false
        }
    }
}

pub fn check_password_strength(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_CHARS
        )));
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::Validation(
            "Password cannot be entirely numeric".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hashed = bcrypt::hash("koalitionsvertrag", 4).unwrap();
        assert!(verify_password("koalitionsvertrag", &hashed));
        assert!(!verify_password("wahlprogramm", &hashed));
        assert!(!verify_password("koalitionsvertrag", "not-a-hash"));
    }

    #[test]
    fn test_password_strength() {
        assert!(check_password_strength("kurz").is_err());
        assert!(check_password_strength("12345678901").is_err());
        assert!(check_password_strength("regierungsplan").is_ok());
    }
}
