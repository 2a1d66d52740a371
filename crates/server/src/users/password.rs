//! Password hashing, verification and policy checks.
//!
//! Uses Argon2id for hashing. Policy messages keep the wording clients already
//! match on ("Passwords must ...").

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::config::PasswordPolicy;
use crate::error::StoreError;
use crate::users::store::IdentityError;

/// Hash a password using Argon2id.
///
/// Returns the PHC-formatted hash string suitable for storage.
pub fn hash_password(password: &str) -> Result<String, StoreError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| StoreError::Hash(e.to_string()))?;
    Ok(hash.to_string())
}

/// Verify a password against a stored hash. Malformed hashes never match.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Random value rotated whenever credentials change. Outstanding reset tokens
/// embed it, so rotating it revokes them.
pub fn generate_security_stamp() -> Result<String, StoreError> {
    use base64::Engine;
    let mut bytes = [0u8; 32];
    getrandom::fill(&mut bytes).map_err(|e| StoreError::Hash(e.to_string()))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Checks a candidate password against the policy, reporting every violation.
pub fn validate_password(policy: &PasswordPolicy, password: &str) -> Vec<IdentityError> {
    let mut errors = Vec::new();
    if password.chars().count() < policy.required_length {
        errors.push(IdentityError::new(
            "PasswordTooShort",
            format!(
                "Passwords must be at least {} characters.",
                policy.required_length
            ),
        ));
    }
    if policy.require_non_alphanumeric && password.chars().all(char::is_alphanumeric) {
        errors.push(IdentityError::new(
            "PasswordRequiresNonAlphanumeric",
            "Passwords must have at least one non alphanumeric character.",
        ));
    }
    if policy.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push(IdentityError::new(
            "PasswordRequiresDigit",
            "Passwords must have at least one digit ('0'-'9').",
        ));
    }
    if policy.require_lowercase && !password.chars().any(|c| c.is_ascii_lowercase()) {
        errors.push(IdentityError::new(
            "PasswordRequiresLower",
            "Passwords must have at least one lowercase ('a'-'z').",
        ));
    }
    if policy.require_uppercase && !password.chars().any(|c| c.is_ascii_uppercase()) {
        errors.push(IdentityError::new(
            "PasswordRequiresUpper",
            "Passwords must have at least one uppercase ('A'-'Z').",
        ));
    }
    errors
}
