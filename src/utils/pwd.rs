use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};

use crate::errors::{Error, Result};

pub fn hash(password: &[u8]) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default().hash_password(password, &salt)?.to_string())
}

/// `Ok(false)` on a wrong password; a malformed stored hash is an error.
pub fn validate(password: &[u8], hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)?;

    match Argon2::default().verify_password(password, &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(Error::Argon2Error(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_validate() {
        let hashed = hash(b"Corr3ct-horse").expect("Failed to hash password");
        assert_ne!(hashed, "Corr3ct-horse");

        assert!(validate(b"Corr3ct-horse", &hashed).expect("Validation failed"));
        assert!(!validate(b"battery-staple", &hashed).expect("Validation failed"));
    }

    #[test]
    fn test_malformed_hash() {
        assert!(validate(b"anything", "not-a-phc-string").is_err());
    }
}
