//! Authentication service.
//!
//! Phone + password accounts with Argon2id hashes. Customers register
//! themselves; administrators are created by `tasfiya-cli admin create`.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use serde::Deserialize;

use tasfiya_core::{Email, Phone, UserRole};

use crate::db::{RepositoryError, Storage};
use crate::models::{NewUser, User};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum display name length.
const MAX_NAME_LENGTH: usize = 200;

/// Body of `POST /api/auth/register`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub password: String,
}

/// Authentication service over any storage backend.
pub struct AuthService<'a> {
    storage: &'a dyn Storage,
}

impl<'a> AuthService<'a> {
    #[must_use]
    pub const fn new(storage: &'a dyn Storage) -> Self {
        Self { storage }
    }

    /// Register an account with the given role.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidPhone`/`InvalidEmail`/`InvalidName` for
    /// malformed input, `AuthError::WeakPassword` for a short password and
    /// `AuthError::UserAlreadyExists` if the phone is taken.
    pub async fn register(
        &self,
        registration: Registration,
        role: UserRole,
    ) -> Result<User, AuthError> {
        let name = validate_name(&registration.name)?;
        let phone = Phone::parse(&registration.phone)?;
        let email = registration
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(Email::parse)
            .transpose()?;

        validate_password(&registration.password)?;
        let password_hash = hash_password(&registration.password)?;

        self.storage
            .create_user(NewUser {
                name,
                phone,
                email,
                role,
                password_hash,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })
    }

    /// Login with phone and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the phone is unknown or the
    /// password is wrong.
    pub async fn login(&self, phone: &str, password: &str) -> Result<User, AuthError> {
        let phone = Phone::parse(phone).map_err(|_| AuthError::InvalidCredentials)?;

        let user = self
            .storage
            .get_user_by_phone(&phone)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &user.password_hash)?;

        Ok(user)
    }
}

fn validate_name(name: &str) -> Result<String, AuthError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AuthError::InvalidName("name is required".to_owned()));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(AuthError::InvalidName(format!(
            "name must be at most {MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(name.to_owned())
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a stored hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::MemoryStorage;

    fn registration(phone: &str, password: &str) -> Registration {
        Registration {
            name: "Mona Khalil".to_owned(),
            phone: phone.to_owned(),
            email: None,
            password: password.to_owned(),
        }
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let storage = MemoryStorage::new();
        let auth = AuthService::new(&storage);

        let user = auth
            .register(registration("+966 50-123-4567", "s3cure-pass"), UserRole::Customer)
            .await
            .unwrap();
        assert_eq!(user.role, UserRole::Customer);

        let logged_in = auth.login("+966501234567", "s3cure-pass").await.unwrap();
        assert_eq!(logged_in.id, user.id);

        assert!(matches!(
            auth.login("+966501234567", "nope-nope").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates_and_weak_passwords() {
        let storage = MemoryStorage::new();
        let auth = AuthService::new(&storage);

        assert!(matches!(
            auth.register(registration("0501234567", "short"), UserRole::Customer)
                .await,
            Err(AuthError::WeakPassword(_))
        ));

        auth.register(registration("0501234567", "long-enough"), UserRole::Customer)
            .await
            .unwrap();
        assert!(matches!(
            auth.register(registration("0501234567", "long-enough"), UserRole::Customer)
                .await,
            Err(AuthError::UserAlreadyExists)
        ));
    }
}
