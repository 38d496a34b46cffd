//! Username/password login and registration. Passwords are hashed with
//! Argon2id; the store never sees a plaintext password.

use crate::model::User;
use crate::store::{Store, StoreError};
use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

#[derive(Debug)]
pub enum AuthError {
    UnknownUser,
    IncorrectPassword,
    UsernameTaken,
    ValueTooLong,
}

pub fn hash_password(password: &str) -> String {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .expect("argon2 hashing should not fail for well-formed input")
        .to_string()
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    let parsed = match PasswordHash::new(hash) {
        Ok(parsed) => parsed,
        Err(_) => return false,
    };

    Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
}

/// Username/password length bound mirroring the backing store's column
/// width; registration fails cleanly instead of the store erroring later.
pub const MAX_USERNAME_LEN: usize = 64;

pub fn login<S: Store>(store: &S, username: &str, password: &str) -> Result<User, AuthError> {
    let user = store.find_user_by_username(username).ok_or(AuthError::UnknownUser)?;

    if !verify_password(&user.password_hash, password) {
        return Err(AuthError::IncorrectPassword);
    }

    Ok(user)
}

pub fn register<S: Store>(store: &mut S, username: &str, password: &str) -> Result<User, AuthError> {
    if username.len() > MAX_USERNAME_LEN {
        return Err(AuthError::ValueTooLong);
    }

    let hash = hash_password(password);

    store.create_user(username, hash).map_err(|err| match err {
        StoreError::Duplicate => AuthError::UsernameTaken,
        StoreError::NotFound => AuthError::UnknownUser,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    #[test]
    fn test_register_then_login_succeeds() {
        let mut store = InMemoryStore::new();
        register(&mut store, "alice", "hunter2").unwrap();

        let user = login(&store, "alice", "hunter2").unwrap();
        assert_eq!(user.username, "alice");
    }

    #[test]
    fn test_login_unknown_user_fails() {
        let store = InMemoryStore::new();
        let result = login(&store, "nobody", "whatever");
        assert!(matches!(result, Err(AuthError::UnknownUser)));
    }

    #[test]
    fn test_login_wrong_password_fails() {
        let mut store = InMemoryStore::new();
        register(&mut store, "alice", "hunter2").unwrap();

        let result = login(&store, "alice", "wrong");
        assert!(matches!(result, Err(AuthError::IncorrectPassword)));
    }

    #[test]
    fn test_register_duplicate_username_fails() {
        let mut store = InMemoryStore::new();
        register(&mut store, "alice", "hunter2").unwrap();

        let result = register(&mut store, "alice", "different");
        assert!(matches!(result, Err(AuthError::UsernameTaken)));
    }

    #[test]
    fn test_password_hash_is_not_plaintext() {
        let hash = hash_password("hunter2");
        assert_ne!(hash, "hunter2");
        assert!(verify_password(&hash, "hunter2"));
        assert!(!verify_password(&hash, "hunter3"));
    }
}
