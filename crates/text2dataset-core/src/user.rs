use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Error, Result};

const HASH_SCHEME: &str = "sha256";
const HASH_ITERATIONS: u32 = 100_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub password_hash: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub banned: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub fn new(username: String, password: &str, is_admin: bool) -> Self {
        Self {
            username,
            password_hash: hash_password(password),
            is_admin,
            banned: false,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn check_password(&self, password: &str) -> bool {
        verify_password(password, &self.password_hash)
    }
}

/// Validated signup form.
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub confirm_password: String,
}

impl Registration {
    pub fn validate(&self, min_password_len: usize) -> Result<()> {
        validate_username(&self.username)?;
        validate_password(&self.password, min_password_len)?;
        if self.password != self.confirm_password {
            return Err(Error::Validation("Passwords do not match".into()));
        }
        Ok(())
    }
}

pub fn validate_username(username: &str) -> Result<()> {
    if username.chars().count() < 3 {
        return Err(Error::Validation(
            "Username must be at least 3 characters long".into(),
        ));
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(Error::Validation(
            "Username can only contain letters, numbers, and underscores".into(),
        ));
    }
    Ok(())
}

pub fn validate_password(password: &str, min_len: usize) -> Result<()> {
    if password.chars().count() < min_len {
        return Err(Error::Validation(format!(
            "Password must be at least {min_len} characters long"
        )));
    }
    if !password.chars().any(|c| c.is_ascii_alphabetic()) {
        return Err(Error::Validation(
            "Password must contain at least one letter".into(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(Error::Validation(
            "Password must contain at least one number".into(),
        ));
    }
    Ok(())
}

/// Salted, iterated SHA-256 in the form `sha256$iterations$salt$digest`.
#[must_use]
pub fn hash_password(password: &str) -> String {
    let salt: [u8; 16] = rand::random();
    let salt = hex::encode(salt);
    let digest = stretch(password, &salt, HASH_ITERATIONS);
    format!("{HASH_SCHEME}${HASH_ITERATIONS}${salt}${digest}")
}

#[must_use]
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(scheme), Some(iterations), Some(salt), Some(expected), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    if scheme != HASH_SCHEME {
        return false;
    }
    let Ok(iterations) = iterations.parse::<u32>() else {
        return false;
    };

    let actual = stretch(password, salt, iterations);
    constant_time_eq(actual.as_bytes(), expected.as_bytes())
}

fn stretch(password: &str, salt: &str, iterations: u32) -> String {
    let mut digest = Sha256::new()
        .chain_update(salt.as_bytes())
        .chain_update(password.as_bytes())
        .finalize();
    for _ in 1..iterations {
        digest = Sha256::new()
            .chain_update(digest)
            .chain_update(password.as_bytes())
            .finalize();
    }
    hex::encode(digest)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
