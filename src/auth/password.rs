//! Password hashing, kept off the async executor

use crate::error::{Error, Result};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Minimum length accepted for new passwords
pub const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Clone)]
pub struct PasswordHasher {
    cost: u32,
    /// Hash verified against when a username is unknown, produced at the
    /// configured cost so failed logins take the same time either way
    dummy: Arc<OnceCell<String>>,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self {
            cost,
            dummy: Arc::new(OnceCell::new()),
        }
    }

    pub async fn hash(&self, password: &str) -> Result<String> {
        let password = password.to_string();
        let cost = self.cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| Error::Other(format!("hashing task failed: {}", e)))?
            .map_err(Error::from)
    }

    /// Verify a password against a stored hash. A malformed stored hash
    /// counts as a mismatch.
    pub async fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let password = password.to_string();
        let hash = hash.to_string();
        let verified = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| Error::Other(format!("hashing task failed: {}", e)))?;

        match verified {
            Ok(matches) => Ok(matches),
            Err(e) => {
                tracing::warn!(error = %e, "stored password hash is unreadable");
                Ok(false)
            }
        }
    }

    /// Burn one verification for a username that does not exist
    pub async fn verify_dummy(&self, password: &str) {
        let dummy = self
            .dummy
            .get_or_try_init(|| async { self.hash(&uuid::Uuid::new_v4().to_string()).await })
            .await;
        if let Ok(hash) = dummy {
            let _ = self.verify(password, hash).await;
        }
    }
}

pub fn check_new_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(Error::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}
