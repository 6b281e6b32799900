//! Account storage.
//!
//! The credential authority does not own user persistence; it talks to a
//! [`UserStore`] keyed by normalized email. [`MemoryUserStore`] backs
//! development servers and tests.

#![allow(missing_docs)]

pub mod memory;

pub use memory::MemoryUserStore;

use crate::types::{Result, Role, UserResponse};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Stored account.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: Role,
    /// False until the email has been confirmed.
    pub enabled: bool,
    /// Set for accounts created with a temporary password.
    pub must_change_password: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when creating an account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: Role,
    pub enabled: bool,
    pub must_change_password: bool,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        UserResponse {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            enabled: user.enabled,
            must_change_password: user.must_change_password,
            created_at: user.created_at,
        }
    }
}

/// Abstract account store
///
/// Emails passed in are already normalized. Implementations must reject a
/// second account for the same email with `AppError::Conflict`.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create a new account and return the stored record
    async fn create_user(&self, user: NewUser) -> Result<User>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// All accounts, optionally restricted to one role, oldest first
    async fn list_users(&self, role: Option<Role>) -> Result<Vec<User>>;

    /// Enable or disable an account (`AppError::NotFound` if absent)
    async fn set_enabled(&self, email: &str, enabled: bool) -> Result<()>;

    /// Replace the password record (`AppError::NotFound` if absent)
    async fn update_password(
        &self,
        email: &str,
        password_hash: &str,
        must_change_password: bool,
    ) -> Result<()>;
}
