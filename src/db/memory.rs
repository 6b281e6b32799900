use super::{NewUser, User, UserStore};
use crate::types::{AppError, Result, Role};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

/// In-process [`UserStore`]. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn modify<F>(&self, email: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut User),
    {
        let mut users = self.users.write();
        let user = users
            .get_mut(email)
            .ok_or_else(|| AppError::NotFound(format!("user {}", email)))?;
        f(user);
        user.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create_user(&self, new: NewUser) -> Result<User> {
        let mut users = self.users.write();
        if users.contains_key(&new.email) {
            return Err(AppError::Conflict(format!(
                "an account for {} already exists",
                new.email
            )));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: new.email,
            name: new.name,
            password_hash: new.password_hash,
            role: new.role,
            enabled: new.enabled,
            must_change_password: new.must_change_password,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.email.clone(), user.clone());
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.users.read().get(email).cloned())
    }

    async fn list_users(&self, role: Option<Role>) -> Result<Vec<User>> {
        let mut users: Vec<User> = self
            .users
            .read()
            .values()
            .filter(|u| role.is_none_or(|r| u.role == r))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.email.cmp(&b.email)));
        Ok(users)
    }

    async fn set_enabled(&self, email: &str, enabled: bool) -> Result<()> {
        self.modify(email, |user| user.enabled = enabled)
    }

    async fn update_password(
        &self,
        email: &str,
        password_hash: &str,
        must_change_password: bool,
    ) -> Result<()> {
        self.modify(email, |user| {
            user.password_hash = password_hash.to_string();
            user.must_change_password = must_change_password;
        })
    }
}
