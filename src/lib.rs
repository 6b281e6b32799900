//! # cvault - credential and session authority
//!
//! The authentication core of the CV vault backend: password records,
//! one-time confirmation codes, signed session tokens, and the two request
//! gates (authentication, then role authorization) every API call passes
//! through.
//!
//! ## Overview
//!
//! cvault can be used in two ways:
//!
//! 1. **As a standalone server** - Run the `cvault-server` binary
//! 2. **As a library** - Mount [`api::create_router`] in a larger Axum app, or
//!    use the services in [`auth`] directly
//!
//! ### Issuing and checking a session
//!
//! ```rust,ignore
//! use cvault::auth::jwt::TokenAuthority;
//! use cvault::types::{Identity, Role};
//!
//! let tokens = TokenAuthority::new(&secret, chrono::Duration::hours(1));
//! let issued = tokens.issue(&Identity::new("ana@example.com", Role::Candidate))?;
//!
//! let claims = tokens.validate(&issued.token)?;
//! assert_eq!(claims.role(), Role::Candidate);
//! ```
//!
//! ### Running the full server
//!
//! ```rust,ignore
//! use cvault::{api, AppConfig, AppState};
//!
//! let config = AppConfig::load("cvault.toml")?;
//! let state = AppState::from_config(config)?;
//! let app = api::create_router(state);
//! ```
//!
//! ## Modules
//!
//! - [`auth`] - passwords, codes, tokens, access table and middleware
//! - [`api`] - REST handlers and router
//! - [`db`] - the account store seam and an in-memory implementation
//! - [`mail`] - the code delivery seam
//! - [`types`] - roles, request/response bodies, errors
//! - [`utils`] - TOML configuration

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

/// HTTP API handlers and routes.
pub mod api;
/// Credentials, sessions and access control.
pub mod auth;
/// Command-line interface.
pub mod cli;
/// Account storage.
pub mod db;
/// Confirmation code delivery.
pub mod mail;
/// Core types (roles, requests, responses, errors).
pub mod types;
/// Configuration utilities.
pub mod utils;

pub use auth::policy::AccessPolicy;
pub use types::{AppError, Result};
pub use utils::toml_config::{AppConfig, ConfigError};

use crate::auth::clock::{Clock, SystemClock};
use crate::auth::codes::ConfirmationCodeRegistry;
use crate::auth::jwt::TokenAuthority;
use crate::auth::password::PasswordService;
use crate::db::{MemoryUserStore, NewUser, UserStore};
use crate::mail::CodeMailer;
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::info;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Validated configuration
    pub config: Arc<AppConfig>,
    /// Account store
    pub users: Arc<dyn UserStore>,
    /// Password hashing and verification
    pub passwords: Arc<PasswordService>,
    /// Pending confirmation codes
    pub codes: Arc<ConfirmationCodeRegistry>,
    /// Session token issuance and validation
    pub tokens: Arc<TokenAuthority>,
    /// Route prefix to role table
    pub policy: Arc<AccessPolicy>,
    /// Code delivery channel
    pub mailer: Arc<dyn CodeMailer>,
}

impl AppState {
    /// Builds the state a standalone server runs with: in-memory accounts,
    /// the configured mailer and the system clock.
    pub fn from_config(config: AppConfig) -> std::result::Result<Self, ConfigError> {
        let mailer = mail::from_config(&config)?;
        Self::new(
            config,
            Arc::new(MemoryUserStore::new()),
            mailer,
            Arc::new(SystemClock),
        )
    }

    /// Builds the state from explicit collaborators.
    pub fn new(
        config: AppConfig,
        users: Arc<dyn UserStore>,
        mailer: Arc<dyn CodeMailer>,
        clock: Arc<dyn Clock>,
    ) -> std::result::Result<Self, ConfigError> {
        let secret = config.jwt_secret()?;
        let passwords = PasswordService::new(&config.auth.password)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        let codes = ConfirmationCodeRegistry::with_clock(config.auth.code_ttl(), clock.clone());
        let tokens = TokenAuthority::with_clock(&secret, config.auth.token_ttl(), clock);
        let policy = config.policy();

        Ok(Self {
            config: Arc::new(config),
            users,
            passwords: Arc::new(passwords),
            codes: Arc::new(codes),
            tokens: Arc::new(tokens),
            policy: Arc::new(policy),
            mailer,
        })
    }

    /// Creates the configured initial SYSADMIN if no account holds its email.
    ///
    /// Returns whether an account was created. An existing account is left
    /// untouched, so restarting the server never resets the admin password.
    pub async fn bootstrap_admin(&self) -> Result<bool> {
        let Some(bootstrap) = &self.config.bootstrap else {
            return Ok(false);
        };

        let email = types::normalize_email(&bootstrap.admin_email);
        if self.users.get_user_by_email(&email).await?.is_some() {
            return Ok(false);
        }

        let password = self
            .config
            .bootstrap_password()
            .map_err(|e| AppError::Internal(e.to_string()))?
            .ok_or_else(|| AppError::Internal("bootstrap password missing".to_string()))?;

        let passwords = self.passwords.clone();
        let password_hash =
            tokio::task::spawn_blocking(move || passwords.hash(password.expose_secret()))
                .await
                .map_err(|e| AppError::Internal(format!("hashing task failed: {}", e)))??;

        let user = self
            .users
            .create_user(NewUser {
                email,
                name: bootstrap.admin_name.clone(),
                password_hash,
                role: types::Role::Sysadmin,
                enabled: true,
                must_change_password: false,
            })
            .await?;

        info!(user_id = %user.id, "Bootstrap SYSADMIN account created");
        Ok(true)
    }
}
