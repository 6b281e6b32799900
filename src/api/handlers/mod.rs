//! API request handlers.
//!
//! This module contains all HTTP request handlers organized by functionality.

/// Account administration (SYSADMIN).
pub mod admin;
/// Signup, verification, login and session handlers.
pub mod auth;
/// Liveness probe.
pub mod health;
/// Role-scoped views for managers and candidates.
pub mod roles;

use crate::auth::password::PasswordCheck;
use crate::db::User;
use crate::types::{AppError, Result, TokenResponse};
use crate::AppState;

/// Shortest password accepted on signup, password change and manager creation.
pub const MIN_PASSWORD_LEN: usize = 8;

pub(crate) fn require_password_strength(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::InvalidInput(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Hashes on the blocking pool; Argon2 would otherwise stall a worker.
pub(crate) async fn hash_password(state: &AppState, plaintext: String) -> Result<String> {
    let passwords = state.passwords.clone();
    tokio::task::spawn_blocking(move || passwords.hash(&plaintext))
        .await
        .map_err(|e| AppError::Internal(format!("hashing task failed: {}", e)))?
        .map_err(AppError::from)
}

/// Checks a password on the blocking pool. With no stored record the decoy
/// is verified instead and the result is always `Invalid`.
pub(crate) async fn check_password(
    state: &AppState,
    plaintext: String,
    stored: Option<String>,
) -> Result<PasswordCheck> {
    let passwords = state.passwords.clone();
    tokio::task::spawn_blocking(move || match stored {
        Some(stored) => passwords.check(&plaintext, &stored),
        None => {
            passwords.verify_decoy(&plaintext);
            PasswordCheck::Invalid
        }
    })
    .await
    .map_err(|e| AppError::Internal(format!("verification task failed: {}", e)))
}

pub(crate) fn token_response(state: &AppState, user: &User) -> Result<TokenResponse> {
    let issued = state.tokens.issue(&crate::types::Identity::new(&user.email, user.role))?;

    Ok(TokenResponse {
        access_token: issued.token,
        token_type: "Bearer".to_string(),
        expires_in: state.tokens.ttl().num_seconds(),
        email: user.email.clone(),
        role: user.role,
        must_change_password: user.must_change_password,
    })
}
