//! Credentials, sessions and access control.
//!
//! # Module Structure
//!
//! - [`password`] - Argon2id password records (plus verification of legacy SHA-256 records)
//! - [`codes`] - six-digit one-time confirmation codes with a fixed expiry window
//! - [`jwt`] - HS256 session tokens carrying the caller's email and role
//! - [`policy`] - the route-prefix to role table
//! - [`middleware`] - Axum layers that apply the two gates to each request
//! - [`clock`] - the time source shared by codes and tokens
//!
//! # Request Flow
//!
//! Every request passes through [`middleware::authenticate`] first, which
//! turns the `Authorization` header into an [`middleware::AuthContext`]:
//!
//! - no header: anonymous
//! - valid bearer token: authenticated with the token's claims
//! - anything else: rejected with 401 before routing continues
//!
//! [`middleware::authorize`] then looks the path up in the
//! [`policy::AccessPolicy`] and rejects with 401 or 403 as appropriate.
//! Handlers only ever run for callers the table admits.
//!
//! ```ignore
//! let app = Router::new()
//!     .merge(routes)
//!     .layer(middleware::from_fn_with_state(state.clone(), authorize))
//!     .layer(middleware::from_fn_with_state(state.clone(), authenticate))
//!     .with_state(state);
//! ```
//!
//! Handlers that need the caller use the [`middleware::AuthUser`] extractor:
//!
//! ```ignore
//! async fn me(AuthUser(claims): AuthUser) -> Json<SessionInfo> {
//!     // claims.email(), claims.role()
//! }
//! ```

pub mod clock;
pub mod codes;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod policy;
