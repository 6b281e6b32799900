//! HTTP API Handlers and Routes
//!
//! # API Endpoints
//!
//! ## Authentication (`/api/auth`)
//! - `POST /api/auth/signup` - Register a candidate account (starts unverified)
//! - `POST /api/auth/verify-code` - Confirm the email with the mailed code
//! - `POST /api/auth/resend-code` - Mail a fresh verification code
//! - `POST /api/auth/login` - Password login, returns a session token
//! - `POST /api/auth/send-login-code` - Mail a one-time sign-in code
//! - `POST /api/auth/login-code` - Exchange a sign-in code for a session token
//! - `GET /api/auth/me` - Describe the current session
//! - `PATCH /api/auth/password` - Change password
//!
//! ## Role areas
//! - `GET /api/admin/users`, `POST /api/admin/managers` - SYSADMIN only
//! - `GET /api/manager/candidates` - MANAGER only
//! - `GET /api/candidate/profile` - CANDIDATE only
//!
//! ## Misc
//! - `GET /health` - Liveness probe
//! - `GET /api/openapi.json` - OpenAPI document
//!
//! # Authentication
//!
//! Protected endpoints need a session token in the `Authorization` header:
//! ```text
//! Authorization: Bearer <token>
//! ```
//! A header carrying a bad or expired token is refused with 401 even on
//! public endpoints.

/// Request and response handlers for all API endpoints.
pub mod handlers;
/// Router configuration and route definitions.
pub mod routes;

pub use routes::create_router;

use crate::types::{
    ChangePasswordRequest, CodeRequest, CreateManagerRequest, EmailRequest, LoginRequest,
    MessageResponse, Role, SessionInfo, SignupRequest, TokenResponse, UserResponse,
};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// OpenAPI description of the HTTP surface.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::auth::signup,
        handlers::auth::verify_code,
        handlers::auth::resend_code,
        handlers::auth::login,
        handlers::auth::send_login_code,
        handlers::auth::login_with_code,
        handlers::auth::me,
        handlers::auth::change_password,
        handlers::admin::list_users,
        handlers::admin::create_manager,
        handlers::roles::list_candidates,
        handlers::roles::profile,
    ),
    components(schemas(
        Role,
        SignupRequest,
        LoginRequest,
        EmailRequest,
        CodeRequest,
        ChangePasswordRequest,
        CreateManagerRequest,
        TokenResponse,
        MessageResponse,
        SessionInfo,
        UserResponse,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Accounts, codes and sessions"),
        (name = "admin", description = "SYSADMIN account management"),
        (name = "manager", description = "MANAGER views"),
        (name = "candidate", description = "CANDIDATE views"),
        (name = "health", description = "Liveness")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
