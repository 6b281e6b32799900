use crate::auth::jwt::{Claims, TokenError};
use crate::auth::policy::AccessDenied;
use crate::types::AppError;
use crate::AppState;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

/// Request-scoped identity established by [`authenticate`].
#[derive(Debug, Clone)]
pub enum AuthContext {
    /// No credentials were presented.
    Anonymous,
    /// A token was presented and validated.
    Authenticated(Claims),
}

impl AuthContext {
    pub fn claims(&self) -> Option<&Claims> {
        match self {
            AuthContext::Anonymous => None,
            AuthContext::Authenticated(claims) => Some(claims),
        }
    }
}

/// Reads the bearer credential, if any.
///
/// `Ok(None)` means no `Authorization` header at all. A header that is present
/// but is not a usable bearer token counts as a bad token, not as anonymous.
pub fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, TokenError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value
        .to_str()
        .map_err(|_| TokenError::Malformed("authorization header is not ASCII".to_string()))?;

    let (scheme, token) = value
        .split_once(' ')
        .ok_or_else(|| TokenError::Malformed("expected 'Bearer <token>'".to_string()))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(TokenError::Malformed(format!(
            "unsupported authorization scheme '{}'",
            scheme
        )));
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(TokenError::Malformed("empty bearer token".to_string()));
    }

    Ok(Some(token))
}

/// Authentication gate.
///
/// Attaches an [`AuthContext`] to every request. A present but invalid token
/// ends the request here with 401; it never degrades to anonymous.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let context = match bearer_token(req.headers()).and_then(|token| match token {
        Some(token) => state.tokens.validate(token).map(AuthContext::Authenticated),
        None => Ok(AuthContext::Anonymous),
    }) {
        Ok(context) => context,
        Err(err) => {
            let path = req.uri().path();
            match &err {
                TokenError::InvalidSignature => {
                    warn!(path, "Rejected token with invalid signature (possible tampering)")
                }
                other => debug!(path, reason = %other, "Rejected token"),
            }
            return AppError::from(err).into_response();
        }
    };

    if let AuthContext::Authenticated(claims) = &context {
        debug!(email = claims.email(), role = %claims.role(), "Authenticated request");
    }

    req.extensions_mut().insert(context);
    next.run(req).await
}

/// Role gate. Runs after [`authenticate`] and before any handler.
pub async fn authorize(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let role = req
        .extensions()
        .get::<AuthContext>()
        .and_then(AuthContext::claims)
        .map(Claims::role);

    if let Err(denied) = state.policy.authorize(req.uri().path(), role) {
        debug!(path = req.uri().path(), reason = %denied, "Access denied");
        return AppError::from(denied).into_response();
    }

    next.run(req).await
}

/// Extractor for handlers that need the caller's validated claims.
pub struct AuthUser(pub Claims);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .and_then(AuthContext::claims)
            .cloned()
            .map(AuthUser)
            .ok_or(AppError::Access(AccessDenied::Unauthenticated))
    }
}
