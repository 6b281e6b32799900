use super::{hash_password, require_password_strength};
use crate::{
    db::NewUser,
    types::{
        is_plausible_email, normalize_email, AppError, CreateManagerRequest, Result, Role,
        UserResponse,
    },
    AppState,
};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserFilter {
    /// Only accounts holding this role
    pub role: Option<Role>,
}

/// List accounts
#[utoipa::path(
    get,
    path = "/api/admin/users",
    params(UserFilter),
    responses(
        (status = 200, description = "Accounts", body = Vec<UserResponse>),
        (status = 403, description = "Caller is not a SYSADMIN")
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(filter): Query<UserFilter>,
) -> Result<Json<Vec<UserResponse>>> {
    let users = state.users.list_users(filter.role).await?;
    Ok(Json(users.iter().map(UserResponse::from).collect()))
}

/// Create a manager account with a temporary password
///
/// The account is active immediately and must change its password.
#[utoipa::path(
    post,
    path = "/api/admin/managers",
    request_body = CreateManagerRequest,
    responses(
        (status = 201, description = "Manager created", body = UserResponse),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Caller is not a SYSADMIN"),
        (status = 409, description = "Email already registered")
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn create_manager(
    State(state): State<AppState>,
    Json(payload): Json<CreateManagerRequest>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    let email = normalize_email(&payload.email);
    if !is_plausible_email(&email) {
        return Err(AppError::InvalidInput("A valid email is required".to_string()));
    }
    require_password_strength(&payload.temporary_password)?;

    let password_hash = hash_password(&state, payload.temporary_password).await?;
    let user = state
        .users
        .create_user(NewUser {
            email,
            name: payload.name.trim().to_string(),
            password_hash,
            role: Role::Manager,
            enabled: true,
            must_change_password: true,
        })
        .await?;

    info!(user_id = %user.id, "Manager account created");
    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}
