use crate::{
    auth::middleware::AuthUser,
    types::{AppError, Result, Role, UserResponse},
    AppState,
};
use axum::{extract::State, Json};

/// Candidate accounts visible to a manager
#[utoipa::path(
    get,
    path = "/api/manager/candidates",
    responses(
        (status = 200, description = "Candidates", body = Vec<UserResponse>),
        (status = 403, description = "Caller is not a MANAGER")
    ),
    security(("bearer" = [])),
    tag = "manager"
)]
pub async fn list_candidates(State(state): State<AppState>) -> Result<Json<Vec<UserResponse>>> {
    let users = state.users.list_users(Some(Role::Candidate)).await?;
    Ok(Json(users.iter().map(UserResponse::from).collect()))
}

/// The calling candidate's own account
#[utoipa::path(
    get,
    path = "/api/candidate/profile",
    responses(
        (status = 200, description = "Own account", body = UserResponse),
        (status = 403, description = "Caller is not a CANDIDATE")
    ),
    security(("bearer" = [])),
    tag = "candidate"
)]
pub async fn profile(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<UserResponse>> {
    let user = state
        .users
        .get_user_by_email(claims.email())
        .await?
        .ok_or_else(|| AppError::NotFound("Account no longer exists".to_string()))?;

    Ok(Json(UserResponse::from(&user)))
}
