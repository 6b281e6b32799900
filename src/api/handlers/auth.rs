use super::{check_password, hash_password, require_password_strength, token_response};
use crate::{
    auth::{middleware::AuthUser, password::PasswordCheck},
    db::NewUser,
    mail::CodePurpose,
    types::{
        is_plausible_email, normalize_email, AppError, ChangePasswordRequest, CodeRequest,
        EmailRequest, LoginRequest, MessageResponse, Result, Role, SessionInfo, SignupRequest,
        TokenResponse, UserResponse,
    },
    AppState,
};
use axum::{extract::State, http::StatusCode, Json};
use tracing::{info, warn};

const CODE_SENT: &str = "If the account exists, a code has been sent";

fn checked_email(raw: &str) -> Result<String> {
    let email = normalize_email(raw);
    if !is_plausible_email(&email) {
        return Err(AppError::InvalidInput("A valid email is required".to_string()));
    }
    Ok(email)
}

/// Issues a code for `email` and hands it to the mailer in the background.
///
/// The response never waits on the relay, so requests for known and unknown
/// addresses take the same time. A delivery failure is logged; the code stays
/// issued and the user can ask for another one.
fn issue_and_deliver(state: &AppState, email: &str, purpose: CodePurpose) {
    let code = state.codes.issue(email);
    let mailer = state.mailer.clone();
    let email = email.to_string();

    tokio::spawn(async move {
        if let Err(e) = mailer.send_code(&email, &code, purpose).await {
            warn!(email = %email, ?purpose, error = %e, "Confirmation code delivery failed");
        }
    });
}

/// Register a new candidate account
///
/// The account starts disabled; a confirmation code is sent to the email.
#[utoipa::path(
    post,
    path = "/api/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created, awaiting verification", body = UserResponse),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Email already registered")
    ),
    tag = "auth"
)]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    let email = checked_email(&payload.email)?;
    require_password_strength(&payload.password)?;
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::InvalidInput("Name is required".to_string()));
    }

    if state.users.get_user_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    let password_hash = hash_password(&state, payload.password).await?;
    let user = state
        .users
        .create_user(NewUser {
            email: email.clone(),
            name,
            password_hash,
            role: Role::Candidate,
            enabled: false,
            must_change_password: false,
        })
        .await?;

    info!(user_id = %user.id, "Candidate account created");
    issue_and_deliver(&state, &email, CodePurpose::Verification);

    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}

/// Confirm an email address with the code that was sent to it
#[utoipa::path(
    post,
    path = "/api/auth/verify-code",
    request_body = CodeRequest,
    responses(
        (status = 200, description = "Account verified", body = MessageResponse),
        (status = 400, description = "Invalid or expired code")
    ),
    tag = "auth"
)]
pub async fn verify_code(
    State(state): State<AppState>,
    Json(payload): Json<CodeRequest>,
) -> Result<Json<MessageResponse>> {
    let email = normalize_email(&payload.email);
    state.codes.consume(&email, &payload.code)?;

    let user = state
        .users
        .get_user_by_email(&email)
        .await?
        .ok_or(AppError::InvalidCode)?;

    if !user.enabled {
        state.users.set_enabled(&email, true).await?;
        info!(user_id = %user.id, "Account verified");
    }

    Ok(Json(MessageResponse::new("Account verified")))
}

/// Send a fresh verification code to an unverified account
///
/// The response is the same whether or not the account exists.
#[utoipa::path(
    post,
    path = "/api/auth/resend-code",
    request_body = EmailRequest,
    responses((status = 200, description = "Request accepted", body = MessageResponse)),
    tag = "auth"
)]
pub async fn resend_code(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> Result<Json<MessageResponse>> {
    let email = normalize_email(&payload.email);

    if let Some(user) = state.users.get_user_by_email(&email).await? {
        if !user.enabled {
            issue_and_deliver(&state, &email, CodePurpose::Verification);
        }
    }

    Ok(Json(MessageResponse::new(CODE_SENT)))
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account not verified")
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>> {
    let email = normalize_email(&payload.email);
    let user = state.users.get_user_by_email(&email).await?;

    let stored = user.as_ref().map(|u| u.password_hash.clone());
    let check = check_password(&state, payload.password.clone(), stored).await?;

    // Unknown account and wrong password are indistinguishable from here on
    let user = match (user, check) {
        (Some(user), check) if check.is_valid() => user,
        _ => return Err(AppError::InvalidCredentials),
    };

    if !user.enabled {
        return Err(AppError::AccountNotVerified);
    }

    if check == PasswordCheck::ValidLegacy {
        let upgraded = hash_password(&state, payload.password).await?;
        state
            .users
            .update_password(&email, &upgraded, user.must_change_password)
            .await?;
        info!(user_id = %user.id, "Migrated legacy password record to Argon2id");
    }

    Ok(Json(token_response(&state, &user)?))
}

/// Send a one-time sign-in code
///
/// The response is the same whether or not the account exists.
#[utoipa::path(
    post,
    path = "/api/auth/send-login-code",
    request_body = EmailRequest,
    responses((status = 200, description = "Request accepted", body = MessageResponse)),
    tag = "auth"
)]
pub async fn send_login_code(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> Result<Json<MessageResponse>> {
    let email = normalize_email(&payload.email);

    if state.users.get_user_by_email(&email).await?.is_some() {
        issue_and_deliver(&state, &email, CodePurpose::Login);
    }

    Ok(Json(MessageResponse::new(CODE_SENT)))
}

/// Exchange a one-time code for a session token
///
/// Receiving the code proves control of the mailbox, so an unverified
/// account becomes verified.
#[utoipa::path(
    post,
    path = "/api/auth/login-code",
    request_body = CodeRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 400, description = "Invalid or expired code")
    ),
    tag = "auth"
)]
pub async fn login_with_code(
    State(state): State<AppState>,
    Json(payload): Json<CodeRequest>,
) -> Result<Json<TokenResponse>> {
    let email = normalize_email(&payload.email);
    state.codes.consume(&email, &payload.code)?;

    let mut user = state
        .users
        .get_user_by_email(&email)
        .await?
        .ok_or(AppError::InvalidCode)?;

    if !user.enabled {
        state.users.set_enabled(&email, true).await?;
        user.enabled = true;
        info!(user_id = %user.id, "Account verified through sign-in code");
    }

    Ok(Json(token_response(&state, &user)?))
}

/// Describe the current session
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current session", body = SessionInfo),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn me(AuthUser(claims): AuthUser) -> Json<SessionInfo> {
    Json(SessionInfo {
        email: claims.email().to_string(),
        role: claims.role(),
        issued_at: claims.issued_at(),
        expires_at: claims.expires_at(),
    })
}

/// Change the caller's password
#[utoipa::path(
    patch,
    path = "/api/auth/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "New password too weak"),
        (status = 401, description = "Current password incorrect")
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>> {
    require_password_strength(&payload.new_password)?;

    let user = state
        .users
        .get_user_by_email(claims.email())
        .await?
        .ok_or_else(|| AppError::NotFound("Account no longer exists".to_string()))?;

    let check = check_password(
        &state,
        payload.current_password,
        Some(user.password_hash.clone()),
    )
    .await?;
    if !check.is_valid() {
        return Err(AppError::InvalidCredentials);
    }

    let password_hash = hash_password(&state, payload.new_password).await?;
    state
        .users
        .update_password(&user.email, &password_hash, false)
        .await?;

    info!(user_id = %user.id, "Password changed");
    Ok(Json(MessageResponse::new("Password updated")))
}
