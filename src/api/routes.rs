use crate::api::handlers::{admin, auth, health, roles};
use crate::api::ApiDoc;
use crate::auth::middleware::{authenticate, authorize};
use crate::AppState;
use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, patch, post},
    Json, Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;

/// Builds the full application router.
///
/// Every route sits behind both gates: [`authenticate`] runs first and
/// attaches the caller's identity, then [`authorize`] checks it against the
/// access table. Whether a route is public is decided by the table alone.
pub fn create_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/signup", post(auth::signup))
        .route("/verify-code", post(auth::verify_code))
        .route("/resend-code", post(auth::resend_code))
        .route("/login", post(auth::login))
        .route("/send-login-code", post(auth::send_login_code))
        .route("/login-code", post(auth::login_with_code))
        .route("/me", get(auth::me))
        .route("/password", patch(auth::change_password));

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users))
        .route("/managers", post(admin::create_manager));

    let api_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/admin", admin_routes)
        .route("/manager/candidates", get(roles::list_candidates))
        .route("/candidate/profile", get(roles::profile))
        .route("/openapi.json", get(|| async { Json(ApiDoc::openapi()) }));

    let body_limit = state.config.server.body_limit;
    let cors = cors_layer(&state.config.server.cors_origins);

    let router = Router::new()
        .route("/health", get(health::health))
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(state.clone(), authorize))
        .layer(middleware::from_fn_with_state(state.clone(), authenticate))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(state);

    // CORS sits outside the gates so preflight requests never need a token
    let router = match cors {
        Some(cors) => router.layer(cors),
        None => router,
    };

    router.layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    if origins.is_empty() {
        return None;
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST, Method::PATCH])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
    )
}
