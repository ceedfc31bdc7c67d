use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use sessiongate_auth::{AuthError, IdentityContext, ProfileFields, Role};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::models::*;
use crate::AppState;

pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Map a core error onto a status code and JSON body
///
/// `Fatal` never produces a response: it is logged and the process aborts.
pub fn error_response(err: AuthError) -> ApiError {
    let status = match &err {
        AuthError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
        AuthError::BadCredential
        | AuthError::MissingToken
        | AuthError::MalformedToken
        | AuthError::ExpiredToken => StatusCode::UNAUTHORIZED,
        AuthError::Denied => StatusCode::FORBIDDEN,
        AuthError::NotFound => StatusCode::NOT_FOUND,
        AuthError::AlreadyExists => StatusCode::CONFLICT,
        AuthError::StorageFailed { retryable: true, .. } => StatusCode::SERVICE_UNAVAILABLE,
        AuthError::StorageFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        AuthError::Fatal(reason) => {
            error!("Unrecoverable authentication failure, aborting: {}", reason);
            std::process::abort();
        }
    };

    // Storage details stay in the logs
    let message = match &err {
        AuthError::StorageFailed { retryable, reason } => {
            warn!("Storage failure (retryable: {}): {}", retryable, reason);
            if *retryable {
                "Storage temporarily unavailable, try again".to_string()
            } else {
                "Internal storage error".to_string()
            }
        }
        other => other.to_string(),
    };

    (
        status,
        Json(ErrorResponse {
            error: message,
            code: Some(err.code().to_string()),
        }),
    )
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Register a new user
///
/// Always creates a USER account. Administrators are created by an operator.
#[utoipa::path(
    post,
    path = "/api/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created, token pair issued", body = SessionResponse),
        (status = 400, description = "Invalid profile or password", body = ErrorResponse),
        (status = 409, description = "Email or phone already registered", body = ErrorResponse),
        (status = 503, description = "Storage unavailable", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    debug!("Signup request for {}", req.email);

    let request = sessiongate_auth::SignupRequest {
        password: req.password,
        profile: ProfileFields {
            email: req.email,
            first_name: req.first_name,
            last_name: req.last_name,
            phone: req.phone,
            role: Role::User,
        },
    };

    let scope = state.service.new_scope();
    let session = state
        .service
        .signup(&scope, request)
        .await
        .map_err(error_response)?;

    Ok((StatusCode::CREATED, Json(session.into())))
}

/// Log in with email and password
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Credentials accepted, token pair issued", body = SessionResponse),
        (status = 401, description = "Email or password is incorrect", body = ErrorResponse),
        (status = 503, description = "Storage unavailable", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    debug!("Login request for {}", req.email);

    let scope = state.service.new_scope();
    let session = state
        .service
        .login(&scope, &req.email, &req.password)
        .await
        .map_err(error_response)?;

    Ok(Json(session.into()))
}

/// Exchange a refresh token for a new token pair
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New token pair issued", body = SessionResponse),
        (status = 401, description = "Refresh token missing, malformed or expired", body = ErrorResponse),
        (status = 404, description = "User no longer exists", body = ErrorResponse),
        (status = 503, description = "Storage unavailable", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let scope = state.service.new_scope();
    let session = state
        .service
        .refresh(&scope, &req.refresh_token)
        .await
        .map_err(error_response)?;

    Ok(Json(session.into()))
}

/// Get the authenticated caller
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Identity carried by the access token", body = CurrentUser),
        (status = 401, description = "Missing, malformed or expired token", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn get_current_user(Extension(ctx): Extension<IdentityContext>) -> Json<CurrentUser> {
    Json(ctx.into())
}

/// Get a user by id
///
/// Users may read their own profile; reading anyone else's requires ADMIN.
#[utoipa::path(
    get,
    path = "/api/users/{user_id}",
    params(
        ("user_id" = String, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User profile", body = User),
        (status = 401, description = "Missing, malformed or expired token", body = ErrorResponse),
        (status = 403, description = "Not allowed to read this user", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    tag = "users"
)]
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<IdentityContext>,
    Path(user_id): Path<String>,
) -> Result<Json<User>, ApiError> {
    state
        .service
        .authorize(&ctx, Role::Admin, Some(&user_id))
        .into_result()
        .map_err(error_response)?;

    let scope = state.service.new_scope();
    let identity = state
        .service
        .find_identity(&scope, &user_id)
        .await
        .map_err(error_response)?;

    info!("User {} read profile of {}", ctx.user_id, user_id);
    Ok(Json(identity.into()))
}
