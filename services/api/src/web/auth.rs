//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user signup, login, logout, plus reading and editing the
//! signed-in user's profile and password.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use std::sync::Arc;
use storefront_core::domain::{AuthUser, User};
use storefront_core::ports::PortError;
use storefront_core::validation;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::{ApiError, ErrorBody};
use crate::web::dto::{
    AuthResponse, LoginRequest, MessageResponse, SignupRequest, UpdatePasswordRequest,
    UpdateProfileRequest,
};
use crate::web::extract::ApiJson;
use crate::web::middleware::{session_id, SESSION_COOKIE};
use crate::web::state::AppState;

const MIN_PASSWORD_LEN: usize = 6;

//=========================================================================================
// Session Helpers
//=========================================================================================

fn session_cookie(state: &AppState, value: &str, max_age_secs: i64) -> String {
    let secure = if state.config.cookie_secure { "; Secure" } else { "" };
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}{}",
        SESSION_COOKIE, value, max_age_secs, secure
    )
}

/// Opens a new auth session for `user_id` and returns the `Set-Cookie` value.
async fn open_session(state: &AppState, user_id: Uuid) -> Result<String, ApiError> {
    let auth_session_id = Uuid::new_v4().to_string();
    let ttl = Duration::days(state.config.session_ttl_days);
    state
        .users
        .create_auth_session(&auth_session_id, user_id, Utc::now() + ttl)
        .await?;
    Ok(session_cookie(state, &auth_session_id, ttl.num_seconds()))
}

fn check_name(name: &str) -> Result<String, PortError> {
    let name = validation::required("name", name)?;
    let len = name.chars().count();
    if !(2..=50).contains(&len) {
        return Err(PortError::Validation(
            "name must be between 2 and 50 characters".to_string(),
        ));
    }
    Ok(name)
}

fn check_password(password: &str) -> Result<(), PortError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(PortError::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            ApiError::Internal("Failed to hash password".to_string())
        })
}

fn password_matches(password: &str, hashed: &str) -> Result<bool, ApiError> {
    let parsed_hash = PasswordHash::new(hashed).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        ApiError::Internal("Authentication error".to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

fn auth_response(user: User) -> AuthResponse {
    AuthResponse {
        success: true,
        user: user.into(),
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Create a new user account
#[utoipa::path(
    post,
    path = "/auth/signup",
    tag = "Accounts",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created successfully", body = AuthResponse),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody)
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = check_name(&req.name)?;
    let email = validation::email(&req.email)?;
    check_password(&req.password)?;

    let password_hash = hash_password(&req.password)?;
    let user = state.users.create_user(&name, &email, &password_hash).await?;
    let cookie = open_session(&state, user.id).await?;
    info!(user_id = %user.id, "User signed up");

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(auth_response(user)),
    ))
}

/// POST /auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Accounts",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_lowercase();
    let user_creds = state
        .users
        .get_credentials_by_email(&email)
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => ApiError::Port(PortError::Unauthenticated),
            other => ApiError::Port(other),
        })?;

    if !password_matches(&req.password, &user_creds.hashed_password)? {
        return Err(PortError::Unauthenticated.into());
    }

    let user = state.users.get_user(user_creds.user_id).await?;
    let cookie = open_session(&state, user.id).await?;

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(auth_response(user)),
    ))
}

/// POST /auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Accounts",
    responses(
        (status = 200, description = "Logout successful", body = MessageResponse)
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(auth_session_id) = session_id(&headers) {
        state.users.delete_auth_session(auth_session_id).await?;
    }

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, session_cookie(&state, "", 0))],
        Json(MessageResponse::ok("Logged out")),
    ))
}

/// GET /auth/me - The signed-in user's profile
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Accounts",
    responses(
        (status = 200, description = "Current user", body = AuthResponse),
        (status = 401, description = "No active session", body = ErrorBody)
    )
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<AuthResponse>, ApiError> {
    let user = state.users.get_user(caller.user_id).await?;
    Ok(Json(auth_response(user)))
}

/// PUT /users/update - Change the signed-in user's name and email
#[utoipa::path(
    put,
    path = "/users/update",
    tag = "Accounts",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = AuthResponse),
        (status = 400, description = "Invalid name or email", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody)
    )
)]
pub async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let name = check_name(&req.name)?;
    let email = validation::email(&req.email)?;
    let user = state
        .users
        .update_profile(caller.user_id, &name, &email)
        .await?;
    info!(user_id = %user.id, "Profile updated");
    Ok(Json(auth_response(user)))
}

/// PUT /users/update-password - Replace the password after checking the current one
#[utoipa::path(
    put,
    path = "/users/update-password",
    tag = "Accounts",
    request_body = UpdatePasswordRequest,
    responses(
        (status = 200, description = "Password updated", body = MessageResponse),
        (status = 400, description = "Wrong current password or short new one", body = ErrorBody)
    )
)]
pub async fn update_password_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    ApiJson(req): ApiJson<UpdatePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let current_hash = state.users.get_password_hash(caller.user_id).await?;
    if !password_matches(&req.old_password, &current_hash)? {
        return Err(PortError::Validation("Current password incorrect".to_string()).into());
    }
    check_password(&req.new_password)?;

    let password_hash = hash_password(&req.new_password)?;
    state
        .users
        .update_password_hash(caller.user_id, &password_hash)
        .await?;
    info!(user_id = %caller.user_id, "Password updated");
    Ok(Json(MessageResponse::ok("Password updated")))
}
