use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, ForgotPasswordRequest, LoginRequest, PublicUser, RefreshRequest,
            RegisterRequest, ResetPasswordRequest, Role,
        },
        jwt::{role_or_default, AuthUser, JwtKeys},
        mailer::Mailer,
        password::{generate_reset_code, hash_password, is_valid_email, verify_password},
        repo::{self, User},
    },
    error::ApiError,
    realtime::StudentEvent,
    state::AppState,
    students,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

fn auth_response(
    keys: &JwtKeys,
    user: &User,
    role: Role,
) -> Result<AuthResponse, ApiError> {
    let access_token = keys.sign_access(user.id)?;
    let refresh_token = keys.sign_refresh(user.id)?;
    Ok(AuthResponse {
        access_token,
        refresh_token,
        user: PublicUser {
            id: user.id,
            email: user.email.clone(),
            role,
        },
    })
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();
    let name = payload.name.trim().to_string();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }
    if payload.password.len() < 8 {
        warn!("password too short");
        return Err(ApiError::Validation("Password too short".into()));
    }
    if payload.role == Role::Admin {
        return Err(ApiError::Validation("Cannot self-register as admin".into()));
    }
    if payload.role == Role::Student && name.is_empty() {
        return Err(ApiError::Validation("Name is required".into()));
    }

    if let Ok(Some(_)) = User::find_by_email(&state.db, &payload.email).await {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::Duplicate("Email already registered".into()));
    }

    let hash = hash_password(&payload.password)?;

    // Account and student profile land together or not at all.
    let mut tx = state.db.begin().await.map_err(ApiError::from)?;
    let user = User::create(&mut *tx, &payload.email, &hash, payload.role.as_str())
        .await
        .map_err(|e| match ApiError::from(e) {
            ApiError::Duplicate(_) => ApiError::Duplicate("Email already registered".into()),
            other => other,
        })?;

    let mut created_student = None;
    if payload.role == Role::Student {
        created_student =
            students::repo::Student::create_if_absent(&mut *tx, &name, &payload.email)
                .await
                .map_err(ApiError::from)?;
    }
    tx.commit().await.map_err(ApiError::from)?;

    if let Some(student) = created_student {
        let _ = state.events.send(StudentEvent::Inserted { student });
    }

    let keys = JwtKeys::from_ref(&state);
    let response = auth_response(&keys, &user, payload.role)?;
    info!(user_id = %user.id, email = %user.email, role = %payload.role.as_str(), "user registered");
    Ok(Json(response))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }

    let user = match User::find_by_email(&state.db, &payload.email).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(email = %payload.email, "login unknown email");
            return Err(ApiError::Unauthorized("Invalid credentials".into()));
        }
        Err(e) => {
            error!(error = %e, "find_by_email failed");
            return Err(ApiError::Internal(e));
        }
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        return Err(ApiError::Unauthorized("Invalid credentials".into()));
    }

    let role = Role::parse_or_student(&user.role);
    let keys = JwtKeys::from_ref(&state);
    let response = auth_response(&keys, &user, role)?;
    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(response))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| ApiError::Unauthorized(e.to_string()))?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".into()))?;

    let role = Role::parse_or_student(&user.role);
    let response = auth_response(&keys, &user, role)?;
    Ok(Json(response))
}

/// Tokens are stateless; sign-out is the client discarding them. The endpoint
/// exists so the contract has an explicit sign-out operation.
#[instrument(skip_all)]
pub async fn logout(AuthUser(user_id): AuthUser) -> StatusCode {
    info!(%user_id, "user signed out");
    StatusCode::NO_CONTENT
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(mut payload): Json<ForgotPasswordRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();
    if !is_valid_email(&payload.email) {
        return Err(ApiError::Validation("Invalid email".into()));
    }

    // Same response whether or not the account exists.
    let generic = Json(serde_json::json!({
        "message": "If an account exists for that address, a reset code has been sent."
    }));

    let user = match User::find_by_email(&state.db, &payload.email).await? {
        Some(u) => u,
        None => {
            info!(email = %payload.email, "reset requested for unknown email");
            return Ok(generic);
        }
    };

    let code = generate_reset_code();
    repo::store_reset_code(&state.db, &user.email, &code).await?;

    match &state.config.smtp {
        Some(smtp_cfg) => {
            let mailer = Mailer::from_config(smtp_cfg)?;
            let email = user.email.clone();
            tokio::task::spawn_blocking(move || mailer.send_reset_code(&email, &code))
                .await
                .map_err(|e| ApiError::Internal(e.into()))?
                .map_err(|e| {
                    error!(error = %e, "reset mail send failed");
                    ApiError::Internal(e)
                })?;
        }
        None => {
            warn!(email = %user.email, %code, "SMTP not configured, logging reset code");
        }
    }

    info!(email = %user.email, "reset code issued");
    Ok(generic)
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(mut payload): Json<ResetPasswordRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();
    if payload.new_password.len() < 8 {
        return Err(ApiError::Validation("Password too short".into()));
    }

    let code = payload.code.trim().to_uppercase();
    if !repo::consume_reset_code(&state.db, &payload.email, &code).await? {
        return Err(ApiError::Validation("Invalid or expired reset code".into()));
    }

    let hash = hash_password(&payload.new_password)?;
    if !User::update_password(&state.db, &payload.email, &hash).await? {
        return Err(ApiError::NotFound("User not found".into()));
    }

    info!(email = %payload.email, "password reset");
    Ok(Json(serde_json::json!({ "message": "Password updated" })))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await
        .map_err(|e| {
            error!(error = %e, %user_id, "user lookup failed");
            ApiError::Unauthorized("User not found".into())
        })?
        .ok_or_else(|| ApiError::Unauthorized("User not found".into()))?;

    // Role lookup failures degrade to student rather than failing the call.
    let role = role_or_default(&state.db, user_id).await;
    Ok(Json(PublicUser {
        id: user.id,
        email: user.email,
        role,
    }))
}

#[cfg(test)]
mod me_tests {
    use super::*;

    #[test]
    fn public_user_serializes_role_lowercase() {
        let response = PublicUser {
            id: uuid::Uuid::new_v4(),
            email: "test@example.com".to_string(),
            role: Role::Lecturer,
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("test@example.com"));
        assert!(json.contains("\"lecturer\""));
    }
}
