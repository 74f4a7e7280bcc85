//! Login and session endpoints.

use axum::{extract::State, http::StatusCode, Extension};
use cardhub_database::{UserChanges, UserRepository};
use cardhub_models::{ChangePasswordRequest, LoginRequest, User};
use cardhub_utils::{hash_password, validate_model, verify_password, CardHubError, CardHubResult};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{extract::Json, middleware::AuthUser, AppState};

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> CardHubResult<Json<LoginResponse>> {
    validate_model(&request)?;

    let user = UserRepository::new(state.pool.clone())
        .find_by_mobile(request.mobile.trim())
        .await?
        .filter(|user| verify_password(&request.password, &user.password_hash));

    let Some(user) = user else {
        state.metrics.record_login(false);
        return Err(CardHubError::authentication("Invalid mobile number or password"));
    };

    if !user.is_active {
        state.metrics.record_login(false);
        return Err(CardHubError::authentication("Account is disabled"));
    }

    let issued = state.tokens.issue(&user.principal())?;
    state.metrics.record_login(true);
    tracing::info!(user_id = %user.id, role = %user.role, "User logged in");

    Ok(Json(LoginResponse {
        token: issued.token,
        expires_at: issued.expires_at,
        user,
    }))
}

/// GET /api/auth/me
pub async fn me(Extension(auth): Extension<AuthUser>) -> Json<User> {
    Json(auth.user)
}

/// POST /api/auth/change-password
pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(request): Json<ChangePasswordRequest>,
) -> CardHubResult<StatusCode> {
    validate_model(&request)?;

    if !verify_password(&request.current_password, &auth.user.password_hash) {
        return Err(CardHubError::validation(
            "current_password",
            "Current password is incorrect",
        ));
    }
    if request.current_password == request.new_password {
        return Err(CardHubError::validation(
            "new_password",
            "New password must differ from the current password",
        ));
    }

    let changes = UserChanges {
        password_hash: Some(hash_password(&request.new_password)?),
        ..Default::default()
    };
    UserRepository::new(state.pool.clone())
        .update(auth.user.id, &changes)
        .await?
        .ok_or_else(|| CardHubError::not_found("User"))?;

    tracing::info!(user_id = %auth.user.id, "Password changed");
    Ok(StatusCode::NO_CONTENT)
}
