use axum::{extract::State, Json};

use crate::auth::{hash_password, verify_password};
use crate::error::{AppError, AppResult};
use crate::middleware::validation::sanitize_for_logging;
use crate::middleware::ValidatedJson;
use crate::models::users::{self, PublicUser};
use crate::state::AppState;
use crate::types::{LoginRequest, LoginResponse, Role, SignupRequest};

/// POST /api/auth/signup
pub async fn signup(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<SignupRequest>,
) -> AppResult<Json<PublicUser>> {
    if users::find_by_email(&state.db, &req.email).await?.is_some() {
        return Err(AppError::Conflict("Email already exists".to_string()));
    }

    let hash = hash_password(req.password, state.config.auth.bcrypt_cost).await?;
    // The unique index still decides when two signups race past the check above
    let user = users::create(&state.db, &req.name, &req.email, &hash, Role::User)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Postgres { sqlstate, .. } if sqlstate == "23505" => {
                AppError::Conflict("Email already exists".to_string())
            }
            other => other,
        })?;

    state.metrics.inc_signups();
    tracing::info!("New account {} created", user.id);
    Ok(Json(user))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let Some(user) = users::find_by_email(&state.db, &req.email).await? else {
        state.metrics.inc_logins(false);
        tracing::warn!("Failed login for unknown email {}", sanitize_for_logging(&req.email));
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password(req.password, user.password_hash.clone()).await? {
        state.metrics.inc_logins(false);
        tracing::warn!("Failed login for user {}", user.id);
        return Err(AppError::InvalidCredentials);
    }

    let token = state.jwt.issue(user.id, user.role)?;
    state.metrics.inc_logins(true);
    Ok(Json(LoginResponse { success: true, token, user: user.into() }))
}
