use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};

use super::validation::sanitize_for_logging;
use crate::error::AppError;
use crate::state::AppState;
use crate::types::Role;

/// The caller behind a verified bearer token.
///
/// Inserted into the request extensions by [`authenticate`]; handlers behind
/// that layer take it as an extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i32,
    pub role: Role,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .copied()
            .ok_or_else(|| AppError::Unauthorized("No token provided".to_string()))
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("No token provided".to_string()))?;
    let invalid = || AppError::Unauthorized("Invalid or expired token".to_string());
    let value = value.to_str().map_err(|_| invalid())?;
    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(invalid()),
    }
}

/// Verifies the bearer token and attaches the caller as [`AuthUser`].
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = state.jwt.verify(bearer_token(req.headers())?)?;
    req.extensions_mut().insert(AuthUser { id: claims.id, role: claims.role });
    Ok(next.run(req).await)
}

/// Lets the request through only when the authenticated caller has `required`.
pub async fn authorize_role(required: Role, req: Request, next: Next) -> Result<Response, AppError> {
    let caller = req.extensions().get::<AuthUser>().copied();
    match caller {
        Some(user) if user.role == required => Ok(next.run(req).await),
        Some(user) => {
            tracing::warn!(
                "Forbidden: user {} ({}) on {} {}",
                user.id,
                user.role.as_str(),
                req.method(),
                sanitize_for_logging(req.uri().path())
            );
            Err(AppError::Forbidden("Access denied: insufficient privileges".to_string()))
        }
        None => Err(AppError::Forbidden("Access denied: insufficient privileges".to_string())),
    }
}

pub async fn require_admin(req: Request, next: Next) -> Result<Response, AppError> {
    authorize_role(Role::Admin, req, next).await
}
