use std::sync::atomic::{AtomicBool, Ordering};

use axum::{
    extract::rejection::JsonRejection,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Whether 500 responses may carry the raw error message. Flipped off in production at startup.
static EXPOSE_INTERNAL_ERRORS: AtomicBool = AtomicBool::new(true);

/// Configures how much detail unexpected errors reveal to clients.
pub fn configure(production: bool) {
    EXPOSE_INTERNAL_ERRORS.store(!production, Ordering::Relaxed);
}

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into() }
    }
}

/// The primary error type for the application.
///
/// Every handler and middleware funnels its failures through this enum so that
/// clients always receive the same `{success: false, error, code}` envelope.
#[derive(Debug, Error)]
pub enum AppError {
    /// For internal server errors that are not expected to be handled by the client.
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
    /// For client errors due to invalid requests.
    #[error("Bad request: {0}")]
    BadRequest(String),
    /// For request bodies that fail field validation.
    #[error("Validation failed: {} field(s)", .0.len())]
    Validation(Vec<FieldError>),
    /// Login failed. Deliberately does not say whether the email exists.
    #[error("Invalid credentials")]
    InvalidCredentials,
    /// Missing, invalid or expired bearer token.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    /// Authenticated, but the role does not permit the action.
    #[error("Forbidden: {0}")]
    Forbidden(String),
    /// For when a requested resource is not found.
    #[error("Not found: {0}")]
    NotFound(String),
    /// For when a request conflicts with the current state of the server.
    #[error("Conflict: {0}")]
    Conflict(String),
    /// For when a client has sent too many requests in a given amount of time.
    #[error("Rate limited. Retry after {retry_after_seconds} seconds")]
    RateLimited {
        /// The number of seconds to wait before retrying the request.
        retry_after_seconds: u64,
    },
    /// For when a service is temporarily unavailable.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
    /// A Postgres error with a known SQLSTATE that maps to a client error.
    #[error("Database error ({sqlstate}): {message}")]
    Postgres { sqlstate: String, message: String },
    /// Any other database failure.
    #[error("Database error: {0}")]
    Database(String),
}

/// Maps the SQLSTATE codes clients can cause to a status and a public message.
pub fn classify_sqlstate(code: &str) -> Option<(StatusCode, &'static str)> {
    match code {
        "23505" => Some((StatusCode::CONFLICT, "Resource already exists.")),
        "23503" => Some((StatusCode::BAD_REQUEST, "Related resource not found.")),
        "22P02" => Some((StatusCode::BAD_REQUEST, "Invalid input format.")),
        // NUL bytes are valid JSON and URL text but not valid Postgres text
        "22021" => Some((StatusCode::BAD_REQUEST, "Invalid character in input.")),
        "23514" => Some((StatusCode::BAD_REQUEST, "Value violates a check constraint.")),
        "23502" => Some((StatusCode::BAD_REQUEST, "A required value is missing.")),
        _ => None,
    }
}

/// The message a 500 response carries: the raw error outside production, generic text inside.
pub fn public_internal_message(raw: &str, expose: bool) -> String {
    if expose {
        raw.to_string()
    } else {
        "An internal server error occurred".to_string()
    }
}

impl AppError {
    /// HTTP status this error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Internal(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_)
            | AppError::Validation(_)
            | AppError::InvalidCredentials => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Postgres { sqlstate, .. } => classify_sqlstate(sqlstate)
                .map(|(status, _)| status)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }

    /// Machine-readable code placed in the `code` field of the body.
    pub fn code(&self) -> String {
        match self {
            AppError::Internal(_) => "INTERNAL_ERROR".into(),
            AppError::BadRequest(_) => "BAD_REQUEST".into(),
            AppError::Validation(_) => "VALIDATION_ERROR".into(),
            AppError::InvalidCredentials => "INVALID_CREDENTIALS".into(),
            AppError::Unauthorized(_) => "UNAUTHORIZED".into(),
            AppError::Forbidden(_) => "FORBIDDEN".into(),
            AppError::NotFound(_) => "NOT_FOUND".into(),
            AppError::Conflict(_) => "CONFLICT".into(),
            AppError::RateLimited { .. } => "RATE_LIMITED".into(),
            AppError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE".into(),
            AppError::Postgres { sqlstate, .. } => sqlstate.clone(),
            AppError::Database(_) => "DATABASE_ERROR".into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let expose = EXPOSE_INTERNAL_ERRORS.load(Ordering::Relaxed);
        let mut retry_after = None;

        let (message, extras) = match self {
            AppError::Internal(e) => {
                let error_id = uuid::Uuid::new_v4();
                tracing::error!("Internal error {}: {:?}", error_id, e);
                (
                    public_internal_message(&e.to_string(), expose),
                    Some(json!({ "error_id": error_id.to_string() })),
                )
            }
            AppError::Database(msg) => {
                let error_id = uuid::Uuid::new_v4();
                tracing::error!("Database error {}: {}", error_id, msg);
                (
                    public_internal_message(&msg, expose),
                    Some(json!({ "error_id": error_id.to_string() })),
                )
            }
            AppError::Postgres { sqlstate, message } => {
                tracing::debug!("Postgres constraint error {}: {}", sqlstate, message);
                let public = classify_sqlstate(&sqlstate)
                    .map(|(_, m)| m.to_string())
                    .unwrap_or_else(|| public_internal_message(&message, expose));
                (public, None)
            }
            AppError::Validation(fields) => {
                let message = fields
                    .first()
                    .map(|f| f.message.clone())
                    .unwrap_or_else(|| "Validation failed".to_string());
                (message, Some(json!({ "errors": fields })))
            }
            AppError::InvalidCredentials => ("Invalid credentials".to_string(), None),
            AppError::RateLimited { retry_after_seconds } => {
                retry_after = Some(retry_after_seconds);
                (
                    format!("Too many requests. Please retry after {} seconds", retry_after_seconds),
                    Some(json!({ "retry_after_seconds": retry_after_seconds })),
                )
            }
            AppError::BadRequest(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::ServiceUnavailable(msg) => (msg, None),
        };

        let mut body = json!({
            "success": false,
            "error": message,
            "code": code,
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        if let Some(serde_json::Value::Object(extra)) = extras {
            for (k, v) in extra {
                body[k] = v;
            }
        }

        let mut res = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            if let Ok(v) = HeaderValue::from_str(&secs.to_string()) {
                res.headers_mut().insert(header::RETRY_AFTER, v);
            }
        }
        res
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db_err) => match db_err.code() {
                Some(code) if classify_sqlstate(&code).is_some() => AppError::Postgres {
                    sqlstate: code.into_owned(),
                    message: db_err.message().to_string(),
                },
                _ => AppError::Database(db_err.message().to_string()),
            },
            sqlx::Error::PoolTimedOut => {
                AppError::ServiceUnavailable("Database connection pool timed out".to_string())
            }
            _ => AppError::Database(err.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                let field = field.to_string();
                errs.iter().map(move |e| {
                    let message = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{} is invalid ({})", field, e.code));
                    FieldError::new(field.clone(), message)
                })
            })
            .collect();
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        AppError::Validation(fields)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(err: bcrypt::BcryptError) -> Self {
        AppError::Internal(anyhow::anyhow!("password hashing failed: {}", err))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(anyhow::anyhow!("background task failed: {}", err))
    }
}

/// A type alias for `Result<T, AppError>`, used throughout the application.
pub type AppResult<T> = Result<T, AppError>;

/// An extension trait for `Option` that provides a convenient way to convert
/// an `Option` to a `Result` with a `NotFound` error.
pub trait OptionExt<T> {
    /// Converts an `Option<T>` to a `Result<T, AppError>`.
    ///
    /// # Arguments
    ///
    /// * `entity` - A string describing the entity that was not found.
    fn ok_or_not_found(self, entity: &str) -> AppResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, entity: &str) -> AppResult<T> {
        self.ok_or_else(|| AppError::NotFound(format!("{} not found", entity)))
    }
}
