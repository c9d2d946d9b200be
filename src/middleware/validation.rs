use axum::{
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::{AppError, AppResult};

/// JSON body extractor that runs `validator` rules before the handler sees the value.
///
/// Malformed JSON and rule violations both come back through [`AppError`], so
/// clients get the usual envelope instead of axum's plain-text rejection.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

/// Parses a path id. Text that is not a 32-bit integer is reported the way
/// Postgres reports a bad integer literal (SQLSTATE 22P02). Zero and negative
/// ids parse fine and simply match no row.
pub fn parse_id(raw: &str) -> AppResult<i32> {
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    let parsed = if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        raw.parse::<i32>().ok()
    } else {
        None
    };
    match parsed {
        Some(id) => Ok(id),
        None => Err(AppError::Postgres {
            sqlstate: "22P02".to_string(),
            message: format!("invalid input syntax for type integer: \"{}\"", sanitize_for_logging(raw)),
        }),
    }
}

/// Sanitizes user input for logging purposes.
///
/// Control characters other than whitespace are dropped, quotes and
/// backslashes escaped, and the result capped at 200 characters.
pub fn sanitize_for_logging(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .take(200)
        .collect::<String>()
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\'', "\\\'")
}
