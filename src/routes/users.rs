use axum::{extract::State, Json};

use crate::error::{AppResult, OptionExt};
use crate::middleware::AuthUser;
use crate::models::users::{self, UserProfile};
use crate::state::AppState;

/// GET /api/users/me
///
/// A token can outlive its account, hence the 404.
pub async fn me(State(state): State<AppState>, user: AuthUser) -> AppResult<Json<UserProfile>> {
    let profile = users::profile(&state.db, user.id).await?.ok_or_not_found("User")?;
    Ok(Json(profile))
}
