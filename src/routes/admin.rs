use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::middleware::validation::parse_id;
use crate::middleware::AuthUser;
use crate::models::reviews;
use crate::state::AppState;

/// GET /api/admin/reviews
pub async fn list_reviews(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let rows = reviews::all_for_moderation(&state.db).await?;
    Ok(Json(json!({ "success": true, "reviews": rows })))
}

/// DELETE /api/admin/reviews/{id}
pub async fn delete_review(
    State(state): State<AppState>,
    admin: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let id = parse_id(&id)?;
    if !reviews::delete(&state.db, id).await? {
        return Err(AppError::NotFound("Review not found.".to_string()));
    }
    state.metrics.inc_reviews_moderated();
    tracing::info!("Admin {} removed review {}", admin.id, id);
    Ok(Json(json!({ "success": true, "message": "Review deleted successfully" })))
}
