//! Reading lists. Every route sits behind `authenticate`; writes are limited
//! to the caller's own lists and reads to own or public ones. A list the
//! caller may not see is reported as missing rather than forbidden.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::error::{AppError, AppResult, OptionExt};
use crate::middleware::validation::parse_id;
use crate::middleware::{AuthUser, ValidatedJson};
use crate::models::reading_lists::{self, ReadingList};
use crate::state::AppState;
use crate::types::{CreateReadingListRequest, UpdateReadingListRequest};

fn list_not_found() -> AppError {
    AppError::NotFound("List not found".to_string())
}

fn non_blank(v: Option<&str>) -> Option<&str> {
    v.map(str::trim).filter(|s| !s.is_empty())
}

/// GET /api/reading-lists
pub async fn list_reading_lists(State(state): State<AppState>, user: AuthUser) -> AppResult<Json<Value>> {
    let lists = reading_lists::for_user(&state.db, user.id).await?;
    Ok(Json(json!({ "success": true, "lists": lists })))
}

/// POST /api/reading-lists
pub async fn create_reading_list(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<CreateReadingListRequest>,
) -> AppResult<(StatusCode, Json<ReadingList>)> {
    let list = reading_lists::create(
        &state.db,
        user.id,
        &req.name,
        non_blank(req.description.as_deref()),
        req.is_public.unwrap_or(true),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(list)))
}

/// GET /api/reading-lists/{id}
pub async fn get_reading_list(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let id = parse_id(&id)?;
    let list = reading_lists::find_visible(&state.db, id, user.id).await?.ok_or_not_found("List")?;
    let books = reading_lists::books(&state.db, id).await?;
    Ok(Json(json!({ "success": true, "list": list, "books": books })))
}

/// PUT /api/reading-lists/{id}
pub async fn update_reading_list(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdateReadingListRequest>,
) -> AppResult<Json<ReadingList>> {
    let id = parse_id(&id)?;
    let list = reading_lists::update(
        &state.db,
        id,
        user.id,
        req.name.as_deref(),
        req.description.as_deref(),
        req.is_public,
    )
    .await?
    .ok_or_else(list_not_found)?;
    Ok(Json(list))
}

/// DELETE /api/reading-lists/{id}
pub async fn delete_reading_list(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let id = parse_id(&id)?;
    if !reading_lists::delete(&state.db, id, user.id).await? {
        return Err(list_not_found());
    }
    Ok(Json(json!({ "success": true, "message": "List deleted" })))
}

/// POST /api/reading-lists/{id}/books/{book_id}
///
/// Adding a book that is already on the list succeeds with `added: false`.
pub async fn add_book(
    State(state): State<AppState>,
    user: AuthUser,
    Path((list_id, book_id)): Path<(String, String)>,
) -> AppResult<Json<Value>> {
    let list_id = parse_id(&list_id)?;
    let book_id = parse_id(&book_id)?;
    if !reading_lists::is_owner(&state.db, list_id, user.id).await? {
        return Err(list_not_found());
    }
    let added = reading_lists::add_book(&state.db, list_id, book_id).await?;
    let message = if added { "Book added to list" } else { "Book is already in the list" };
    Ok(Json(json!({ "success": true, "added": added, "message": message })))
}

/// DELETE /api/reading-lists/{id}/books/{book_id}
pub async fn remove_book(
    State(state): State<AppState>,
    user: AuthUser,
    Path((list_id, book_id)): Path<(String, String)>,
) -> AppResult<Json<Value>> {
    let list_id = parse_id(&list_id)?;
    let book_id = parse_id(&book_id)?;
    if !reading_lists::is_owner(&state.db, list_id, user.id).await? {
        return Err(list_not_found());
    }
    let removed = reading_lists::remove_book(&state.db, list_id, book_id).await?;
    let message = if removed { "Book removed from list" } else { "Book was not in the list" };
    Ok(Json(json!({ "success": true, "removed": removed, "message": message })))
}
