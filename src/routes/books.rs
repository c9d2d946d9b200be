use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::error::{AppError, AppResult, OptionExt};
use crate::middleware::validation::{parse_id, sanitize_for_logging};
use crate::middleware::{AuthUser, ValidatedJson};
use crate::models::books::{self, Book, NewBook, Pagination, SortBy};
use crate::state::AppState;
use crate::types::{BookListResponse, CreateBookRequest, ListBooksQuery, SearchQuery};

const MAX_QUERY_LEN: usize = 200;

/// GET /api/books
pub async fn list_books(
    State(state): State<AppState>,
    Query(q): Query<ListBooksQuery>,
) -> AppResult<Json<BookListResponse>> {
    let pagination = Pagination::from_params(q.page.as_deref(), q.limit.as_deref());
    let sort = SortBy::from_param(q.sort_by.as_deref());
    let (rows, total) = books::list(&state.db, pagination, sort).await?;
    Ok(Json(BookListResponse {
        success: true,
        page: pagination.page,
        limit: pagination.limit,
        sort_by: sort.as_str(),
        total,
        total_pages: pagination.total_pages(total),
        books: rows,
    }))
}

/// GET /api/books/search?q=
pub async fn search_books(
    State(state): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> AppResult<Json<Value>> {
    let term = q.q.as_deref().map(str::trim).unwrap_or_default();
    if term.is_empty() {
        return Err(AppError::BadRequest("Query parameter 'q' is required.".to_string()));
    }
    if term.chars().count() > MAX_QUERY_LEN {
        return Err(AppError::BadRequest(format!(
            "Query parameter 'q' must be at most {} characters.",
            MAX_QUERY_LEN
        )));
    }
    tracing::debug!("Book search for {}", sanitize_for_logging(term));
    let rows = books::search(&state.db, term).await?;
    Ok(Json(json!({ "success": true, "books": rows })))
}

/// GET /api/books/top-rated
pub async fn top_rated(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let book = books::top_rated(&state.db).await?;
    Ok(Json(json!({ "success": true, "book": book })))
}

/// GET /api/books/{id}
pub async fn get_book(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Value>> {
    let id = parse_id(&id)?;
    let book = books::find_with_stats(&state.db, id).await?.ok_or_not_found("Book")?;
    Ok(Json(json!({ "success": true, "book": book })))
}

/// POST /api/books (admin)
pub async fn add_book(
    State(state): State<AppState>,
    admin: AuthUser,
    ValidatedJson(req): ValidatedJson<CreateBookRequest>,
) -> AppResult<(StatusCode, Json<Book>)> {
    let non_blank = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    let new_book = NewBook {
        title: req.title,
        author: req.author,
        description: non_blank(req.description).or(non_blank(req.summary)).unwrap_or_default(),
        cover_url: non_blank(req.cover_url),
        published_year: req.published_year,
        gutenberg_id: non_blank(req.gutenberg_id),
        read_url: non_blank(req.read_url),
    };

    let book = books::create(&state.db, &new_book).await.map_err(|e| match AppError::from(e) {
        AppError::Postgres { sqlstate, .. } if sqlstate == "23505" => {
            AppError::Conflict("A book with this title and author already exists.".to_string())
        }
        other => other,
    })?;

    state.metrics.inc_books_created();
    tracing::info!("Admin {} added book {}", admin.id, book.id);
    Ok((StatusCode::CREATED, Json(book)))
}

/// DELETE /api/books/{id} (admin)
pub async fn delete_book(
    State(state): State<AppState>,
    admin: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let id = parse_id(&id)?;
    if !books::delete(&state.db, id).await? {
        return Err(AppError::NotFound("Book not found.".to_string()));
    }
    state.metrics.inc_books_deleted();
    tracing::info!("Admin {} deleted book {}", admin.id, id);
    Ok(Json(json!({ "success": true, "message": "Book deleted successfully" })))
}
