use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::error::AppResult;
use crate::middleware::validation::parse_id;
use crate::middleware::{AuthUser, ValidatedJson};
use crate::models::books::{self, BookWithStats};
use crate::models::reviews::{self, BookReview, Review};
use crate::state::AppState;
use crate::types::ReviewRequest;

/// POST /api/books/{id}/reviews
///
/// Creates the caller's review or replaces the existing one. A book id with
/// no row behind it fails the foreign key and comes back as 400.
pub async fn post_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(book_id): Path<String>,
    ValidatedJson(req): ValidatedJson<ReviewRequest>,
) -> AppResult<(StatusCode, Json<Review>)> {
    let book_id = parse_id(&book_id)?;
    let text = req.review_text.as_deref().map(str::trim).filter(|t| !t.is_empty());
    let review = reviews::upsert(&state.db, user.id, book_id, req.rating, text).await?;
    state.metrics.inc_reviews_upserted();
    Ok((StatusCode::CREATED, Json(review)))
}

/// GET /api/books/{id}/reviews
pub async fn get_book_reviews(
    State(state): State<AppState>,
    Path(book_id): Path<String>,
) -> AppResult<Json<Vec<BookReview>>> {
    let book_id = parse_id(&book_id)?;
    Ok(Json(reviews::for_book(&state.db, book_id).await?))
}

/// GET /api/books/ratings
pub async fn list_books_with_ratings(State(state): State<AppState>) -> AppResult<Json<Vec<BookWithStats>>> {
    Ok(Json(books::ranked_by_rating(&state.db).await?))
}
