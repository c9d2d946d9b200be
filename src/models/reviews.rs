use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::{FromRow, PgPool};

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Review {
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub rating: i32,
    pub review_text: Option<String>,
    pub created_at: NaiveDateTime,
}

/// A review on a book page, with the reviewer's display name.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BookReview {
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub rating: i32,
    pub review_text: Option<String>,
    pub created_at: NaiveDateTime,
    pub user_name: String,
}

/// A review in the moderation queue, with author and book names joined in.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ModerationReview {
    pub id: i32,
    pub rating: i32,
    pub review_text: Option<String>,
    pub created_at: NaiveDateTime,
    pub user_id: i32,
    pub user_name: String,
    pub book_id: i32,
    pub book_title: String,
}

/// Inserts or overwrites the caller's review of a book.
///
/// A user holds at most one review per book: a second submission replaces
/// rating, text and timestamp in the same statement, so concurrent posts
/// from the same user resolve inside Postgres.
pub async fn upsert(
    db: &PgPool,
    user_id: i32,
    book_id: i32,
    rating: i32,
    review_text: Option<&str>,
) -> sqlx::Result<Review> {
    sqlx::query_as::<_, Review>(
        r#"INSERT INTO reviews (user_id, book_id, rating, review_text)
           VALUES ($1, $2, $3, $4)
           ON CONFLICT (user_id, book_id)
           DO UPDATE SET rating = EXCLUDED.rating,
                         review_text = EXCLUDED.review_text,
                         created_at = NOW()
           RETURNING id, user_id, book_id, rating, review_text, created_at"#,
    )
    .bind(user_id)
    .bind(book_id)
    .bind(rating)
    .bind(review_text)
    .fetch_one(db)
    .await
}

pub async fn for_book(db: &PgPool, book_id: i32) -> sqlx::Result<Vec<BookReview>> {
    sqlx::query_as::<_, BookReview>(
        r#"SELECT r.id, r.user_id, r.book_id, r.rating, r.review_text, r.created_at,
                  u.name AS user_name
           FROM reviews r
           JOIN users u ON u.id = r.user_id
           WHERE r.book_id = $1
           ORDER BY r.created_at DESC, r.id DESC"#,
    )
    .bind(book_id)
    .fetch_all(db)
    .await
}

pub async fn all_for_moderation(db: &PgPool) -> sqlx::Result<Vec<ModerationReview>> {
    sqlx::query_as::<_, ModerationReview>(
        r#"SELECT r.id, r.rating, r.review_text, r.created_at,
                  u.id AS user_id, u.name AS user_name,
                  b.id AS book_id, b.title AS book_title
           FROM reviews r
           JOIN users u ON u.id = r.user_id
           JOIN books b ON b.id = r.book_id
           ORDER BY r.created_at DESC, r.id DESC"#,
    )
    .fetch_all(db)
    .await
}

pub async fn delete(db: &PgPool, id: i32) -> sqlx::Result<bool> {
    let res = sqlx::query("DELETE FROM reviews WHERE id = $1").bind(id).execute(db).await?;
    Ok(res.rows_affected() > 0)
}
