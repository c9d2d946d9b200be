use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::{FromRow, PgPool};

use super::books::Book;

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct ReadingList {
    pub id: i32,
    pub user_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub created_at: NaiveDateTime,
}

/// Row for the caller's overview page.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ReadingListSummary {
    pub id: i32,
    pub user_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub created_at: NaiveDateTime,
    pub book_count: i32,
}

/// A single list as shown on its detail page.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ReadingListDetail {
    pub id: i32,
    pub user_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub created_at: NaiveDateTime,
    pub creator_name: String,
}

const LIST_COLUMNS: &str =
    "id, user_id, name, description, COALESCE(is_public, true) AS is_public, created_at";

pub async fn for_user(db: &PgPool, user_id: i32) -> sqlx::Result<Vec<ReadingListSummary>> {
    sqlx::query_as::<_, ReadingListSummary>(
        r#"SELECT rl.id, rl.user_id, rl.name, rl.description,
                  COALESCE(rl.is_public, true) AS is_public, rl.created_at,
                  COUNT(rlb.book_id)::int4 AS book_count
           FROM reading_lists rl
           LEFT JOIN reading_list_books rlb ON rlb.reading_list_id = rl.id
           WHERE rl.user_id = $1
           GROUP BY rl.id
           ORDER BY rl.created_at DESC, rl.id DESC"#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await
}

pub async fn create(
    db: &PgPool,
    user_id: i32,
    name: &str,
    description: Option<&str>,
    is_public: bool,
) -> sqlx::Result<ReadingList> {
    let sql = format!(
        "INSERT INTO reading_lists (user_id, name, description, is_public) VALUES ($1, $2, $3, $4) RETURNING {}",
        LIST_COLUMNS
    );
    sqlx::query_as::<_, ReadingList>(&sql)
        .bind(user_id)
        .bind(name)
        .bind(description)
        .bind(is_public)
        .fetch_one(db)
        .await
}

/// Returns the list when `viewer_id` owns it or it is public.
pub async fn find_visible(
    db: &PgPool,
    id: i32,
    viewer_id: i32,
) -> sqlx::Result<Option<ReadingListDetail>> {
    sqlx::query_as::<_, ReadingListDetail>(
        r#"SELECT rl.id, rl.user_id, rl.name, rl.description,
                  COALESCE(rl.is_public, true) AS is_public, rl.created_at,
                  u.name AS creator_name
           FROM reading_lists rl
           JOIN users u ON u.id = rl.user_id
           WHERE rl.id = $1 AND (rl.user_id = $2 OR COALESCE(rl.is_public, true))"#,
    )
    .bind(id)
    .bind(viewer_id)
    .fetch_optional(db)
    .await
}

pub async fn is_owner(db: &PgPool, id: i32, user_id: i32) -> sqlx::Result<bool> {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM reading_lists WHERE id = $1 AND user_id = $2)")
        .bind(id)
        .bind(user_id)
        .fetch_one(db)
        .await
}

/// Partial update; `None` keeps the stored value.
pub async fn update(
    db: &PgPool,
    id: i32,
    user_id: i32,
    name: Option<&str>,
    description: Option<&str>,
    is_public: Option<bool>,
) -> sqlx::Result<Option<ReadingList>> {
    let sql = format!(
        r#"UPDATE reading_lists
           SET name = COALESCE($3, name),
               description = COALESCE($4, description),
               is_public = COALESCE($5, is_public)
           WHERE id = $1 AND user_id = $2
           RETURNING {}"#,
        LIST_COLUMNS
    );
    sqlx::query_as::<_, ReadingList>(&sql)
        .bind(id)
        .bind(user_id)
        .bind(name)
        .bind(description)
        .bind(is_public)
        .fetch_optional(db)
        .await
}

pub async fn delete(db: &PgPool, id: i32, user_id: i32) -> sqlx::Result<bool> {
    let res = sqlx::query("DELETE FROM reading_lists WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}

/// Adds a membership. Returns `false` when the book was already on the list.
pub async fn add_book(db: &PgPool, list_id: i32, book_id: i32) -> sqlx::Result<bool> {
    let res = sqlx::query(
        "INSERT INTO reading_list_books (reading_list_id, book_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(list_id)
    .bind(book_id)
    .execute(db)
    .await?;
    Ok(res.rows_affected() > 0)
}

/// Removes a membership. Returns `false` when the book was not on the list.
pub async fn remove_book(db: &PgPool, list_id: i32, book_id: i32) -> sqlx::Result<bool> {
    let res = sqlx::query("DELETE FROM reading_list_books WHERE reading_list_id = $1 AND book_id = $2")
        .bind(list_id)
        .bind(book_id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}

/// Books on a list, most recently added first.
pub async fn books(db: &PgPool, list_id: i32) -> sqlx::Result<Vec<Book>> {
    sqlx::query_as::<_, Book>(
        r#"SELECT b.id, b.title, b.author, b.description, b.cover_url, b.published_year,
                  b.gutenberg_id, b.read_url
           FROM books b
           JOIN reading_list_books rlb ON rlb.book_id = b.id
           WHERE rlb.reading_list_id = $1
           ORDER BY rlb.added_at DESC, b.id DESC"#,
    )
    .bind(list_id)
    .fetch_all(db)
    .await
}
