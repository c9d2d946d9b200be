use serde::Serialize;
use sqlx::{FromRow, PgPool};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 5;
pub const MAX_LIMIT: i64 = 100;

/// Book columns plus rating aggregates. Stats are derived on every read, never stored.
const BOOK_STATS_SELECT: &str = r#"SELECT b.id, b.title, b.author, b.description, b.cover_url,
        b.published_year, b.gutenberg_id, b.read_url,
        COALESCE(ROUND(AVG(r.rating), 1), 0)::float8 AS avg_rating,
        COUNT(r.id)::int4 AS review_count
   FROM books b
   LEFT JOIN reviews r ON r.book_id = b.id"#;

const BOOK_COLUMNS: &str =
    "id, title, author, description, cover_url, published_year, gutenberg_id, read_url";

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub description: String,
    pub cover_url: Option<String>,
    pub published_year: Option<i32>,
    pub gutenberg_id: Option<String>,
    pub read_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct BookWithStats {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub description: String,
    pub cover_url: Option<String>,
    pub published_year: Option<i32>,
    pub gutenberg_id: Option<String>,
    pub read_url: Option<String>,
    /// Mean rating rounded to one decimal; 0 without reviews.
    pub avg_rating: f64,
    pub review_count: i32,
}

/// Input for [`create`], already trimmed and defaulted by the handler.
#[derive(Debug, Clone, Default)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub description: String,
    pub cover_url: Option<String>,
    pub published_year: Option<i32>,
    pub gutenberg_id: Option<String>,
    pub read_url: Option<String>,
}

/// Sort orders accepted by `GET /api/books?sortBy=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    #[default]
    Newest,
    Title,
    YearNew,
    YearOld,
}

impl SortBy {
    /// Unknown or missing values fall back to `Newest`.
    pub fn from_param(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("title") => SortBy::Title,
            Some("year_new") => SortBy::YearNew,
            Some("year_old") => SortBy::YearOld,
            _ => SortBy::Newest,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortBy::Newest => "newest",
            SortBy::Title => "title",
            SortBy::YearNew => "year_new",
            SortBy::YearOld => "year_old",
        }
    }

    /// ORDER BY clause. Always a static string; request input never reaches the SQL text.
    pub fn order_clause(&self) -> &'static str {
        match self {
            SortBy::Newest => "b.id DESC",
            SortBy::Title => "b.title ASC, b.id ASC",
            SortBy::YearNew => "b.published_year DESC NULLS LAST, b.id DESC",
            SortBy::YearOld => "b.published_year ASC NULLS LAST, b.id ASC",
        }
    }
}

/// Page/limit pair after lenient parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Pagination {
    /// Missing, non-numeric or non-positive values fall back to the defaults; limit is capped.
    pub fn from_params(page: Option<&str>, limit: Option<&str>) -> Self {
        let parse = |v: Option<&str>| v.and_then(|s| s.trim().parse::<i64>().ok()).filter(|n| *n > 0);
        Self {
            page: parse(page).unwrap_or(DEFAULT_PAGE),
            limit: parse(limit).unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        if total <= 0 {
            0
        } else {
            (total + self.limit - 1) / self.limit
        }
    }
}

const LIKE_ESCAPE: char = '!';

/// Escapes LIKE metacharacters so the search term matches literally.
pub fn escape_like_pattern(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | LIKE_ESCAPE) {
            out.push(LIKE_ESCAPE);
        }
        out.push(ch);
    }
    out
}

/// One page of books with stats, plus the total number of books.
pub async fn list(
    db: &PgPool,
    pagination: Pagination,
    sort: SortBy,
) -> sqlx::Result<(Vec<BookWithStats>, i64)> {
    let sql = format!(
        "{} GROUP BY b.id ORDER BY {} LIMIT $1 OFFSET $2",
        BOOK_STATS_SELECT,
        sort.order_clause()
    );
    let rows = sqlx::query_as::<_, BookWithStats>(&sql)
        .bind(pagination.limit)
        .bind(pagination.offset())
        .fetch_all(db)
        .await?;
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*)::int8 FROM books").fetch_one(db).await?;
    Ok((rows, total))
}

/// Case-insensitive substring match on title or author.
pub async fn search(db: &PgPool, term: &str) -> sqlx::Result<Vec<BookWithStats>> {
    let sql = format!(
        "{} WHERE b.title ILIKE $1 ESCAPE '{esc}' OR b.author ILIKE $1 ESCAPE '{esc}' GROUP BY b.id ORDER BY b.id",
        BOOK_STATS_SELECT,
        esc = LIKE_ESCAPE
    );
    sqlx::query_as::<_, BookWithStats>(&sql)
        .bind(format!("%{}%", escape_like_pattern(term)))
        .fetch_all(db)
        .await
}

/// Highest average among reviewed books, ties broken by review count.
pub async fn top_rated(db: &PgPool) -> sqlx::Result<Option<BookWithStats>> {
    let sql = format!(
        "{} GROUP BY b.id HAVING COUNT(r.id) > 0 ORDER BY AVG(r.rating) DESC, COUNT(r.id) DESC, b.id ASC LIMIT 1",
        BOOK_STATS_SELECT
    );
    sqlx::query_as::<_, BookWithStats>(&sql).fetch_optional(db).await
}

/// Every book ranked by rating.
pub async fn ranked_by_rating(db: &PgPool) -> sqlx::Result<Vec<BookWithStats>> {
    let sql = format!(
        "{} GROUP BY b.id ORDER BY avg_rating DESC, review_count DESC, b.id ASC",
        BOOK_STATS_SELECT
    );
    sqlx::query_as::<_, BookWithStats>(&sql).fetch_all(db).await
}

pub async fn find_with_stats(db: &PgPool, id: i32) -> sqlx::Result<Option<BookWithStats>> {
    let sql = format!("{} WHERE b.id = $1 GROUP BY b.id", BOOK_STATS_SELECT);
    sqlx::query_as::<_, BookWithStats>(&sql).bind(id).fetch_optional(db).await
}

pub async fn create(db: &PgPool, book: &NewBook) -> sqlx::Result<Book> {
    let sql = format!(
        r#"INSERT INTO books (title, author, description, cover_url, published_year, gutenberg_id, read_url)
           VALUES ($1, $2, $3, $4, $5, $6, $7)
           RETURNING {}"#,
        BOOK_COLUMNS
    );
    sqlx::query_as::<_, Book>(&sql)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.description)
        .bind(&book.cover_url)
        .bind(book.published_year)
        .bind(&book.gutenberg_id)
        .bind(&book.read_url)
        .fetch_one(db)
        .await
}

/// Deletes a book; reviews and list memberships go with it via ON DELETE CASCADE.
pub async fn delete(db: &PgPool, id: i32) -> sqlx::Result<bool> {
    let res = sqlx::query("DELETE FROM books WHERE id = $1").bind(id).execute(db).await?;
    Ok(res.rows_affected() > 0)
}
