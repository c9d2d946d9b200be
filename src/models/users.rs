use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::{FromRow, PgPool};

use crate::types::Role;

/// Full account row, including the password hash. Never serialized.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// The account as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct PublicUser {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self { id: u.id, name: u.name, email: u.email, role: u.role }
    }
}

/// A review as listed on the owner's profile.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProfileReview {
    pub id: i32,
    pub book_id: i32,
    pub book_title: String,
    pub rating: i32,
    pub review_text: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: PublicUser,
    pub reviews: Vec<ProfileReview>,
}

pub async fn find_by_email(db: &PgPool, email: &str) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>(
        "SELECT id, name, email, password_hash, role FROM users WHERE email = $1",
    )
    .bind(email)
    .fetch_optional(db)
    .await
}

pub async fn find_public(db: &PgPool, id: i32) -> sqlx::Result<Option<PublicUser>> {
    sqlx::query_as::<_, PublicUser>("SELECT id, name, email, role FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn create(
    db: &PgPool,
    name: &str,
    email: &str,
    password_hash: &str,
    role: Role,
) -> sqlx::Result<PublicUser> {
    sqlx::query_as::<_, PublicUser>(
        r#"INSERT INTO users (name, email, password_hash, role)
           VALUES ($1, $2, $3, $4)
           RETURNING id, name, email, role"#,
    )
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_one(db)
    .await
}

/// Profile of `id` with every review the user wrote, newest first.
pub async fn profile(db: &PgPool, id: i32) -> sqlx::Result<Option<UserProfile>> {
    let Some(user) = find_public(db, id).await? else {
        return Ok(None);
    };
    let reviews = sqlx::query_as::<_, ProfileReview>(
        r#"SELECT r.id, r.book_id, b.title AS book_title, r.rating, r.review_text, r.created_at
           FROM reviews r
           JOIN books b ON b.id = r.book_id
           WHERE r.user_id = $1
           ORDER BY r.created_at DESC, r.id DESC"#,
    )
    .bind(id)
    .fetch_all(db)
    .await?;
    Ok(Some(UserProfile { user, reviews }))
}
