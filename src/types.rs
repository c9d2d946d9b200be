use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

/// Account role, stored as the Postgres enum `user_role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

// ---------------- Auth ----------------

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SignupRequest {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 3, max = 60, message = "Name must be between 3 and 60 characters"))]
    pub name: String,
    #[serde(deserialize_with = "normalized_email")]
    #[validate(
        email(message = "A valid email is required"),
        length(max = 100, message = "Email must be at most 100 characters")
    )]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(deserialize_with = "normalized_email")]
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
    pub user: crate::models::users::PublicUser,
}

// ---------------- Books ----------------

/// Raw query string for `GET /api/books`. Values are parsed leniently.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListBooksQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    #[serde(rename = "sortBy", alias = "sort_by")]
    pub sort_by: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBookRequest {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 200, message = "Title is required (max 200 characters)"))]
    pub title: String,
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 100, message = "Author is required (max 100 characters)"))]
    pub author: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Older clients send `summary` instead of `description`.
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    #[validate(url(message = "cover_url must be a valid URL"))]
    pub cover_url: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0, max = 9999, message = "published_year must be between 0 and 9999"))]
    pub published_year: Option<i32>,
    #[serde(default, deserialize_with = "string_or_number")]
    #[validate(length(max = 20, message = "gutenberg_id must be at most 20 characters"))]
    pub gutenberg_id: Option<String>,
    #[serde(default)]
    #[validate(url(message = "read_url must be a valid URL"))]
    pub read_url: Option<String>,
}

fn trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(String::deserialize(deserializer)?.trim().to_string())
}

fn trimmed_opt<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(|s| s.trim().to_string()))
}

/// Emails compare case-insensitively, so they are stored and looked up lowercased.
fn normalized_email<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(String::deserialize(deserializer)?.trim().to_lowercase())
}

/// Accepts `"1342"`, `1342` or `null`.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Int(i64),
    }
    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Str(s) => s,
        Raw::Int(n) => n.to_string(),
    }))
}

#[derive(Debug, Clone, Serialize)]
pub struct BookListResponse {
    pub success: bool,
    pub page: i64,
    pub limit: i64,
    #[serde(rename = "sortBy")]
    pub sort_by: &'static str,
    pub total: i64,
    #[serde(rename = "totalPages")]
    pub total_pages: i64,
    pub books: Vec<crate::models::books::BookWithStats>,
}

// ---------------- Reviews ----------------

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReviewRequest {
    #[validate(range(min = 1, max = 5, message = "Rating must be an integer between 1 and 5"))]
    pub rating: i32,
    #[serde(default, rename = "reviewText", alias = "review_text")]
    #[validate(length(max = 5000, message = "Review text must be at most 5000 characters"))]
    pub review_text: Option<String>,
}

// ---------------- Reading lists ----------------

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateReadingListRequest {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 100, message = "Name is required (max 100 characters)"))]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "isPublic", alias = "is_public")]
    pub is_public: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateReadingListRequest {
    #[serde(default, deserialize_with = "trimmed_opt")]
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "isPublic", alias = "is_public")]
    pub is_public: Option<bool>,
}
