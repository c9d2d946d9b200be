use sqlx::{PgConnection, PgPool};

/// Statements that must succeed for the server to start. Each one is idempotent.
const SCHEMA: &[(&str, &str)] = &[
    (
        "user_role type",
        r#"DO $$ BEGIN
             IF NOT EXISTS (SELECT 1 FROM pg_type WHERE typname = 'user_role') THEN
               CREATE TYPE user_role AS ENUM ('user', 'admin');
             END IF;
           END $$"#,
    ),
    (
        "users table",
        r#"CREATE TABLE IF NOT EXISTS users (
            id SERIAL PRIMARY KEY,
            name VARCHAR(60) NOT NULL,
            email VARCHAR(100) UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            role user_role NOT NULL DEFAULT 'user'
        )"#,
    ),
    (
        "books table",
        r#"CREATE TABLE IF NOT EXISTS books (
            id SERIAL PRIMARY KEY,
            title VARCHAR(200) NOT NULL,
            author VARCHAR(100) NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            cover_url TEXT,
            published_year INTEGER,
            gutenberg_id VARCHAR(20),
            read_url TEXT
        )"#,
    ),
    (
        "reviews table",
        r#"CREATE TABLE IF NOT EXISTS reviews (
            id SERIAL PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            book_id INTEGER NOT NULL REFERENCES books(id) ON DELETE CASCADE,
            rating INTEGER NOT NULL CHECK (rating >= 1 AND rating <= 5),
            review_text TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (user_id, book_id)
        )"#,
    ),
    (
        "reading_lists table",
        r#"CREATE TABLE IF NOT EXISTS reading_lists (
            id SERIAL PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            name VARCHAR(100) NOT NULL,
            description TEXT,
            is_public BOOLEAN NOT NULL DEFAULT true,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )"#,
    ),
    (
        "reading_list_books table",
        r#"CREATE TABLE IF NOT EXISTS reading_list_books (
            id SERIAL PRIMARY KEY,
            reading_list_id INTEGER NOT NULL REFERENCES reading_lists(id) ON DELETE CASCADE,
            book_id INTEGER NOT NULL REFERENCES books(id) ON DELETE CASCADE,
            added_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (reading_list_id, book_id)
        )"#,
    ),
];

/// Columns added after the first release. Older databases pick them up on start.
const BOOK_COLUMNS: &[(&str, &str)] = &[
    ("cover_url", "TEXT"),
    ("published_year", "INTEGER"),
    ("gutenberg_id", "VARCHAR(20)"),
    ("read_url", "TEXT"),
];

const INDEXES: &[(&str, &str)] = &[
    ("idx_books_title", "CREATE INDEX IF NOT EXISTS idx_books_title ON books(title)"),
    ("idx_books_author", "CREATE INDEX IF NOT EXISTS idx_books_author ON books(author)"),
    ("idx_reviews_book_id", "CREATE INDEX IF NOT EXISTS idx_reviews_book_id ON reviews(book_id)"),
    ("idx_reviews_user_id", "CREATE INDEX IF NOT EXISTS idx_reviews_user_id ON reviews(user_id)"),
    (
        "idx_reading_list_user_id",
        "CREATE INDEX IF NOT EXISTS idx_reading_list_user_id ON reading_lists(user_id)",
    ),
    (
        "idx_reading_list_books_book_id",
        "CREATE INDEX IF NOT EXISTS idx_reading_list_books_book_id ON reading_list_books(book_id)",
    ),
];

/// Arbitrary key for the advisory lock that serializes concurrent migrators.
const MIGRATION_LOCK_KEY: i64 = 0x626f_6f6b_7368_656c;

/// Brings the schema up to date. Safe to run on every start and from several processes at once.
pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    tracing::info!("Checking database schema...");

    let mut tx = pool.begin().await?;
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(MIGRATION_LOCK_KEY)
        .execute(&mut *tx)
        .await?;

    for (name, sql) in SCHEMA {
        sqlx::raw_sql(sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| anyhow::anyhow!("Migration step '{}' failed: {}", name, e))?;
    }

    for (column, ty) in BOOK_COLUMNS {
        let sql = format!("ALTER TABLE books ADD COLUMN IF NOT EXISTS {} {}", column, ty);
        sqlx::raw_sql(&sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| anyhow::anyhow!("Adding books.{} failed: {}", column, e))?;
    }
    // gutenberg_id used to be an INTEGER
    sqlx::raw_sql("ALTER TABLE books ALTER COLUMN gutenberg_id TYPE VARCHAR(20) USING gutenberg_id::text")
        .execute(&mut *tx)
        .await?;
    sqlx::raw_sql("ALTER TABLE books DROP COLUMN IF EXISTS buy_url").execute(&mut *tx).await?;
    sqlx::raw_sql("ALTER TABLE books DROP COLUMN IF EXISTS isbn").execute(&mut *tx).await?;

    rename_legacy_summary(&mut *tx).await?;

    // Deduplicate before adding the unique constraint; the newest copy wins
    let removed = sqlx::raw_sql(
        "DELETE FROM books a USING books b WHERE a.id < b.id AND a.title = b.title AND a.author = b.author",
    )
    .execute(&mut *tx)
    .await?
    .rows_affected();
    if removed > 0 {
        tracing::warn!("Removed {} duplicate book rows before enforcing unique (title, author)", removed);
    }

    sqlx::raw_sql(
        r#"DO $$ BEGIN
             IF EXISTS (SELECT 1 FROM pg_constraint WHERE conname = 'books_title_author_key') THEN
               ALTER TABLE books DROP CONSTRAINT books_title_author_key;
             END IF;
             IF NOT EXISTS (SELECT 1 FROM pg_constraint WHERE conname = 'unique_title_author') THEN
               ALTER TABLE books ADD CONSTRAINT unique_title_author UNIQUE (title, author);
             END IF;
           END $$"#,
    )
    .execute(&mut *tx)
    .await
    .map_err(|e| anyhow::anyhow!("Adding unique_title_author failed: {}", e))?;

    tx.commit().await?;

    // Index failures are not fatal; queries still work, only slower
    for (name, sql) in INDEXES {
        if let Err(e) = sqlx::raw_sql(sql).execute(pool).await {
            tracing::warn!("Failed to create index {}: {}", name, e);
        }
    }

    tracing::info!("Database schema is up to date.");
    Ok(())
}

/// Renames `books.summary` to `description` on databases from before the rename.
async fn rename_legacy_summary(conn: &mut PgConnection) -> anyhow::Result<()> {
    let has_column = |column: &'static str| {
        sqlx::query_scalar::<_, bool>(
            r#"SELECT EXISTS (
                 SELECT 1 FROM information_schema.columns
                 WHERE table_name = 'books' AND column_name = $1
               )"#,
        )
        .bind(column)
    };
    let has_summary = has_column("summary").fetch_one(&mut *conn).await?;
    if !has_summary {
        return Ok(());
    }
    let has_description = has_column("description").fetch_one(&mut *conn).await?;
    if has_description {
        sqlx::raw_sql("UPDATE books SET description = summary WHERE description = '' AND summary IS NOT NULL")
            .execute(&mut *conn)
            .await?;
        sqlx::raw_sql("ALTER TABLE books DROP COLUMN summary").execute(&mut *conn).await?;
    } else {
        sqlx::raw_sql("ALTER TABLE books RENAME COLUMN summary TO description")
            .execute(&mut *conn)
            .await?;
    }
    tracing::info!("Migrated books.summary -> books.description");
    Ok(())
}
