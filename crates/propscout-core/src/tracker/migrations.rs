use sqlx::SqlitePool;

/// A single additive schema change, with its rollback. Schema evolution for
/// the tracker store must stay additive (spec §4.5 persistence note).
pub struct Migration {
    pub version: i32,
    pub up: &'static str,
    pub down: &'static str,
}

impl Migration {
    const fn new(version: i32, up: &'static str, down: &'static str) -> Self {
        Self { version, up, down }
    }
}

pub static MIGRATIONS: &[Migration] = &[
    Migration::new(
        1,
        r#"
        CREATE TABLE IF NOT EXISTS tracker_entries (
            url_hash TEXT PRIMARY KEY,
            property_url TEXT NOT NULL,
            first_seen_at TEXT NOT NULL,
            last_scraped_at TEXT NOT NULL,
            data_quality_score REAL NOT NULL DEFAULT 0,
            extraction_success INTEGER NOT NULL DEFAULT 0,
            scrape_count INTEGER NOT NULL DEFAULT 0
        )
        "#,
        "DROP TABLE IF EXISTS tracker_entries",
    ),
    Migration::new(
        2,
        "CREATE INDEX IF NOT EXISTS idx_tracker_last_scraped ON tracker_entries(last_scraped_at)",
        "DROP INDEX IF EXISTS idx_tracker_last_scraped",
    ),
];

pub async fn apply_migrations(pool: &SqlitePool) -> sqlx::Result<()> {
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        )"#,
    )
    .execute(pool)
    .await?;

    let applied: Vec<i32> = sqlx::query_scalar("SELECT version FROM migrations ORDER BY version")
        .fetch_all(pool)
        .await?;

    for migration in MIGRATIONS {
        if applied.contains(&migration.version) {
            continue;
        }
        sqlx::query(migration.up).execute(pool).await?;
        sqlx::query("INSERT INTO migrations (version, applied_at) VALUES (?, datetime('now'))")
            .bind(migration.version)
            .execute(pool)
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    #[tokio::test]
    async fn migrations_apply_cleanly_on_fresh_db() {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        apply_migrations(&pool).await.unwrap();
        let applied: Vec<i32> = sqlx::query_scalar("SELECT version FROM migrations ORDER BY version")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(applied, vec![1, 2]);
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        apply_migrations(&pool).await.unwrap();
        apply_migrations(&pool).await.unwrap();
    }
}
