//! SQLite-backed reference store
//!
//! One row per (identifier, field). Any process opening the same database
//! file sees the same entries.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use std::path::Path;
use tracing::{debug, info};

use super::{ReferenceEntry, ReferenceStore};
use crate::Result;

#[derive(Clone)]
pub struct SqliteReferenceStore {
    pool: SqlitePool,
}

impl SqliteReferenceStore {
    /// Open (creating if needed) the database file at `db_path`
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // mode=rwc: read, write, create
        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
        debug!("Connecting to reference database: {}", db_url);

        let pool = SqlitePool::connect(&db_url).await?;
        Self::from_pool(pool).await
    }

    /// Private in-memory database, for tests
    ///
    /// Limited to one connection: every SQLite in-memory connection is its own database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, creating the table if missing
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        init_tables(&pool).await?;
        Ok(Self { pool })
    }
}

async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reference_fields (
            reference_id TEXT NOT NULL,
            field TEXT NOT NULL,
            value BLOB NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (reference_id, field)
        )
        "#,
    )
    .execute(pool)
    .await?;

    info!("Reference store table initialized (reference_fields)");
    Ok(())
}

#[async_trait]
impl ReferenceStore for SqliteReferenceStore {
    async fn get(&self, id: &str) -> Result<Option<ReferenceEntry>> {
        let rows = sqlx::query("SELECT field, value FROM reference_fields WHERE reference_id = ?")
            .bind(id)
            .fetch_all(&self.pool)
            .await?;

        if rows.is_empty() {
            return Ok(None);
        }

        let mut entry = ReferenceEntry::default();
        for row in rows {
            let field: String = row.try_get("field")?;
            let value: Vec<u8> = row.try_get("value")?;
            entry.fields.insert(field, value);
        }
        Ok(Some(entry))
    }

    async fn put(&self, id: &str, field: &str, value: Vec<u8>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO reference_fields (reference_id, field, value, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (reference_id, field)
            DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(id)
        .bind(field)
        .bind(value)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}
