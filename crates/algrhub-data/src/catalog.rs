//! `PostgreSQL` implementation of the algorithm catalog.

use algrhub_intake::{AlgorithmCatalog, AlgorithmRecord, CatalogError, CatalogResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::debug;

use crate::error::{DataError, Result};

const MAX_CONNECTIONS: u32 = 5;

const INSERT_ALGORITHM: &str = r"
    INSERT INTO algorithm (name, description, path, language, owner_id, sha256, size_bytes, stored_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
    ON CONFLICT (path) DO NOTHING
";

const SELECT_ALGORITHMS: &str = r"
    SELECT name, description, path, language, owner_id, sha256, size_bytes, stored_at
    FROM algorithm
    WHERE ($1::TEXT IS NULL OR language = $1)
    ORDER BY stored_at, id
";

/// Apply the catalog migrations.
///
/// # Errors
///
/// Returns an error when migration execution fails.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    let mut migrator = sqlx::migrate!("./migrations");
    migrator.set_ignore_missing(true);
    migrator
        .run(pool)
        .await
        .map_err(|source| DataError::MigrationFailed { source })?;
    Ok(())
}

/// Catalog stored in the `algorithm` table.
#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    /// Connect to `url` and apply pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the database is unreachable or migrations fail.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(url)
            .await
            .map_err(|source| DataError::query("connect", source))?;
        Self::new(pool).await
    }

    /// Wrap an existing pool, applying pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if migrations fail.
    pub async fn new(pool: PgPool) -> Result<Self> {
        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Access the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert `record`; returns `false` when its path was already catalogued.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn insert(&self, record: &AlgorithmRecord) -> Result<bool> {
        let size_bytes = i64::try_from(record.size_bytes).unwrap_or(i64::MAX);
        let outcome = sqlx::query(INSERT_ALGORITHM)
            .bind(&record.name)
            .bind(&record.description)
            .bind(&record.path)
            .bind(&record.language)
            .bind(record.owner_id.as_deref())
            .bind(&record.sha256)
            .bind(size_bytes)
            .bind(record.stored_at)
            .execute(&self.pool)
            .await
            .map_err(|source| DataError::query("insert_algorithm", source))?;
        Ok(outcome.rows_affected() > 0)
    }

    /// Catalogued packages, oldest first, optionally for one language.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row cannot be decoded.
    pub async fn list_algorithms(&self, language: Option<&str>) -> Result<Vec<AlgorithmRecord>> {
        let rows = sqlx::query(SELECT_ALGORITHMS)
            .bind(language)
            .fetch_all(&self.pool)
            .await
            .map_err(|source| DataError::query("list_algorithms", source))?;
        rows.iter()
            .map(decode_record)
            .collect::<std::result::Result<_, _>>()
            .map_err(|source| DataError::query("decode_algorithm", source))
    }
}

fn decode_record(row: &PgRow) -> std::result::Result<AlgorithmRecord, sqlx::Error> {
    let size_bytes: i64 = row.try_get("size_bytes")?;
    let stored_at: DateTime<Utc> = row.try_get("stored_at")?;
    Ok(AlgorithmRecord {
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        path: row.try_get("path")?,
        language: row.try_get("language")?,
        owner_id: row.try_get("owner_id")?,
        sha256: row.try_get::<String, _>("sha256")?.trim_end().to_string(),
        size_bytes: u64::try_from(size_bytes).unwrap_or_default(),
        stored_at,
    })
}

#[async_trait]
impl AlgorithmCatalog for PgCatalog {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn store_algorithm(&self, record: &AlgorithmRecord) -> CatalogResult<()> {
        let inserted = self
            .insert(record)
            .await
            .map_err(|err| CatalogError::backend("postgres", "store_algorithm", err))?;
        if !inserted {
            debug!(path = %record.path, "algorithm already catalogued");
        }
        Ok(())
    }
}
