//! Catalog collaborator: where accepted packages are recorded.
//!
//! # Design
//! - One idempotent call, keyed by the resolved instance path.
//! - In-process backends live here; the `PostgreSQL` backend lives in
//!   `algrhub-data` and reports through [`CatalogError::Backend`].

use std::collections::HashSet;
use std::error::Error as StdError;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::error;

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors raised by catalog backends.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The backend refused to accept records.
    #[error("catalog unavailable")]
    Unavailable {
        /// Backend label.
        backend: &'static str,
        /// Static reason.
        reason: &'static str,
    },
    /// File-backed catalog IO failure.
    #[error("catalog io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Catalog file.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Record (de)serialisation failure.
    #[error("catalog json failure")]
    Json {
        /// Operation that triggered the JSON failure.
        operation: &'static str,
        /// Underlying serde error.
        source: serde_json::Error,
    },
    /// Failure reported by an external backend.
    #[error("catalog backend failure")]
    Backend {
        /// Backend label.
        backend: &'static str,
        /// Operation that failed.
        operation: &'static str,
        /// Underlying backend error.
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl CatalogError {
    /// Wrap an external backend error.
    pub fn backend(
        backend: &'static str,
        operation: &'static str,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Backend {
            backend,
            operation,
            source: Box::new(source),
        }
    }

    fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

/// Metadata persisted for an accepted package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgorithmRecord {
    /// Package name as submitted.
    pub name: String,
    /// Description; empty when none was supplied.
    pub description: String,
    /// Canonical instance folder path.
    pub path: String,
    /// Development language.
    pub language: String,
    /// Submitting user, when supplied.
    pub owner_id: Option<String>,
    /// SHA-256 of the uploaded file.
    pub sha256: String,
    /// Size of the uploaded file.
    pub size_bytes: u64,
    /// When the package was accepted.
    pub stored_at: DateTime<Utc>,
}

/// Persists accepted package metadata.
#[async_trait]
pub trait AlgorithmCatalog: Send + Sync {
    /// Backend label for logs.
    fn backend(&self) -> &'static str;

    /// Record `record`. Storing the same path twice is a no-op.
    async fn store_algorithm(&self, record: &AlgorithmRecord) -> CatalogResult<()>;
}

fn lock_records<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            error!("catalog mutex poisoned; continuing with recovered guard");
            poisoned.into_inner()
        }
    }
}

/// Keeps records in process memory.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    records: Mutex<Vec<AlgorithmRecord>>,
    failing: AtomicBool,
}

impl MemoryCatalog {
    /// Empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent store fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Copy of every stored record, oldest first.
    #[must_use]
    pub fn records(&self) -> Vec<AlgorithmRecord> {
        lock_records(&self.records).clone()
    }
}

#[async_trait]
impl AlgorithmCatalog for MemoryCatalog {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn store_algorithm(&self, record: &AlgorithmRecord) -> CatalogResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CatalogError::Unavailable {
                backend: "memory",
                reason: "disabled",
            });
        }
        let mut records = lock_records(&self.records);
        if !records.iter().any(|existing| existing.path == record.path) {
            records.push(record.clone());
        }
        Ok(())
    }
}

/// Appends one JSON object per accepted package to a file.
pub struct JsonLinesCatalog {
    path: PathBuf,
    known_paths: tokio::sync::Mutex<HashSet<String>>,
}

impl JsonLinesCatalog {
    /// Open (or prepare to create) the catalog at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error when an existing file cannot be read or parsed.
    pub async fn open(path: impl Into<PathBuf>) -> CatalogResult<Self> {
        let path = path.into();
        let known_paths = Self::read_records(&path)
            .await?
            .into_iter()
            .map(|record| record.path)
            .collect();
        Ok(Self {
            path,
            known_paths: tokio::sync::Mutex::new(known_paths),
        })
    }

    /// Catalog file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every record currently in the file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or a line fails to parse.
    pub async fn records(&self) -> CatalogResult<Vec<AlgorithmRecord>> {
        Self::read_records(&self.path).await
    }

    async fn read_records(path: &Path) -> CatalogResult<Vec<AlgorithmRecord>> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(CatalogError::io("catalog.read", path, source)),
        };
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|source| CatalogError::Json {
                    operation: "catalog.parse",
                    source,
                })
            })
            .collect()
    }
}

#[async_trait]
impl AlgorithmCatalog for JsonLinesCatalog {
    fn backend(&self) -> &'static str {
        "jsonl"
    }

    async fn store_algorithm(&self, record: &AlgorithmRecord) -> CatalogResult<()> {
        let mut known = self.known_paths.lock().await;
        if known.contains(&record.path) {
            return Ok(());
        }

        let mut line = serde_json::to_vec(record).map_err(|source| CatalogError::Json {
            operation: "catalog.serialize",
            source,
        })?;
        line.push(b'\n');

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| CatalogError::io("catalog.create_dir", parent, source))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|source| CatalogError::io("catalog.open", &self.path, source))?;
        file.write_all(&line)
            .await
            .map_err(|source| CatalogError::io("catalog.append", &self.path, source))?;
        file.sync_data()
            .await
            .map_err(|source| CatalogError::io("catalog.sync", &self.path, source))?;

        known.insert(record.path.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult<T> = anyhow::Result<T>;

    fn record(path: &str) -> AlgorithmRecord {
        AlgorithmRecord {
            name: "sort-algo".into(),
            description: "quicksort".into(),
            path: path.into(),
            language: "Python".into(),
            owner_id: None,
            sha256: "00".repeat(32),
            size_bytes: 42,
            stored_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn memory_catalog_is_idempotent_per_path() -> TestResult<()> {
        let catalog = MemoryCatalog::new();
        catalog.store_algorithm(&record("/a")).await?;
        catalog.store_algorithm(&record("/a")).await?;
        catalog.store_algorithm(&record("/b")).await?;
        assert_eq!(catalog.records().len(), 2);
        assert_eq!(catalog.backend(), "memory");
        Ok(())
    }

    #[tokio::test]
    async fn memory_catalog_can_be_switched_to_fail() -> TestResult<()> {
        let catalog = MemoryCatalog::new();
        catalog.set_failing(true);
        let result = catalog.store_algorithm(&record("/a")).await;
        assert!(matches!(result, Err(CatalogError::Unavailable { .. })));
        catalog.set_failing(false);
        catalog.store_algorithm(&record("/a")).await?;
        assert_eq!(catalog.records().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn json_lines_catalog_appends_and_reloads() -> TestResult<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join(".catalog").join("algorithms.jsonl");

        let catalog = JsonLinesCatalog::open(&path).await?;
        catalog.store_algorithm(&record("/a")).await?;
        catalog.store_algorithm(&record("/a")).await?;
        catalog.store_algorithm(&record("/b")).await?;
        assert_eq!(catalog.records().await?.len(), 2);
        assert_eq!(catalog.path(), path.as_path());

        let reopened = JsonLinesCatalog::open(&path).await?;
        reopened.store_algorithm(&record("/b")).await?;
        let records = reopened.records().await?;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].path, "/a");
        Ok(())
    }

    #[tokio::test]
    async fn json_lines_catalog_rejects_corrupt_files() -> TestResult<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("algorithms.jsonl");
        std::fs::write(&path, b"{not json}\n")?;
        let result = JsonLinesCatalog::open(&path).await;
        assert!(matches!(result, Err(CatalogError::Json { .. })));
        Ok(())
    }

    #[test]
    fn backend_errors_keep_their_source() {
        let err = CatalogError::backend("postgres", "insert", io::Error::other("down"));
        assert_eq!(err.to_string(), "catalog backend failure");
        assert!(StdError::source(&err).is_some());
    }
}
