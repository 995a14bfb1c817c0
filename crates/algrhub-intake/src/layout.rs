//! On-disk hierarchy: `<root>/<language>/<instance>/`.
//!
//! # Design
//! - Root and language folders are created idempotently.
//! - Instance folders are created exclusively; a name collision bumps the
//!   timestamp instead of sharing the folder.
//! - Removal is quiet: failures are logged and never surfaced.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, TimeZone, Utc};
use tracing::{debug, warn};

use crate::error::{IntakeError, IntakeResult};
use crate::sanitize::{instance_folder_name, sanitize_segment};

/// Upper bound on exclusive-create retries for one instance.
const MAX_CREATE_ATTEMPTS: u32 = 64;

/// Millisecond clock that never hands out the same value twice.
#[derive(Debug, Default)]
pub struct MonotonicMillis {
    last: AtomicU64,
}

impl MonotonicMillis {
    /// Next timestamp, strictly greater than every previous one.
    pub fn next(&self) -> u64 {
        let now = wall_clock_millis();
        let mut current = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(current.saturating_add(1));
            match self.last.compare_exchange_weak(
                current,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return candidate,
                Err(observed) => current = observed,
            }
        }
    }
}

fn wall_clock_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
        })
}

/// A freshly created, exclusively owned instance folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInstance {
    /// Storage root.
    pub root_path: PathBuf,
    /// `<root>/<language>`.
    pub language_path: PathBuf,
    /// `<root>/<language>/<instance>`.
    pub instance_path: PathBuf,
    /// Final folder name.
    pub folder_name: String,
    /// Timestamp embedded in the folder name.
    pub created_at_millis: u64,
}

impl PackageInstance {
    /// Creation time as a UTC timestamp.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        i64::try_from(self.created_at_millis)
            .ok()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
            .unwrap_or_default()
    }
}

/// Resolves and creates the storage hierarchy.
#[derive(Debug)]
pub struct StorageLayout {
    root: PathBuf,
    clock: MonotonicMillis,
}

impl StorageLayout {
    /// Layout rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            clock: MonotonicMillis::default(),
        }
    }

    /// Configured storage root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the storage root if absent.
    ///
    /// # Errors
    ///
    /// Returns [`IntakeError::StorageUnavailable`] when the root cannot be created.
    pub async fn ensure_root(&self) -> IntakeResult<&Path> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| IntakeError::StorageUnavailable {
                path: self.root.clone(),
                source,
            })?;
        Ok(&self.root)
    }

    /// Create `<root>/<language>` if absent.
    ///
    /// The language must already be allow-listed; it is still sanitised so a
    /// misconfigured contract cannot address a folder outside the root.
    ///
    /// # Errors
    ///
    /// Returns [`IntakeError::CreateFolder`] when the folder cannot be created.
    pub async fn ensure_language(&self, language: &str) -> IntakeResult<PathBuf> {
        let path = self.root.join(sanitize_segment(language));
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|source| IntakeError::create_folder("layout.language", &path, source))?;
        Ok(path)
    }

    /// Create a new, unique instance folder under `language_path`.
    ///
    /// # Errors
    ///
    /// Returns [`IntakeError::CreateFolder`] when the folder cannot be created
    /// or every attempt collided with an existing folder.
    pub async fn create_instance(
        &self,
        language_path: &Path,
        name: &str,
        owner: Option<&str>,
    ) -> IntakeResult<PackageInstance> {
        let mut last_collision = None;
        for _ in 0..MAX_CREATE_ATTEMPTS {
            let millis = self.clock.next();
            let folder_name = instance_folder_name(name, owner, millis);
            let instance_path = language_path.join(&folder_name);
            match tokio::fs::create_dir(&instance_path).await {
                Ok(()) => {
                    debug!(path = %instance_path.display(), "instance folder created");
                    return Ok(PackageInstance {
                        root_path: self.root.clone(),
                        language_path: language_path.to_path_buf(),
                        instance_path,
                        folder_name,
                        created_at_millis: millis,
                    });
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    last_collision = Some((instance_path, err));
                }
                Err(source) => {
                    return Err(IntakeError::create_folder(
                        "layout.instance",
                        instance_path,
                        source,
                    ));
                }
            }
        }
        let (path, source) = last_collision.unwrap_or_else(|| {
            (
                language_path.to_path_buf(),
                io::Error::other("no instance folder attempts were made"),
            )
        });
        Err(IntakeError::create_folder("layout.instance", path, source))
    }

    /// Recursively delete an instance folder, logging but never returning errors.
    ///
    /// Returns `true` when the folder is gone afterwards.
    pub async fn remove_quietly(path: &Path) -> bool {
        match tokio::fs::remove_dir_all(path).await {
            Ok(()) => true,
            Err(err) if err.kind() == io::ErrorKind::NotFound => true,
            Err(err) => {
                warn!(error = %err, path = %path.display(), "failed to remove instance folder");
                false
            }
        }
    }
}
