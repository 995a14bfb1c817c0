//! Ownership of an instance folder shared with blocking work.
//!
//! # Design
//! - Blocking tasks that write into the instance folder register a
//!   [`ScopeWork`] permit before touching disk.
//! - Abandoning the scope (the upload future was dropped) stops new permits
//!   and asks running work to stop at its next checkpoint.
//! - Whichever side finishes last removes the folder, so detached blocking
//!   work can never recreate it after removal.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, error, warn};

#[derive(Debug, Default)]
struct ScopeState {
    active: usize,
    abandoned: bool,
}

#[derive(Debug)]
struct ScopeInner {
    path: PathBuf,
    stop: AtomicBool,
    state: Mutex<ScopeState>,
}

/// Handle on one instance folder; clones share state.
#[derive(Debug, Clone)]
pub struct InstanceScope {
    inner: Arc<ScopeInner>,
}

impl InstanceScope {
    /// Scope over `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                path: path.into(),
                stop: AtomicBool::new(false),
                state: Mutex::new(ScopeState::default()),
            }),
        }
    }

    /// Instance folder.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Whether running work should stop at its next checkpoint.
    #[must_use]
    pub fn is_abandoned(&self) -> bool {
        self.inner.stop.load(Ordering::Acquire)
    }

    /// Register blocking work; `None` once the scope is abandoned.
    #[must_use]
    pub fn enter(&self) -> Option<ScopeWork> {
        let mut state = self.lock();
        if state.abandoned {
            return None;
        }
        state.active += 1;
        drop(state);
        Some(ScopeWork {
            scope: self.clone(),
        })
    }

    /// Number of registered permits.
    #[must_use]
    pub fn active_work(&self) -> usize {
        self.lock().active
    }

    /// Give up the folder.
    ///
    /// Removal happens now when no work is registered, otherwise when the
    /// last permit drops. Inside a runtime the removal runs on the blocking
    /// pool.
    pub fn abandon(&self) {
        self.inner.stop.store(true, Ordering::Release);
        let idle = {
            let mut state = self.lock();
            if state.abandoned {
                return;
            }
            state.abandoned = true;
            state.active == 0
        };
        if !idle {
            debug!(path = %self.path().display(), "instance removal deferred to running work");
            return;
        }
        let path = self.inner.path.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                drop(handle.spawn_blocking(move || remove_abandoned(&path)));
            }
            Err(_) => remove_abandoned(&path),
        }
    }

    fn leave(&self) {
        let remove = {
            let mut state = self.lock();
            state.active = state.active.saturating_sub(1);
            state.abandoned && state.active == 0
        };
        if remove {
            remove_abandoned(&self.inner.path);
        }
    }

    fn lock(&self) -> MutexGuard<'_, ScopeState> {
        match self.inner.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("instance scope mutex poisoned; continuing with recovered guard");
                poisoned.into_inner()
            }
        }
    }
}

/// Registration of one blocking task; dropped on the thread that ran it.
#[must_use = "work is unregistered as soon as the permit is dropped"]
#[derive(Debug)]
pub struct ScopeWork {
    scope: InstanceScope,
}

impl ScopeWork {
    /// Whether the owning upload was abandoned.
    #[must_use]
    pub fn is_abandoned(&self) -> bool {
        self.scope.is_abandoned()
    }
}

impl Drop for ScopeWork {
    fn drop(&mut self) {
        self.scope.leave();
    }
}

fn remove_abandoned(path: &Path) {
    match std::fs::remove_dir_all(path) {
        Ok(()) => debug!(path = %path.display(), "abandoned instance folder removed"),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => warn!(
            error = %err,
            path = %path.display(),
            "failed to remove abandoned instance folder"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult<T> = anyhow::Result<T>;

    #[test]
    fn idle_scope_is_removed_on_abandon() -> TestResult<()> {
        let temp = tempfile::tempdir()?;
        let folder = temp.path().join("pkg-1");
        std::fs::create_dir_all(folder.join("input"))?;
        let scope = InstanceScope::new(&folder);
        scope.abandon();
        assert!(!folder.exists());
        assert!(scope.is_abandoned());
        assert!(scope.enter().is_none());
        Ok(())
    }

    #[test]
    fn removal_waits_for_the_last_permit() -> TestResult<()> {
        let temp = tempfile::tempdir()?;
        let folder = temp.path().join("pkg-2");
        std::fs::create_dir_all(&folder)?;
        let scope = InstanceScope::new(&folder);
        let first = scope.enter().ok_or_else(|| anyhow::anyhow!("scope closed"))?;
        let second = scope.enter().ok_or_else(|| anyhow::anyhow!("scope closed"))?;

        scope.abandon();
        assert!(first.is_abandoned());
        // Late writes from running work land in a folder that still exists.
        std::fs::create_dir_all(folder.join("lib"))?;
        drop(first);
        assert!(folder.exists());
        assert_eq!(scope.active_work(), 1);
        drop(second);
        assert!(!folder.exists());
        assert_eq!(scope.active_work(), 0);
        Ok(())
    }

    #[test]
    fn unabandoned_scope_leaves_folder_alone() -> TestResult<()> {
        let temp = tempfile::tempdir()?;
        let folder = temp.path().join("pkg-3");
        std::fs::create_dir_all(&folder)?;
        let scope = InstanceScope::new(&folder);
        drop(scope.enter());
        drop(scope);
        assert!(folder.is_dir());
        Ok(())
    }
}
