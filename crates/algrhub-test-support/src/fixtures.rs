//! Scratch storage roots for pipeline tests.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tempfile::TempDir;

/// Temporary directory holding a storage root; removed on drop.
#[derive(Debug)]
pub struct ScratchStorage {
    dir: TempDir,
    root: PathBuf,
}

impl ScratchStorage {
    /// Fresh scratch directory; the storage root inside it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary directory cannot be created.
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("algrhub-").tempdir()?;
        let root = dir.path().join("algorithms");
        Ok(Self { dir, root })
    }

    /// Storage root to hand to the pipeline.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scratch directory containing the root.
    #[must_use]
    pub fn base(&self) -> &Path {
        self.dir.path()
    }

    /// Instance folders currently present for `language`.
    ///
    /// # Errors
    ///
    /// Returns an error if the language folder exists but cannot be read.
    pub fn instances(&self, language: &str) -> Result<Vec<PathBuf>> {
        let folder = self.root.join(language);
        if !folder.exists() {
            return Ok(Vec::new());
        }
        let mut entries = std::fs::read_dir(folder)?
            .map(|entry| entry.map(|entry| entry.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        entries.sort();
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scratch_storage_lists_instances() -> Result<()> {
        let scratch = ScratchStorage::new()?;
        assert!(scratch.instances("R")?.is_empty());
        std::fs::create_dir_all(scratch.root().join("R").join("pca-1"))?;
        assert_eq!(scratch.instances("R")?.len(), 1);
        assert!(scratch.root().starts_with(scratch.base()));
        Ok(())
    }
}
