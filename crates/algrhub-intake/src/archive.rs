//! Zip expansion into an instance folder.
//!
//! # Design
//! - Entries are resolved against the destination component by component;
//!   absolute paths, parent segments and drive prefixes are hard failures.
//! - The archive itself stays in place and may not be overwritten by an entry.
//! - Runs on the blocking pool under an [`InstanceScope`] permit and stops
//!   before the next entry once the upload is abandoned.

use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use zip::ZipArchive;

use crate::error::{ArchiveError, IntakeError, IntakeResult};
use crate::scope::InstanceScope;

/// Summary of one expansion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpandReport {
    /// Entries read from the archive.
    pub entries: usize,
    /// Regular files written.
    pub files: usize,
    /// Directories created for directory entries.
    pub directories: usize,
    /// Uncompressed bytes written.
    pub bytes: u64,
}

/// Expands uploaded archives.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveExpander;

impl ArchiveExpander {
    /// Expand `archive` into the scope's folder on the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns [`IntakeError::Extract`] when the archive is unreadable, corrupt
    /// or contains an entry that would escape the folder, or when the scope
    /// was abandoned, and [`IntakeError::StageAborted`] if the blocking task
    /// fails.
    pub async fn expand(
        &self,
        archive: &Path,
        scope: &InstanceScope,
    ) -> IntakeResult<ExpandReport> {
        let abandoned = || IntakeError::Extract {
            archive: archive.to_path_buf(),
            source: ArchiveError::Abandoned { entries: 0 },
        };
        let work = scope.enter().ok_or_else(abandoned)?;
        let archive_path = archive.to_path_buf();
        let destination_path = scope.path().to_path_buf();
        tokio::task::spawn_blocking(move || {
            expand_zip(&archive_path, &destination_path, || work.is_abandoned())
        })
        .await
        .map_err(|source| IntakeError::StageAborted {
            stage: "extract",
            source,
        })?
        .map_err(|source| IntakeError::Extract {
            archive: archive.to_path_buf(),
            source,
        })
    }
}

/// Expand a zip archive synchronously, polling `should_stop` before each entry.
///
/// # Errors
///
/// See [`ArchiveExpander::expand`]; a stop request yields
/// [`ArchiveError::Abandoned`].
pub fn expand_zip(
    archive: &Path,
    destination: &Path,
    should_stop: impl Fn() -> bool,
) -> Result<ExpandReport, ArchiveError> {
    let file =
        File::open(archive).map_err(|source| ArchiveError::io("expand.open", archive, source))?;
    let mut zip =
        ZipArchive::new(file).map_err(|source| ArchiveError::zip("expand.decode", archive, source))?;
    let mut report = ExpandReport::default();

    for index in 0..zip.len() {
        if should_stop() {
            return Err(ArchiveError::Abandoned {
                entries: report.entries,
            });
        }
        let mut entry = zip
            .by_index(index)
            .map_err(|source| ArchiveError::zip("expand.read_entry", archive, source))?;
        report.entries += 1;
        let relative = resolve_entry_path(entry.name())?;
        if relative.as_os_str().is_empty() {
            continue;
        }
        let target = destination.join(&relative);
        if target == archive {
            return Err(ArchiveError::UnsafeEntry {
                entry: entry.name().to_string(),
                reason: "overwrites_archive",
            });
        }

        if entry.is_dir() {
            fs::create_dir_all(&target)
                .map_err(|source| ArchiveError::io("expand.create_dir", &target, source))?;
            report.directories += 1;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| ArchiveError::io("expand.create_parent", parent, source))?;
        }
        let mut output = File::create(&target)
            .map_err(|source| ArchiveError::io("expand.create_file", &target, source))?;
        let written = io::copy(&mut entry, &mut output).map_err(|source| {
            // A bad CRC or truncated stream surfaces here as an io error.
            ArchiveError::io("expand.copy", &target, source)
        })?;
        report.files += 1;
        report.bytes = report.bytes.saturating_add(written);

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            // Never grant more than the owner already has, and keep it readable.
            let mode = (mode & 0o755) | 0o600;
            fs::set_permissions(&target, fs::Permissions::from_mode(mode))
                .map_err(|source| ArchiveError::io("expand.set_permissions", &target, source))?;
        }
    }

    Ok(report)
}

/// Relative path of an archive entry, or an error when it could escape.
///
/// # Errors
///
/// Returns [`ArchiveError::UnsafeEntry`] for absolute paths, `..` segments,
/// drive prefixes and embedded NUL bytes.
pub fn resolve_entry_path(entry: &str) -> Result<PathBuf, ArchiveError> {
    let unsafe_entry = |reason| ArchiveError::UnsafeEntry {
        entry: entry.to_string(),
        reason,
    };
    if entry.contains('\0') {
        return Err(unsafe_entry("nul_byte"));
    }
    let normalised = entry.replace('\\', "/");
    if normalised.starts_with('/') {
        return Err(unsafe_entry("absolute_path"));
    }

    let mut resolved = PathBuf::new();
    for component in Path::new(&normalised).components() {
        match component {
            Component::Normal(segment) => resolved.push(segment),
            Component::CurDir => {}
            Component::ParentDir => return Err(unsafe_entry("parent_segment")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(unsafe_entry("absolute_path"));
            }
        }
    }
    if resolved
        .components()
        .next()
        .and_then(|first| first.as_os_str().to_str())
        .is_some_and(|first| first.len() == 2 && first.ends_with(':'))
    {
        return Err(unsafe_entry("drive_prefix"));
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use algrhub_test_support::archive::{ZipEntry, write_zip};

    type TestResult<T> = anyhow::Result<T>;

    #[test]
    fn resolve_entry_path_accepts_nested_relative_entries() -> TestResult<()> {
        assert_eq!(
            resolve_entry_path("src/lib/helpers.R")?,
            PathBuf::from("src/lib/helpers.R")
        );
        assert_eq!(resolve_entry_path("./Main.R")?, PathBuf::from("Main.R"));
        assert_eq!(resolve_entry_path("data\\x.csv")?, PathBuf::from("data/x.csv"));
        Ok(())
    }

    #[test]
    fn resolve_entry_path_rejects_escapes() {
        let cases = [
            ("../evil.sh", "parent_segment"),
            ("ok/../../evil.sh", "parent_segment"),
            ("/etc/passwd", "absolute_path"),
            ("\\windows\\system32", "absolute_path"),
            ("C:/evil.exe", "drive_prefix"),
            ("a\0b", "nul_byte"),
        ];
        for (entry, expected) in cases {
            match resolve_entry_path(entry) {
                Err(ArchiveError::UnsafeEntry { reason, .. }) => {
                    assert_eq!(reason, expected, "{entry}");
                }
                other => panic!("expected rejection for {entry}: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn expands_files_and_directories() -> TestResult<()> {
        let temp = tempfile::tempdir()?;
        let archive = temp.path().join("pkg.zip");
        write_zip(
            &archive,
            &[
                ZipEntry::dir("lib/"),
                ZipEntry::file("Main.R", b"print(1)"),
                ZipEntry::file("lib/util.R", b"f <- function() 1"),
            ],
        )?;

        let scope = InstanceScope::new(temp.path());
        let report = ArchiveExpander.expand(&archive, &scope).await?;
        assert_eq!(report.entries, 3);
        assert_eq!(report.files, 2);
        assert_eq!(report.directories, 1);
        assert_eq!(std::fs::read(temp.path().join("Main.R"))?, b"print(1)");
        assert!(temp.path().join("lib").join("util.R").is_file());
        assert!(archive.is_file());
        Ok(())
    }

    #[tokio::test]
    async fn zip_slip_entries_fail_without_writing_outside() -> TestResult<()> {
        let temp = tempfile::tempdir()?;
        let instance = temp.path().join("instance");
        std::fs::create_dir_all(&instance)?;
        let archive = instance.join("pkg.zip");
        write_zip(&archive, &[ZipEntry::file("../escaped.txt", b"x")])?;

        let scope = InstanceScope::new(&instance);
        let result = ArchiveExpander.expand(&archive, &scope).await;
        assert!(matches!(
            result,
            Err(IntakeError::Extract {
                source: ArchiveError::UnsafeEntry { .. },
                ..
            })
        ));
        assert!(!temp.path().join("escaped.txt").exists());
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_archive_is_an_extract_error() -> TestResult<()> {
        let temp = tempfile::tempdir()?;
        let archive = temp.path().join("pkg.zip");
        std::fs::write(&archive, b"definitely not a zip")?;
        let scope = InstanceScope::new(temp.path());
        let result = ArchiveExpander.expand(&archive, &scope).await;
        let code = result.err().map(|err| err.code());
        assert_eq!(code, Some(crate::error::ErrorCode::UnzipException));
        Ok(())
    }

    #[tokio::test]
    async fn entry_named_like_the_archive_is_rejected() -> TestResult<()> {
        let temp = tempfile::tempdir()?;
        let archive = temp.path().join("pkg.zip");
        write_zip(&archive, &[ZipEntry::file("pkg.zip", b"boom")])?;
        let scope = InstanceScope::new(temp.path());
        let result = ArchiveExpander.expand(&archive, &scope).await;
        assert!(matches!(
            result,
            Err(IntakeError::Extract {
                source: ArchiveError::UnsafeEntry {
                    reason: "overwrites_archive",
                    ..
                },
                ..
            })
        ));
        Ok(())
    }

    #[test]
    fn stop_request_halts_before_the_next_entry() -> TestResult<()> {
        let temp = tempfile::tempdir()?;
        let archive = temp.path().join("pkg.zip");
        write_zip(
            &archive,
            &[
                ZipEntry::file("a/one.txt", b"1"),
                ZipEntry::file("b/two.txt", b"2"),
                ZipEntry::file("c/three.txt", b"3"),
            ],
        )?;
        let polls = std::cell::Cell::new(0_usize);
        let result = expand_zip(&archive, temp.path(), || {
            polls.set(polls.get() + 1);
            polls.get() > 1
        });
        assert!(matches!(
            result,
            Err(ArchiveError::Abandoned { entries: 1 })
        ));
        assert!(temp.path().join("a").join("one.txt").is_file());
        assert!(!temp.path().join("b").exists());
        Ok(())
    }

    #[tokio::test]
    async fn abandoned_scope_refuses_new_expansion() -> TestResult<()> {
        let temp = tempfile::tempdir()?;
        let instance = temp.path().join("instance");
        std::fs::create_dir_all(&instance)?;
        let archive = temp.path().join("pkg.zip");
        write_zip(&archive, &[ZipEntry::file("lib/x.R", b"x")])?;
        let scope = InstanceScope::new(&instance);
        scope.abandon();

        let result = ArchiveExpander.expand(&archive, &scope).await;
        assert!(matches!(
            result,
            Err(IntakeError::Extract {
                source: ArchiveError::Abandoned { entries: 0 },
                ..
            })
        ));
        tokio::task::yield_now().await;
        for _ in 0..50 {
            if !instance.exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(!instance.exists());
        Ok(())
    }
}
