//! Zip archive fixtures.

use std::fs::File;
use std::io::{Cursor, Seek, Write};
use std::path::Path;

use anyhow::{Context, Result};
use zip::ZipWriter;
use zip::write::FileOptions;

/// One entry of a fixture archive.
#[derive(Debug, Clone, Copy)]
pub struct ZipEntry<'a> {
    name: &'a str,
    contents: Option<&'a [u8]>,
}

impl<'a> ZipEntry<'a> {
    /// Regular file entry.
    #[must_use]
    pub const fn file(name: &'a str, contents: &'a [u8]) -> Self {
        Self {
            name,
            contents: Some(contents),
        }
    }

    /// Directory entry; the name should end with `/`.
    #[must_use]
    pub const fn dir(name: &'a str) -> Self {
        Self {
            name,
            contents: None,
        }
    }
}

fn write_entries<W: Write + Seek>(writer: W, entries: &[ZipEntry<'_>]) -> Result<W> {
    let mut zip = ZipWriter::new(writer);
    let options = FileOptions::default();
    for entry in entries {
        match entry.contents {
            Some(contents) => {
                zip.start_file(entry.name, options)
                    .with_context(|| format!("start zip entry {}", entry.name))?;
                zip.write_all(contents)?;
            }
            None => {
                zip.add_directory(entry.name, options)
                    .with_context(|| format!("add zip directory {}", entry.name))?;
            }
        }
    }
    Ok(zip.finish()?)
}

/// Write a zip archive containing `entries` to `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be created or the archive written.
pub fn write_zip(path: &Path, entries: &[ZipEntry<'_>]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    write_entries(file, entries)?;
    Ok(())
}

/// Build a zip archive in memory.
///
/// # Errors
///
/// Returns an error if the archive cannot be written.
pub fn zip_bytes(entries: &[ZipEntry<'_>]) -> Result<Vec<u8>> {
    Ok(write_entries(Cursor::new(Vec::new()), entries)?.into_inner())
}

/// Minimal valid package for `language` under the default contracts.
///
/// # Errors
///
/// Returns an error if the archive cannot be written.
pub fn sample_package(language: &str) -> Result<Vec<u8>> {
    let entry_point = if language == "R" { "Main.R" } else { "main.py" };
    zip_bytes(&[
        ZipEntry::file(entry_point, b"# entry point\n"),
        ZipEntry::dir("lib/"),
        ZipEntry::file("lib/helpers.txt", b"helpers\n"),
    ])
}
