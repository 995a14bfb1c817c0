//! Default values applied when an environment variable is absent.
//!
//! # Design
//! - Centralize defaults so the loader and tests agree on the baseline configuration.

/// Default listener address for the HTTP surface.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:7070";
/// Default on-disk root for stored algorithm packages.
pub const DEFAULT_STORAGE_ROOT: &str = "./data/algorithms";
/// Default upper bound on an upload request body (64 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;
/// Default logging level when neither `RUST_LOG` nor `ALGRHUB_LOG_LEVEL` is set.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Languages accepted out of the box, paired with their required entry-point files.
pub(crate) const DEFAULT_LANGUAGES: &[(&str, &[&str])] =
    &[("R", &["Main.R"]), ("Python", &["main.py"])];
/// Folders created inside every extracted package when absent.
pub(crate) const DEFAULT_OPTIONAL_FOLDERS: &[&str] = &["input", "output"];
/// Sub-path (under the storage root) of the JSON lines catalog.
pub(crate) const DEFAULT_CATALOG_FILE: &str = ".catalog/algorithms.jsonl";
