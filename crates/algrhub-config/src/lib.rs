#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(unused, unreachable_pub, missing_docs)]
#![allow(clippy::module_name_repetitions)]

//! Typed, immutable configuration for the algorithm intake service.
//!
//! Layout: `model.rs` (typed config models), `loader.rs` (environment parsing and
//! validation), `defaults.rs` (default values).

mod defaults;
pub mod error;
pub mod loader;
pub mod model;

pub use defaults::{
    DEFAULT_BIND_ADDR, DEFAULT_LOG_LEVEL, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_STORAGE_ROOT,
};
pub use error::{ConfigError, ConfigResult};
pub use model::{
    AppConfig, CatalogConfig, IntakeConfig, LanguageContract, ServerConfig, TelemetryConfig,
    ValidationMode,
};
