//! Typed configuration models.
//!
//! # Design
//! - Every value is resolved and validated once at startup; the rest of the
//!   workspace only sees immutable snapshots.
//! - Lookups used on the request path (`supports`, `contract_for`) are cheap and
//!   case-sensitive, matching the wire values clients send.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults::{
    DEFAULT_LANGUAGES, DEFAULT_LOG_LEVEL, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_OPTIONAL_FOLDERS,
    DEFAULT_STORAGE_ROOT,
};

/// Fully resolved configuration for the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// HTTP listener settings.
    pub server: ServerConfig,
    /// Upload pipeline settings.
    pub intake: IntakeConfig,
    /// Logging settings.
    pub telemetry: TelemetryConfig,
    /// Where accepted packages are catalogued.
    pub catalog: CatalogConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Socket address the API binds to.
    pub bind_addr: SocketAddr,
    /// Upper bound on a single upload request body.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 7070)),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// What happens to a package after its bytes are received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Expand the archive and verify the package contract.
    ExtractAndVerify,
    /// Accept the received file as-is.
    StoreOnly,
}

impl ValidationMode {
    /// Stable string form used in configuration and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ExtractAndVerify => "extract_and_verify",
            Self::StoreOnly => "store_only",
        }
    }

    /// Parse the stable string form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "extract_and_verify" | "extract" | "verify" => Some(Self::ExtractAndVerify),
            "store_only" | "store" => Some(Self::StoreOnly),
            _ => None,
        }
    }
}

/// A supported development language and the files its packages must ship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageContract {
    /// Language name as sent by clients (e.g. `Python`).
    pub name: String,
    /// Files that must exist at the root of an extracted package.
    pub required_files: Vec<String>,
}

impl LanguageContract {
    /// Build a contract from borrowed parts.
    #[must_use]
    pub fn new(name: impl Into<String>, required_files: &[&str]) -> Self {
        Self {
            name: name.into(),
            required_files: required_files.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Upload pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeConfig {
    /// Root folder of the `<root>/<language>/<instance>` hierarchy.
    pub storage_root: PathBuf,
    /// Allow-list of languages and their package contracts.
    pub languages: Vec<LanguageContract>,
    /// Folders created inside every extracted package when absent.
    pub optional_folders: Vec<String>,
    /// Post-receive behaviour.
    pub validation: ValidationMode,
    /// Whether `user_id` must be supplied and non-blank.
    pub require_owner: bool,
    /// Whether `description` must be supplied and non-blank.
    pub require_description: bool,
    /// Upper bound on the time spent streaming one upload.
    pub upload_timeout: Option<Duration>,
}

impl IntakeConfig {
    /// Whether `language` is a member of the allow-list.
    #[must_use]
    pub fn supports(&self, language: &str) -> bool {
        self.contract_for(language).is_some()
    }

    /// Package contract for `language`, if supported.
    #[must_use]
    pub fn contract_for(&self, language: &str) -> Option<&LanguageContract> {
        self.languages.iter().find(|contract| contract.name == language)
    }

    /// Names of every supported language, in configuration order.
    #[must_use]
    pub fn language_names(&self) -> Vec<&str> {
        self.languages
            .iter()
            .map(|contract| contract.name.as_str())
            .collect()
    }
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from(DEFAULT_STORAGE_ROOT),
            languages: DEFAULT_LANGUAGES
                .iter()
                .map(|(name, files)| LanguageContract::new(*name, files))
                .collect(),
            optional_folders: DEFAULT_OPTIONAL_FOLDERS
                .iter()
                .map(ToString::to_string)
                .collect(),
            validation: ValidationMode::ExtractAndVerify,
            require_owner: false,
            require_description: true,
            upload_timeout: None,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Default level filter when `RUST_LOG` is absent.
    pub level: String,
    /// Requested output format (`pretty` or `json`); inferred when absent.
    pub format: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            format: None,
        }
    }
}

/// Catalog backend selection.
#[derive(Clone, PartialEq, Eq)]
pub enum CatalogConfig {
    /// Keep catalog records in process memory.
    Memory,
    /// Append catalog records to a JSON lines file.
    JsonLines {
        /// File receiving one JSON object per accepted package.
        path: PathBuf,
    },
    /// Store catalog records in `PostgreSQL`.
    Postgres {
        /// Connection string.
        url: String,
    },
}

impl CatalogConfig {
    /// Short backend label for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::JsonLines { .. } => "jsonl",
            Self::Postgres { .. } => "postgres",
        }
    }
}

impl std::fmt::Debug for CatalogConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => formatter.write_str("Memory"),
            Self::JsonLines { path } => formatter
                .debug_struct("JsonLines")
                .field("path", path)
                .finish(),
            Self::Postgres { .. } => formatter
                .debug_struct("Postgres")
                .field("url", &"<redacted>")
                .finish_non_exhaustive(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let intake = IntakeConfig::default();
        let catalog = CatalogConfig::JsonLines {
            path: intake
                .storage_root
                .join(crate::defaults::DEFAULT_CATALOG_FILE),
        };
        Self {
            server: ServerConfig::default(),
            intake,
            telemetry: TelemetryConfig::default(),
            catalog,
        }
    }
}
