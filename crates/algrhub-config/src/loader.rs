//! Environment-driven configuration loading and validation.
//!
//! # Design
//! - `from_lookup` takes an arbitrary key lookup so tests never touch the
//!   process environment.
//! - Blank values are treated exactly like absent ones.
//! - Parsing failures name the offending key; cross-field checks name the field.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::defaults::DEFAULT_CATALOG_FILE;
use crate::error::{ConfigError, ConfigResult};
use crate::model::{
    AppConfig, CatalogConfig, IntakeConfig, LanguageContract, ServerConfig, TelemetryConfig,
    ValidationMode,
};

/// Listener address.
pub const ENV_BIND_ADDR: &str = "ALGRHUB_BIND_ADDR";
/// Request body ceiling in bytes.
pub const ENV_MAX_UPLOAD_BYTES: &str = "ALGRHUB_MAX_UPLOAD_BYTES";
/// Storage root folder.
pub const ENV_STORAGE_ROOT: &str = "ALGRHUB_STORAGE_ROOT";
/// Language allow-list with contracts, e.g. `R:Main.R,Python:main.py|setup.cfg`.
pub const ENV_LANGUAGES: &str = "ALGRHUB_LANGUAGES";
/// Comma separated optional folders.
pub const ENV_OPTIONAL_FOLDERS: &str = "ALGRHUB_OPTIONAL_FOLDERS";
/// `extract_and_verify` or `store_only`.
pub const ENV_VALIDATION: &str = "ALGRHUB_VALIDATION";
/// Whether `user_id` is mandatory.
pub const ENV_REQUIRE_OWNER: &str = "ALGRHUB_REQUIRE_OWNER";
/// Whether `description` is mandatory.
pub const ENV_REQUIRE_DESCRIPTION: &str = "ALGRHUB_REQUIRE_DESCRIPTION";
/// Upload streaming timeout in seconds.
pub const ENV_UPLOAD_TIMEOUT_SECS: &str = "ALGRHUB_UPLOAD_TIMEOUT_SECS";
/// Default log level.
pub const ENV_LOG_LEVEL: &str = "ALGRHUB_LOG_LEVEL";
/// Log output format.
pub const ENV_LOG_FORMAT: &str = "ALGRHUB_LOG_FORMAT";
/// Catalog backend (`memory`, `jsonl`, `postgres`).
pub const ENV_CATALOG: &str = "ALGRHUB_CATALOG";
/// JSON lines catalog location.
pub const ENV_CATALOG_PATH: &str = "ALGRHUB_CATALOG_PATH";
/// `PostgreSQL` connection string.
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";

const LIST_SEPARATOR: char = ',';
const CONTRACT_SEPARATOR: char = ':';
const FILE_SEPARATOR: char = '|';

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error when a variable cannot be parsed or the resulting
    /// configuration fails validation.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error when a value cannot be parsed or the resulting
    /// configuration fails validation.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let server = load_server(&get)?;
        let intake = load_intake(&get)?;
        validate_intake(&intake)?;
        let telemetry = TelemetryConfig {
            level: get(ENV_LOG_LEVEL).unwrap_or_else(|| TelemetryConfig::default().level),
            format: get(ENV_LOG_FORMAT),
        };
        let catalog = load_catalog(&get, &intake.storage_root)?;

        debug!(
            bind_addr = %server.bind_addr,
            storage_root = %intake.storage_root.display(),
            languages = ?intake.language_names(),
            validation = intake.validation.as_str(),
            catalog = catalog.kind(),
            "configuration loaded"
        );

        Ok(Self {
            server,
            intake,
            telemetry,
            catalog,
        })
    }
}

fn load_server(get: &impl Fn(&str) -> Option<String>) -> ConfigResult<ServerConfig> {
    let defaults = ServerConfig::default();
    let bind_addr = match get(ENV_BIND_ADDR) {
        Some(value) => value
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::invalid_value(ENV_BIND_ADDR, value, "invalid_socket_addr"))?,
        None => defaults.bind_addr,
    };
    let max_upload_bytes = match get(ENV_MAX_UPLOAD_BYTES) {
        Some(value) => parse_positive_usize(ENV_MAX_UPLOAD_BYTES, &value)?,
        None => defaults.max_upload_bytes,
    };
    Ok(ServerConfig {
        bind_addr,
        max_upload_bytes,
    })
}

fn load_intake(get: &impl Fn(&str) -> Option<String>) -> ConfigResult<IntakeConfig> {
    let defaults = IntakeConfig::default();
    let storage_root = get(ENV_STORAGE_ROOT).map_or(defaults.storage_root, PathBuf::from);
    let languages = match get(ENV_LANGUAGES) {
        Some(value) => parse_languages(&value),
        None => defaults.languages,
    };
    let optional_folders = match get(ENV_OPTIONAL_FOLDERS) {
        Some(value) => split_list(&value, LIST_SEPARATOR),
        None => defaults.optional_folders,
    };
    let validation = match get(ENV_VALIDATION) {
        Some(value) => ValidationMode::parse(&value).ok_or_else(|| {
            ConfigError::invalid_value(ENV_VALIDATION, value, "unknown_validation_mode")
        })?,
        None => defaults.validation,
    };
    let require_owner = match get(ENV_REQUIRE_OWNER) {
        Some(value) => parse_bool(ENV_REQUIRE_OWNER, &value)?,
        None => defaults.require_owner,
    };
    let require_description = match get(ENV_REQUIRE_DESCRIPTION) {
        Some(value) => parse_bool(ENV_REQUIRE_DESCRIPTION, &value)?,
        None => defaults.require_description,
    };
    let upload_timeout = match get(ENV_UPLOAD_TIMEOUT_SECS) {
        Some(value) => {
            let secs = parse_positive_usize(ENV_UPLOAD_TIMEOUT_SECS, &value)?;
            Some(Duration::from_secs(u64::try_from(secs).unwrap_or(u64::MAX)))
        }
        None => defaults.upload_timeout,
    };

    Ok(IntakeConfig {
        storage_root,
        languages,
        optional_folders,
        validation,
        require_owner,
        require_description,
        upload_timeout,
    })
}

fn load_catalog(
    get: &impl Fn(&str) -> Option<String>,
    storage_root: &Path,
) -> ConfigResult<CatalogConfig> {
    let jsonl = || CatalogConfig::JsonLines {
        path: get(ENV_CATALOG_PATH)
            .map_or_else(|| storage_root.join(DEFAULT_CATALOG_FILE), PathBuf::from),
    };
    match get(ENV_CATALOG).map(|value| value.to_ascii_lowercase()) {
        Some(kind) => match kind.as_str() {
            "memory" => Ok(CatalogConfig::Memory),
            "jsonl" | "file" => Ok(jsonl()),
            "postgres" => get(ENV_DATABASE_URL)
                .map(|url| CatalogConfig::Postgres { url })
                .ok_or_else(|| {
                    ConfigError::invalid_field("catalog", "database_url", None, "missing")
                }),
            _ => Err(ConfigError::invalid_value(
                ENV_CATALOG,
                kind,
                "unknown_catalog_backend",
            )),
        },
        None => Ok(get(ENV_DATABASE_URL).map_or_else(jsonl, |url| CatalogConfig::Postgres { url })),
    }
}

/// Check the cross-field invariants of an intake configuration.
///
/// # Errors
///
/// Returns an error naming the first field that violates an invariant.
pub fn validate_intake(config: &IntakeConfig) -> ConfigResult<()> {
    if config.storage_root.as_os_str().is_empty() {
        return Err(ConfigError::invalid_field(
            "intake",
            "storage_root",
            None,
            "empty",
        ));
    }
    if config.languages.is_empty() {
        return Err(ConfigError::invalid_field(
            "intake",
            "languages",
            None,
            "empty",
        ));
    }

    let mut seen = HashSet::new();
    for contract in &config.languages {
        if contract.name.trim().is_empty() {
            return Err(ConfigError::invalid_field(
                "intake",
                "languages",
                Some(contract.name.clone()),
                "blank_language",
            ));
        }
        if !is_single_segment(&contract.name) {
            return Err(ConfigError::invalid_field(
                "intake",
                "languages",
                Some(contract.name.clone()),
                "language_not_a_folder_name",
            ));
        }
        if !seen.insert(contract.name.as_str()) {
            return Err(ConfigError::invalid_field(
                "intake",
                "languages",
                Some(contract.name.clone()),
                "duplicate_language",
            ));
        }
        for file in &contract.required_files {
            if !is_single_segment(file) {
                return Err(ConfigError::invalid_field(
                    "intake",
                    "required_files",
                    Some(file.clone()),
                    "not_a_plain_file_name",
                ));
            }
        }
    }

    for folder in &config.optional_folders {
        if !is_single_segment(folder) {
            return Err(ConfigError::invalid_field(
                "intake",
                "optional_folders",
                Some(folder.clone()),
                "not_a_plain_folder_name",
            ));
        }
    }

    Ok(())
}

fn is_single_segment(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty()
        && trimmed != "."
        && trimmed != ".."
        && !trimmed.contains(['/', '\\'])
}

fn parse_languages(value: &str) -> Vec<LanguageContract> {
    split_list(value, LIST_SEPARATOR)
        .into_iter()
        .map(|entry| {
            let (name, files) = entry
                .split_once(CONTRACT_SEPARATOR)
                .unwrap_or((entry.as_str(), ""));
            LanguageContract {
                name: name.trim().to_string(),
                required_files: split_list(files, FILE_SEPARATOR),
            }
        })
        .collect()
}

fn split_list(value: &str, separator: char) -> Vec<String> {
    value
        .split(separator)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(key: &'static str, value: &str) -> ConfigResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid_value(key, value, "invalid_bool")),
    }
}

fn parse_positive_usize(key: &'static str, value: &str) -> ConfigResult<usize> {
    match value.replace('_', "").parse::<usize>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        Ok(_) => Err(ConfigError::invalid_value(key, value, "must_be_positive")),
        Err(_) => Err(ConfigError::invalid_value(key, value, "invalid_integer")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() -> ConfigResult<()> {
        let config = AppConfig::from_lookup(lookup(&[]))?;
        assert_eq!(config, AppConfig::default());
        Ok(())
    }

    #[test]
    fn blank_values_are_ignored() -> ConfigResult<()> {
        let config = AppConfig::from_lookup(lookup(&[(ENV_BIND_ADDR, "   ")]))?;
        assert_eq!(config.server.bind_addr, ServerConfig::default().bind_addr);
        Ok(())
    }

    #[test]
    fn languages_parse_with_required_files() -> ConfigResult<()> {
        let config = AppConfig::from_lookup(lookup(&[(
            ENV_LANGUAGES,
            "R:Main.R, Python:main.py|requirements.txt ,Julia",
        )]))?;
        let languages = &config.intake.languages;
        assert_eq!(languages.len(), 3);
        assert_eq!(
            languages[1].required_files,
            vec!["main.py".to_string(), "requirements.txt".to_string()]
        );
        assert!(languages[2].required_files.is_empty());
        Ok(())
    }

    #[test]
    fn duplicate_language_is_rejected() {
        let result = AppConfig::from_lookup(lookup(&[(ENV_LANGUAGES, "R:Main.R,R:main.r")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidField {
                reason: "duplicate_language",
                ..
            })
        ));
    }

    #[test]
    fn required_file_with_separator_is_rejected() {
        let result = AppConfig::from_lookup(lookup(&[(ENV_LANGUAGES, "R:src/Main.R")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidField {
                field: "required_files",
                ..
            })
        ));
    }

    #[test]
    fn invalid_scalars_name_their_key() {
        let cases = [
            (ENV_BIND_ADDR, "localhost"),
            (ENV_MAX_UPLOAD_BYTES, "0"),
            (ENV_REQUIRE_OWNER, "maybe"),
            (ENV_VALIDATION, "scan"),
            (ENV_UPLOAD_TIMEOUT_SECS, "-1"),
        ];
        for (key, value) in cases {
            let result = AppConfig::from_lookup(lookup(&[(key, value)]));
            match result {
                Err(ConfigError::InvalidValue { key: reported, .. }) => assert_eq!(reported, key),
                other => panic!("expected invalid value for {key}, got {other:?}"),
            }
        }
    }

    #[test]
    fn database_url_selects_postgres_catalog() -> ConfigResult<()> {
        let config = AppConfig::from_lookup(lookup(&[(ENV_DATABASE_URL, "postgres://db/algr")]))?;
        assert_eq!(config.catalog.kind(), "postgres");

        let forced = AppConfig::from_lookup(lookup(&[
            (ENV_DATABASE_URL, "postgres://db/algr"),
            (ENV_CATALOG, "memory"),
        ]))?;
        assert_eq!(forced.catalog, CatalogConfig::Memory);
        Ok(())
    }

    #[test]
    fn postgres_catalog_requires_database_url() {
        let result = AppConfig::from_lookup(lookup(&[(ENV_CATALOG, "postgres")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidField {
                section: "catalog",
                ..
            })
        ));
    }

    #[test]
    fn intake_flags_and_timeout_are_parsed() -> ConfigResult<()> {
        let config = AppConfig::from_lookup(lookup(&[
            (ENV_REQUIRE_OWNER, "yes"),
            (ENV_REQUIRE_DESCRIPTION, "off"),
            (ENV_UPLOAD_TIMEOUT_SECS, "30"),
            (ENV_VALIDATION, "store_only"),
            (ENV_OPTIONAL_FOLDERS, "input,output,models"),
        ]))?;
        assert!(config.intake.require_owner);
        assert!(!config.intake.require_description);
        assert_eq!(config.intake.upload_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.intake.validation, ValidationMode::StoreOnly);
        assert_eq!(config.intake.optional_folders.len(), 3);
        Ok(())
    }
}
