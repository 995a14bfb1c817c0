//! # Design
//!
//! - Centralize application-level errors for bootstrap and serving.
//! - Keep error messages constant while carrying context fields for debugging.

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration loading failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: algrhub_config::ConfigError,
    },
    /// API server operations failed.
    #[error("api server operation failed")]
    ApiServer {
        /// Operation identifier.
        operation: &'static str,
        /// Source API server error.
        source: algrhub_api::ApiServerError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: algrhub_telemetry::TelemetryError,
    },
    /// A file-backed catalog could not be opened.
    #[error("catalog operation failed")]
    Catalog {
        /// Operation identifier.
        operation: &'static str,
        /// Source catalog error.
        source: algrhub_intake::CatalogError,
    },
    /// The database catalog could not be opened.
    #[error("database operation failed")]
    Data {
        /// Operation identifier.
        operation: &'static str,
        /// Source data error.
        source: algrhub_data::DataError,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: algrhub_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn api_server(
        operation: &'static str,
        source: algrhub_api::ApiServerError,
    ) -> Self {
        Self::ApiServer { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: algrhub_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn catalog(
        operation: &'static str,
        source: algrhub_intake::CatalogError,
    ) -> Self {
        Self::Catalog { operation, source }
    }

    pub(crate) const fn data(operation: &'static str, source: algrhub_data::DataError) -> Self {
        Self::Data { operation, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::io;

    #[test]
    fn app_error_helpers_build_variants() {
        let api = AppError::api_server(
            "serve",
            algrhub_api::ApiServerError::Serve {
                source: io::Error::other("io"),
            },
        );
        assert!(matches!(api, AppError::ApiServer { operation: "serve", .. }));
        assert_eq!(api.to_string(), "api server operation failed");
        assert!(api.source().is_some());

        let catalog = AppError::catalog(
            "catalog.open",
            algrhub_intake::CatalogError::Unavailable {
                backend: "jsonl",
                reason: "not_a_file",
            },
        );
        assert!(matches!(catalog, AppError::Catalog { .. }));
    }
}
