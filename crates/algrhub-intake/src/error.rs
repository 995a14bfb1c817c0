//! # Design
//!
//! - Provide structured, constant-message errors for every pipeline stage.
//! - Capture operation context (paths, fields, inputs) as fields, never in messages.
//! - Collapse every failure onto exactly one [`ErrorCode`] before it leaves the crate.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::catalog::CatalogError;

/// Result type for intake operations.
pub type IntakeResult<T> = Result<T, IntakeError>;

/// Closed set of outcome codes reported to clients.
///
/// Numeric values are part of the wire contract and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "u16")]
pub enum ErrorCode {
    /// Package accepted and catalogued.
    Success,
    /// A required string field was empty.
    BlankParams,
    /// Language not in the allow-list.
    UnsupportedLanguage,
    /// Stream copy failed, or catalog persistence failed.
    TransmissionFile,
    /// File part or its metadata absent from the submission.
    FileBodypartMissing,
    /// Archive extraction failed.
    UnzipException,
    /// Extracted package lacks a mandated file.
    RequiredFileMissing,
    /// Storage folders could not be created.
    CannotCreateFile,
    /// Unmapped internal failure.
    Unknown,
}

impl ErrorCode {
    /// Every code, in numeric order.
    pub const ALL: [Self; 9] = [
        Self::Success,
        Self::BlankParams,
        Self::UnsupportedLanguage,
        Self::TransmissionFile,
        Self::FileBodypartMissing,
        Self::UnzipException,
        Self::RequiredFileMissing,
        Self::CannotCreateFile,
        Self::Unknown,
    ];

    /// Stable numeric value.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        match self {
            Self::Success => 0,
            Self::BlankParams => 201,
            Self::UnsupportedLanguage => 202,
            Self::TransmissionFile => 203,
            Self::FileBodypartMissing => 204,
            Self::UnzipException => 205,
            Self::RequiredFileMissing => 206,
            Self::CannotCreateFile => 207,
            Self::Unknown => 299,
        }
    }

    /// Stable symbolic name used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::BlankParams => "blank_params",
            Self::UnsupportedLanguage => "unsupported_language",
            Self::TransmissionFile => "transmission_file",
            Self::FileBodypartMissing => "file_bodypart_missing",
            Self::UnzipException => "unzip_exception",
            Self::RequiredFileMissing => "required_file_missing",
            Self::CannotCreateFile => "cannot_create_file",
            Self::Unknown => "unknown",
        }
    }

    /// Human-readable message returned to clients.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Success => "algorithm upload successfully",
            Self::BlankParams => "Some parameters you input is empty or blank",
            Self::UnsupportedLanguage => "unsupported language",
            Self::TransmissionFile => {
                "server failed to receive the uploaded file, please try again"
            }
            Self::FileBodypartMissing => "the file bodypart is missing in the form",
            Self::UnzipException => {
                "server unzip file throws exception, please check whether the file is corrupt or not"
            }
            Self::RequiredFileMissing => {
                "uploaded zip file does not include all required files/folders"
            }
            Self::CannotCreateFile => {
                "Server cannot store your file at this time, please try again or contact administrator"
            }
            Self::Unknown => "unknown error",
        }
    }

    /// Whether this code reports an accepted package.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        code.as_u16()
    }
}

/// Failures while streaming an upload to disk.
#[derive(Debug, Error)]
pub enum ReceiveError {
    /// Reading from the client or writing to disk failed.
    #[error("receive io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Destination file.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The upload did not finish within the configured bound.
    #[error("receive timed out")]
    TimedOut {
        /// Configured bound.
        limit: Duration,
        /// Destination file.
        path: PathBuf,
    },
}

/// Failures while expanding an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Filesystem failure while reading the archive or writing entries.
    #[error("archive io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The archive is corrupt or uses unsupported features.
    #[error("archive decode failure")]
    Zip {
        /// Operation that triggered the archive failure.
        operation: &'static str,
        /// Archive path.
        path: PathBuf,
        /// Underlying zip error.
        source: zip::result::ZipError,
    },
    /// An entry would land outside the destination folder.
    #[error("archive entry escapes destination")]
    UnsafeEntry {
        /// Entry name as stored in the archive.
        entry: String,
        /// Static reason for the rejection.
        reason: &'static str,
    },
    /// The upload was abandoned while the archive was being expanded.
    #[error("archive expansion abandoned")]
    Abandoned {
        /// Entries processed before stopping.
        entries: usize,
    },
}

impl ArchiveError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn zip(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: zip::result::ZipError,
    ) -> Self {
        Self::Zip {
            operation,
            path: path.into(),
            source,
        }
    }
}

/// Errors produced by the upload pipeline.
#[derive(Debug, Error)]
pub enum IntakeError {
    /// The file part, or the file name attached to it, was not supplied.
    #[error("file part missing")]
    FileBodypartMissing {
        /// Static reason for the rejection.
        reason: &'static str,
    },
    /// A required text field was absent or blank.
    #[error("required field blank")]
    BlankParam {
        /// Field that failed validation.
        field: &'static str,
    },
    /// The language is not in the allow-list.
    #[error("unsupported language")]
    UnsupportedLanguage {
        /// Language supplied by the client.
        language: String,
    },
    /// The storage root could not be created; no upload can be accepted.
    #[error("storage root unavailable")]
    StorageUnavailable {
        /// Configured storage root.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// A language or instance folder could not be created.
    #[error("storage folder creation failed")]
    CreateFolder {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Folder that could not be created.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Streaming the upload failed.
    #[error("upload transmission failed")]
    Receive {
        /// Underlying receive error.
        #[source]
        source: ReceiveError,
    },
    /// Expanding the archive failed.
    #[error("archive extraction failed")]
    Extract {
        /// Archive that failed to expand.
        archive: PathBuf,
        /// Underlying archive error.
        #[source]
        source: ArchiveError,
    },
    /// The package does not satisfy its language contract.
    #[error("required package files missing")]
    RequiredFilesMissing {
        /// Required names that were absent.
        missing: Vec<String>,
    },
    /// The catalog refused or failed to store the package metadata.
    #[error("catalog persistence failed")]
    Catalog {
        /// Underlying catalog error.
        #[source]
        source: CatalogError,
    },
    /// Unexpected filesystem failure outside the mapped stages.
    #[error("intake io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// A blocking pipeline stage panicked or was cancelled.
    #[error("pipeline stage aborted")]
    StageAborted {
        /// Stage that was running.
        stage: &'static str,
        /// Underlying join error.
        source: tokio::task::JoinError,
    },
}

impl IntakeError {
    /// Map the failure onto the client-facing code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::FileBodypartMissing { .. } => ErrorCode::FileBodypartMissing,
            Self::BlankParam { .. } => ErrorCode::BlankParams,
            Self::UnsupportedLanguage { .. } => ErrorCode::UnsupportedLanguage,
            Self::StorageUnavailable { .. } | Self::CreateFolder { .. } => {
                ErrorCode::CannotCreateFile
            }
            Self::Receive { .. } | Self::Catalog { .. } => ErrorCode::TransmissionFile,
            Self::Extract { .. } => ErrorCode::UnzipException,
            Self::RequiredFilesMissing { .. } => ErrorCode::RequiredFileMissing,
            Self::Io { .. } | Self::StageAborted { .. } => ErrorCode::Unknown,
        }
    }

    /// Whether the failure was caused by the submitted input rather than the server.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::FileBodypartMissing { .. }
                | Self::BlankParam { .. }
                | Self::UnsupportedLanguage { .. }
                | Self::RequiredFilesMissing { .. }
        )
    }

    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn create_folder(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: io::Error,
    ) -> Self {
        Self::CreateFolder {
            operation,
            path: path.into(),
            source,
        }
    }
}

impl From<ReceiveError> for IntakeError {
    fn from(source: ReceiveError) -> Self {
        Self::Receive { source }
    }
}

impl From<CatalogError> for IntakeError {
    fn from(source: CatalogError) -> Self {
        Self::Catalog { source }
    }
}
