//! Request and outcome types for the upload pipeline.
//!
//! # Design
//! - Text fields arrive exactly as the transport delivered them (absent or
//!   possibly blank); validation decides what they mean.
//! - The byte stream is any `AsyncRead`, so the pipeline is independent of
//!   the transport.

use std::path::PathBuf;

use serde::Serialize;

/// The file part of an upload.
#[derive(Debug)]
pub struct FilePart<R> {
    /// File name declared by the client, if any.
    pub file_name: Option<String>,
    /// Upload contents.
    pub reader: R,
}

/// One upload submission.
#[derive(Debug)]
pub struct UploadRequest<R> {
    /// Package name.
    pub name: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// Development language.
    pub language: Option<String>,
    /// Submitting user.
    pub owner_id: Option<String>,
    /// File part; `None` when the submission carried none.
    pub file: Option<FilePart<R>>,
}

impl<R> UploadRequest<R> {
    /// Request with every text field set and a named file part.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        language: impl Into<String>,
        file_name: impl Into<String>,
        reader: R,
    ) -> Self {
        Self {
            name: Some(name.into()),
            description: Some(description.into()),
            language: Some(language.into()),
            owner_id: None,
            file: Some(FilePart {
                file_name: Some(file_name.into()),
                reader,
            }),
        }
    }

    /// Attach an owner id.
    #[must_use]
    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }
}

/// A package that passed every stage and was catalogued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcceptedPackage {
    /// Package name as submitted.
    pub name: String,
    /// Development language.
    pub language: String,
    /// Canonical instance folder.
    pub path: PathBuf,
    /// Stored upload file name.
    pub file_name: String,
    /// SHA-256 of the uploaded file.
    pub sha256: String,
    /// Size of the uploaded file.
    pub size_bytes: u64,
}
