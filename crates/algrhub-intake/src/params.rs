//! Request parameter validation.
//!
//! Rules run in a fixed order and the first failure wins: file part, then
//! blank fields, then the language allow-list. Nothing here touches the
//! filesystem or reads the upload.

use algrhub_config::IntakeConfig;

use crate::error::{IntakeError, IntakeResult};
use crate::model::UploadRequest;
use crate::sanitize::declared_file_name;

/// Parameters that passed validation, normalised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedParams {
    /// Trimmed package name.
    pub name: String,
    /// Trimmed description; empty when absent and not required.
    pub description: String,
    /// Allow-listed language.
    pub language: String,
    /// Trimmed owner id, `None` when absent or blank and not required.
    pub owner_id: Option<String>,
    /// Final component of the declared file name.
    pub file_name: String,
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|value| value.trim()).filter(|value| !value.is_empty())
}

/// Validate `request` against `config`.
///
/// # Errors
///
/// Returns [`IntakeError::FileBodypartMissing`],
/// [`IntakeError::BlankParam`] or [`IntakeError::UnsupportedLanguage`].
pub fn validate_params<R>(
    request: &UploadRequest<R>,
    config: &IntakeConfig,
) -> IntakeResult<ValidatedParams> {
    let Some(file) = request.file.as_ref() else {
        return Err(IntakeError::FileBodypartMissing {
            reason: "file_part_absent",
        });
    };
    let Some(declared) = file.file_name.as_deref() else {
        return Err(IntakeError::FileBodypartMissing {
            reason: "file_name_absent",
        });
    };
    let Some(file_name) = declared_file_name(declared) else {
        return Err(IntakeError::FileBodypartMissing {
            reason: "file_name_unusable",
        });
    };

    let name = non_blank(request.name.as_ref()).ok_or(IntakeError::BlankParam { field: "name" })?;
    let description = non_blank(request.description.as_ref());
    if config.require_description && description.is_none() {
        return Err(IntakeError::BlankParam {
            field: "description",
        });
    }
    if non_blank(request.language.as_ref()).is_none() {
        return Err(IntakeError::BlankParam { field: "language" });
    }
    // Matched exactly as sent; surrounding whitespace is not forgiven.
    let language = request.language.as_deref().unwrap_or_default();
    let owner_id = non_blank(request.owner_id.as_ref());
    if config.require_owner && owner_id.is_none() {
        return Err(IntakeError::BlankParam { field: "user_id" });
    }

    if !config.supports(language) {
        return Err(IntakeError::UnsupportedLanguage {
            language: language.to_string(),
        });
    }

    Ok(ValidatedParams {
        name: name.to_string(),
        description: description.unwrap_or_default().to_string(),
        language: language.to_string(),
        owner_id: owner_id.map(str::to_string),
        file_name,
    })
}
