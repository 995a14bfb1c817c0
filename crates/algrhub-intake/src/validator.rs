//! Package contract verification after extraction.

use std::io;
use std::path::Path;

use algrhub_config::LanguageContract;
use walkdir::WalkDir;

use crate::error::{IntakeError, IntakeResult};
use crate::scope::InstanceScope;

/// Result of a successful contract check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractReport {
    /// Optional folders that had to be created.
    pub created_folders: Vec<String>,
    /// Regular files present in the package after the check.
    pub files: usize,
}

/// Checks an expanded package against its language contract.
#[derive(Debug, Clone)]
pub struct PackageValidator {
    optional_folders: Vec<String>,
}

impl PackageValidator {
    /// Validator that ensures `optional_folders` exist in every package.
    #[must_use]
    pub const fn new(optional_folders: Vec<String>) -> Self {
        Self { optional_folders }
    }

    /// Folders this validator creates when absent.
    #[must_use]
    pub fn optional_folders(&self) -> &[String] {
        &self.optional_folders
    }

    /// Run [`verify_contract`] on the scope's folder on the blocking pool.
    ///
    /// # Errors
    ///
    /// See [`verify_contract`]; a failed blocking task maps to
    /// [`IntakeError::StageAborted`] and an abandoned scope to
    /// [`IntakeError::Io`] with an interrupted source.
    pub async fn validate(
        &self,
        scope: &InstanceScope,
        contract: &LanguageContract,
        upload: &Path,
    ) -> IntakeResult<ContractReport> {
        let Some(work) = scope.enter() else {
            return Err(IntakeError::io(
                "validate.abandoned",
                scope.path(),
                io::ErrorKind::Interrupted.into(),
            ));
        };
        let folder = scope.path().to_path_buf();
        let contract = contract.clone();
        let optional = self.optional_folders.clone();
        let upload = upload.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let report = verify_contract(&folder, &contract, &optional, Some(&upload));
            drop(work);
            report
        })
        .await
        .map_err(|source| IntakeError::StageAborted {
            stage: "validate",
            source,
        })?
    }
}

/// Ensure optional folders exist, then require every contract file.
///
/// Optional folders are created first, so a package that fails the check has
/// still been mutated; callers discard the whole instance on failure. The
/// received upload at `upload` sits in the same folder under a client-chosen
/// name and never counts towards the contract.
///
/// # Errors
///
/// Returns [`IntakeError::CreateFolder`] if an optional folder cannot be
/// created, [`IntakeError::RequiredFilesMissing`] listing every absent
/// required name, and [`IntakeError::Io`] if the package cannot be walked.
pub fn verify_contract(
    folder: &Path,
    contract: &LanguageContract,
    optional_folders: &[String],
    upload: Option<&Path>,
) -> IntakeResult<ContractReport> {
    let mut report = ContractReport::default();
    for name in optional_folders {
        let path = folder.join(name);
        if path.exists() {
            continue;
        }
        match std::fs::create_dir(&path) {
            Ok(()) => report.created_folders.push(name.clone()),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {}
            Err(source) => {
                return Err(IntakeError::create_folder(
                    "validate.optional_folder",
                    path,
                    source,
                ));
            }
        }
    }

    let missing: Vec<String> = contract
        .required_files
        .iter()
        .filter(|name| {
            let path = folder.join(name.as_str());
            upload.is_some_and(|upload| upload == path) || !path.exists()
        })
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(IntakeError::RequiredFilesMissing { missing });
    }

    for entry in WalkDir::new(folder) {
        let entry = entry.map_err(|err| IntakeError::io("validate.walk", folder, err.into()))?;
        if entry.file_type().is_file() {
            report.files += 1;
        }
    }
    Ok(report)
}
