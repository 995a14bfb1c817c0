//! Pluggable post-receive stages.
//!
//! A stage inspects a received package before it is catalogued. The archive
//! contract stage expands and verifies; deployments that accept raw uploads
//! install no stage at all.

use std::sync::Arc;

use algrhub_config::LanguageContract;
use async_trait::async_trait;
use tracing::info;

use crate::archive::ArchiveExpander;
use crate::error::IntakeResult;
use crate::layout::PackageInstance;
use crate::receiver::ReceivedFile;
use crate::scope::InstanceScope;
use crate::tracker::ServiceStateTracker;
use crate::validator::PackageValidator;

/// Inputs available to a post-receive stage.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    /// Package name as submitted.
    pub package_name: &'a str,
    /// Contract of the package language.
    pub contract: &'a LanguageContract,
    /// Instance folder holding the upload.
    pub instance: &'a PackageInstance,
    /// Blocking work on the instance folder registers here.
    pub scope: &'a InstanceScope,
    /// The received upload.
    pub received: &'a ReceivedFile,
}

/// What a stage did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageReport {
    /// Archive entries expanded.
    pub entries: usize,
    /// Regular files in the package afterwards.
    pub files: usize,
    /// Optional folders the stage created.
    pub created_folders: Vec<String>,
}

/// A check run between receive and catalogue.
#[async_trait]
pub trait PackageStage: Send + Sync {
    /// Label used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Inspect the package; an error rejects the upload.
    async fn inspect(&self, ctx: StageContext<'_>) -> IntakeResult<StageReport>;
}

/// Expands the uploaded archive and verifies the language contract.
///
/// The package name sits in the checks set from the start of extraction to
/// the end of verification.
pub struct ArchiveContractStage {
    tracker: Arc<ServiceStateTracker>,
    expander: ArchiveExpander,
    validator: PackageValidator,
}

impl ArchiveContractStage {
    /// Stage creating `optional_folders` in every package.
    #[must_use]
    pub const fn new(tracker: Arc<ServiceStateTracker>, optional_folders: Vec<String>) -> Self {
        Self {
            tracker,
            expander: ArchiveExpander,
            validator: PackageValidator::new(optional_folders),
        }
    }
}

#[async_trait]
impl PackageStage for ArchiveContractStage {
    fn name(&self) -> &'static str {
        "archive_contract"
    }

    async fn inspect(&self, ctx: StageContext<'_>) -> IntakeResult<StageReport> {
        let _check = self.tracker.begin_check(ctx.package_name);
        let expanded = self.expander.expand(&ctx.received.path, ctx.scope).await?;
        info!(
            entries = expanded.entries,
            files = expanded.files,
            bytes = expanded.bytes,
            "archive expanded"
        );

        let contract = self
            .validator
            .validate(ctx.scope, ctx.contract, &ctx.received.path)
            .await?;
        Ok(StageReport {
            entries: expanded.entries,
            files: contract.files,
            created_folders: contract.created_folders,
        })
    }
}
