//! Upload pipeline coordinator.
//!
//! # Design
//! - Stages run strictly in sequence; the first failure short-circuits.
//! - Once an instance folder exists, every failure removes it before the
//!   error is returned. A dropped (cancelled) upload abandons its
//!   [`InstanceScope`], which removes the folder after any blocking work on
//!   it has stopped.
//! - Only the orchestrator decides deletion; stages merely report.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use algrhub_config::{IntakeConfig, ValidationMode};
use algrhub_telemetry::{Metrics, upload_span};
use chrono::Utc;
use tokio::io::AsyncRead;
use tracing::{Instrument, debug, info, warn};

use crate::catalog::{AlgorithmCatalog, AlgorithmRecord};
use crate::error::{IntakeError, IntakeResult};
use crate::layout::{PackageInstance, StorageLayout};
use crate::model::{AcceptedPackage, UploadRequest};
use crate::params::{ValidatedParams, validate_params};
use crate::receiver::{PackageReceiver, ReceivedFile};
use crate::scope::InstanceScope;
use crate::stage::{ArchiveContractStage, PackageStage, StageContext};
use crate::tracker::ServiceStateTracker;

const STATUS_COMPLETED: &str = "completed";
const STATUS_FAILED: &str = "failed";

/// Coordinates validation, storage, receive, inspection and cataloguing.
pub struct UploadOrchestrator {
    config: Arc<IntakeConfig>,
    layout: StorageLayout,
    receiver: PackageReceiver,
    stage: Option<Arc<dyn PackageStage>>,
    catalog: Arc<dyn AlgorithmCatalog>,
    tracker: Arc<ServiceStateTracker>,
    metrics: Option<Metrics>,
    storage_degraded: AtomicBool,
}

impl UploadOrchestrator {
    /// Orchestrator for `config`.
    ///
    /// `ValidationMode::ExtractAndVerify` installs the archive contract stage;
    /// `ValidationMode::StoreOnly` installs none.
    #[must_use]
    pub fn new(
        config: IntakeConfig,
        catalog: Arc<dyn AlgorithmCatalog>,
        tracker: Arc<ServiceStateTracker>,
    ) -> Self {
        let stage: Option<Arc<dyn PackageStage>> = match config.validation {
            ValidationMode::ExtractAndVerify => Some(Arc::new(ArchiveContractStage::new(
                Arc::clone(&tracker),
                config.optional_folders.clone(),
            ))),
            ValidationMode::StoreOnly => None,
        };
        Self {
            layout: StorageLayout::new(config.storage_root.clone()),
            receiver: PackageReceiver::new(Arc::clone(&tracker), config.upload_timeout),
            config: Arc::new(config),
            stage,
            catalog,
            tracker,
            metrics: None,
            storage_degraded: AtomicBool::new(false),
        }
    }

    /// Report pipeline counters into `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Replace the post-receive stage; `None` accepts raw uploads.
    #[must_use]
    pub fn with_stage(mut self, stage: Option<Arc<dyn PackageStage>>) -> Self {
        self.stage = stage;
        self
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &IntakeConfig {
        &self.config
    }

    /// Shared in-flight tracker.
    #[must_use]
    pub const fn tracker(&self) -> &Arc<ServiceStateTracker> {
        &self.tracker
    }

    /// Whether the last attempt to create the storage root failed.
    #[must_use]
    pub fn storage_degraded(&self) -> bool {
        self.storage_degraded.load(Ordering::Acquire)
    }

    /// Run one upload through the pipeline.
    ///
    /// # Errors
    ///
    /// Returns the first failing stage's [`IntakeError`]; its
    /// [`IntakeError::code`] is the client-facing outcome. No instance folder
    /// survives an error.
    pub async fn upload<R>(&self, request: UploadRequest<R>) -> IntakeResult<AcceptedPackage>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.tracker.refresh_status();
        let span = upload_span(
            request.name.as_deref().unwrap_or_default(),
            request.language.as_deref().unwrap_or_default(),
        );
        let result = self.run(request).instrument(span.clone()).await;
        let _entered = span.enter();
        match &result {
            Ok(accepted) => {
                if let Some(metrics) = &self.metrics {
                    metrics.inc_upload_accepted();
                }
                info!(
                    path = %accepted.path.display(),
                    sha256 = %accepted.sha256,
                    size_bytes = accepted.size_bytes,
                    "Algorithm received successfully"
                );
            }
            Err(err) => {
                let code = err.code();
                if let Some(metrics) = &self.metrics {
                    metrics.inc_upload_rejected(code.as_u16());
                }
                warn!(
                    code = code.as_u16(),
                    reason = code.name(),
                    error = %err,
                    "Server respond with error"
                );
            }
        }
        result
    }

    async fn run<R>(&self, request: UploadRequest<R>) -> IntakeResult<AcceptedPackage>
    where
        R: AsyncRead + Unpin + Send,
    {
        let params = validate_params(&request, &self.config)?;
        let Some(file) = request.file else {
            return Err(IntakeError::FileBodypartMissing {
                reason: "file_part_absent",
            });
        };
        info!(file_name = %params.file_name, "algorithm upload request accepted for processing");

        match self.layout.ensure_root().await {
            Ok(root) => {
                if self.storage_degraded.swap(false, Ordering::AcqRel) {
                    info!(root = %root.display(), "storage root recovered");
                }
            }
            Err(err) => {
                if !self.storage_degraded.swap(true, Ordering::AcqRel) {
                    warn!(root = %self.layout.root().display(), "storage root unavailable");
                }
                return Err(err);
            }
        }
        let language_path = self.layout.ensure_language(&params.language).await?;
        let instance = self
            .layout
            .create_instance(&language_path, &params.name, params.owner_id.as_deref())
            .await?;
        tracing::Span::current().record("instance", instance.folder_name.as_str());
        debug!(path = %instance.instance_path.display(), "instance folder created");

        let scope = InstanceScope::new(&instance.instance_path);
        let mut cleanup = InstanceCleanup::arm(scope.clone());
        match self.populate(&params, &instance, &scope, file.reader).await {
            Ok(accepted) => {
                cleanup.disarm();
                Ok(accepted)
            }
            Err(err) => {
                let removed = StorageLayout::remove_quietly(&instance.instance_path).await;
                cleanup.disarm();
                debug!(removed, "instance folder cleanup after failure");
                Err(err)
            }
        }
    }

    async fn populate<R>(
        &self,
        params: &ValidatedParams,
        instance: &PackageInstance,
        scope: &InstanceScope,
        reader: R,
    ) -> IntakeResult<AcceptedPackage>
    where
        R: AsyncRead + Unpin + Send,
    {
        let received = self
            .record_stage(
                "receive",
                self.receiver
                    .receive(reader, &instance.instance_path, &params.file_name)
                    .await
                    .map_err(IntakeError::from),
            )?;
        if let Some(metrics) = &self.metrics {
            metrics.add_upload_bytes(received.bytes);
        }
        info!(
            bytes = received.bytes,
            sha256 = %received.sha256,
            "upload received"
        );

        self.inspect(params, instance, scope, &received).await?;

        let path = tokio::fs::canonicalize(&instance.instance_path)
            .await
            .map_err(|source| {
                IntakeError::io("orchestrator.canonicalize", &instance.instance_path, source)
            })?;
        let record = AlgorithmRecord {
            name: params.name.clone(),
            description: params.description.clone(),
            path: path.to_string_lossy().into_owned(),
            language: params.language.clone(),
            owner_id: params.owner_id.clone(),
            sha256: received.sha256.clone(),
            size_bytes: received.bytes,
            stored_at: Utc::now(),
        };
        self.record_stage(
            "catalog",
            self.catalog
                .store_algorithm(&record)
                .await
                .map_err(IntakeError::from),
        )?;
        info!(backend = self.catalog.backend(), "algorithm catalogued");

        Ok(AcceptedPackage {
            name: params.name.clone(),
            language: params.language.clone(),
            path,
            file_name: received.file_name,
            sha256: received.sha256,
            size_bytes: received.bytes,
        })
    }

    async fn inspect(
        &self,
        params: &ValidatedParams,
        instance: &PackageInstance,
        scope: &InstanceScope,
        received: &ReceivedFile,
    ) -> IntakeResult<()> {
        let Some(stage) = &self.stage else {
            return Ok(());
        };
        let contract = self.config.contract_for(&params.language).ok_or_else(|| {
            IntakeError::UnsupportedLanguage {
                language: params.language.clone(),
            }
        })?;
        let report = self.record_stage(
            stage.name(),
            stage
                .inspect(StageContext {
                    package_name: &params.name,
                    contract,
                    instance,
                    scope,
                    received,
                })
                .await,
        )?;
        info!(
            stage = stage.name(),
            entries = report.entries,
            files = report.files,
            created = ?report.created_folders,
            "package verified"
        );
        Ok(())
    }

    fn record_stage<T>(&self, stage: &str, result: IntakeResult<T>) -> IntakeResult<T> {
        if let Some(metrics) = &self.metrics {
            let status = if result.is_ok() {
                STATUS_COMPLETED
            } else {
                STATUS_FAILED
            };
            metrics.inc_pipeline_stage(stage, status);
        }
        result
    }
}

/// Abandons the instance scope if the upload future is dropped mid-flight.
struct InstanceCleanup {
    scope: Option<InstanceScope>,
}

impl InstanceCleanup {
    const fn arm(scope: InstanceScope) -> Self {
        Self { scope: Some(scope) }
    }

    fn disarm(&mut self) {
        self.scope = None;
    }
}

impl Drop for InstanceCleanup {
    fn drop(&mut self) {
        if let Some(scope) = self.scope.take() {
            debug!(path = %scope.path().display(), "upload dropped; abandoning instance folder");
            scope.abandon();
        }
    }
}
