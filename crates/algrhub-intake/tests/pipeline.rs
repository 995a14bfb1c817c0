//! End-to-end behaviour of the upload pipeline against a scratch storage root.

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use algrhub_config::{IntakeConfig, ValidationMode};
use algrhub_intake::{
    ErrorCode, FilePart, InFlightKind, IntakeError, MemoryCatalog, ServiceStateTracker,
    ServiceStatus, UploadOrchestrator, UploadRequest,
};
use algrhub_telemetry::Metrics;
use algrhub_test_support::archive::{ZipEntry, sample_package, zip_bytes};
use algrhub_test_support::fixtures::ScratchStorage;
use algrhub_test_support::io::{FailingReader, PendingReader};
use anyhow::{Result, bail};

struct Harness {
    scratch: ScratchStorage,
    catalog: Arc<MemoryCatalog>,
    tracker: Arc<ServiceStateTracker>,
    orchestrator: UploadOrchestrator,
}

fn harness_with(configure: impl FnOnce(&mut IntakeConfig)) -> Result<Harness> {
    let scratch = ScratchStorage::new()?;
    let mut config = IntakeConfig {
        storage_root: scratch.root().to_path_buf(),
        ..IntakeConfig::default()
    };
    configure(&mut config);
    let catalog = Arc::new(MemoryCatalog::new());
    let tracker = Arc::new(ServiceStateTracker::new());
    let orchestrator = UploadOrchestrator::new(config, catalog.clone(), Arc::clone(&tracker));
    Ok(Harness {
        scratch,
        catalog,
        tracker,
        orchestrator,
    })
}

fn harness() -> Result<Harness> {
    harness_with(|_| {})
}

fn request(language: &str, archive: Vec<u8>) -> UploadRequest<Cursor<Vec<u8>>> {
    UploadRequest::new(
        "sort-algo",
        "quicksort",
        language,
        "sort-algo.zip",
        Cursor::new(archive),
    )
}

#[tokio::test]
async fn accepts_valid_python_package() -> Result<()> {
    let h = harness()?;
    let accepted = h
        .orchestrator
        .upload(request("Python", sample_package("Python")?))
        .await?;

    let python_root = std::fs::canonicalize(h.scratch.root().join("Python"))?;
    assert!(accepted.path.starts_with(&python_root));
    let folder = accepted
        .path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    assert!(folder.starts_with("sort-algo-"));
    assert!(folder["sort-algo-".len()..].parse::<u64>().is_ok());
    assert!(accepted.path.join("main.py").is_file());
    assert!(accepted.path.join("input").is_dir());
    assert!(accepted.path.join("output").is_dir());
    assert!(accepted.path.join("sort-algo.zip").is_file());
    assert_eq!(accepted.sha256.len(), 64);

    let records = h.catalog.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].description, "quicksort");
    assert_eq!(records[0].language, "Python");
    assert_eq!(records[0].path, accepted.path.to_string_lossy());
    assert_eq!(h.tracker.current_status(), ServiceStatus::Idle);
    Ok(())
}

#[tokio::test]
async fn missing_entry_point_is_rejected_and_removed() -> Result<()> {
    let h = harness()?;
    let archive = zip_bytes(&[ZipEntry::file("README.md", b"no entry point")])?;
    let err = h.orchestrator.upload(request("Python", archive)).await.err();

    assert_eq!(
        err.as_ref().map(IntakeError::code),
        Some(ErrorCode::RequiredFileMissing)
    );
    assert!(h.scratch.instances("Python")?.is_empty());
    assert!(h.catalog.records().is_empty());
    assert_eq!(h.tracker.snapshot().checks, 0);
    Ok(())
}

#[tokio::test]
async fn upload_named_after_entry_point_does_not_satisfy_contract() -> Result<()> {
    let h = harness()?;
    let archive = zip_bytes(&[ZipEntry::file("README.md", b"no entry point")])?;
    let upload = UploadRequest::new(
        "sort-algo",
        "quicksort",
        "Python",
        "main.py",
        Cursor::new(archive),
    );
    let err = h.orchestrator.upload(upload).await.err();

    assert_eq!(
        err.as_ref().map(IntakeError::code),
        Some(ErrorCode::RequiredFileMissing)
    );
    assert!(h.scratch.instances("Python")?.is_empty());
    assert!(h.catalog.records().is_empty());
    Ok(())
}

#[tokio::test]
async fn missing_file_part_creates_nothing() -> Result<()> {
    let h = harness()?;
    let mut missing = request("Python", Vec::new());
    missing.file = None;
    let err = h.orchestrator.upload(missing).await.err();
    assert_eq!(
        err.as_ref().map(IntakeError::code),
        Some(ErrorCode::FileBodypartMissing)
    );

    let mut unnamed = request("Python", Vec::new());
    unnamed.file = Some(FilePart {
        file_name: None,
        reader: Cursor::new(Vec::new()),
    });
    let err = h.orchestrator.upload(unnamed).await.err();
    assert_eq!(
        err.as_ref().map(IntakeError::code),
        Some(ErrorCode::FileBodypartMissing)
    );
    assert!(!h.scratch.root().exists());
    Ok(())
}

#[tokio::test]
async fn blank_fields_create_nothing() -> Result<()> {
    let h = harness()?;
    let mut blank = request("Python", sample_package("Python")?);
    blank.name = Some("  ".into());
    let err = h.orchestrator.upload(blank).await.err();
    assert_eq!(err.as_ref().map(IntakeError::code), Some(ErrorCode::BlankParams));
    assert!(!h.scratch.root().exists());
    Ok(())
}

#[tokio::test]
async fn unsupported_language_is_rejected() -> Result<()> {
    let h = harness()?;
    let err = h
        .orchestrator
        .upload(request("Matlab", sample_package("Python")?))
        .await
        .err();
    assert_eq!(
        err.as_ref().map(IntakeError::code),
        Some(ErrorCode::UnsupportedLanguage)
    );
    assert!(!h.scratch.root().exists());
    Ok(())
}

#[tokio::test]
async fn concurrent_identical_uploads_get_distinct_folders() -> Result<()> {
    let h = harness_with(|config| config.require_owner = true)?;
    let first = request("R", sample_package("R")?).with_owner("u1");
    let second = request("R", sample_package("R")?).with_owner("u1");

    let (a, b) = tokio::join!(h.orchestrator.upload(first), h.orchestrator.upload(second));
    let (a, b) = (a?, b?);
    assert_ne!(a.path, b.path);
    for accepted in [&a, &b] {
        let folder = accepted
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        assert!(folder.starts_with("sort-algo-u1-"), "{folder}");
    }
    assert_eq!(h.scratch.instances("R")?.len(), 2);
    assert_eq!(h.catalog.records().len(), 2);
    Ok(())
}

#[tokio::test]
async fn broken_stream_removes_instance_and_in_flight_entry() -> Result<()> {
    let h = harness()?;
    let upload = UploadRequest::new(
        "sort-algo",
        "quicksort",
        "Python",
        "sort-algo.zip",
        FailingReader::after(vec![1_u8; 4096]),
    );
    let err = h.orchestrator.upload(upload).await.err();
    assert_eq!(
        err.as_ref().map(IntakeError::code),
        Some(ErrorCode::TransmissionFile)
    );
    assert!(h.scratch.instances("Python")?.is_empty());
    assert!(!h.tracker.is_in_flight(InFlightKind::Upload, "sort-algo.zip"));
    assert_eq!(h.tracker.current_status(), ServiceStatus::Idle);
    Ok(())
}

#[tokio::test]
async fn corrupt_archive_is_unzip_exception() -> Result<()> {
    let h = harness()?;
    let err = h
        .orchestrator
        .upload(request("R", b"not a zip at all".to_vec()))
        .await
        .err();
    assert_eq!(
        err.as_ref().map(IntakeError::code),
        Some(ErrorCode::UnzipException)
    );
    assert!(h.scratch.instances("R")?.is_empty());
    Ok(())
}

#[tokio::test]
async fn zip_slip_archive_is_rejected_without_escape() -> Result<()> {
    let h = harness()?;
    let archive = zip_bytes(&[
        ZipEntry::file("Main.R", b"print(1)"),
        ZipEntry::file("../../../escaped.R", b"evil"),
    ])?;
    let err = h.orchestrator.upload(request("R", archive)).await.err();
    assert_eq!(
        err.as_ref().map(IntakeError::code),
        Some(ErrorCode::UnzipException)
    );
    assert!(!h.scratch.base().join("escaped.R").exists());
    assert!(!h.scratch.root().join("escaped.R").exists());
    assert!(h.scratch.instances("R")?.is_empty());
    Ok(())
}

#[tokio::test]
async fn catalog_failure_is_a_transmission_error_with_cleanup() -> Result<()> {
    let h = harness()?;
    h.catalog.set_failing(true);
    let err = h
        .orchestrator
        .upload(request("R", sample_package("R")?))
        .await
        .err();
    assert_eq!(
        err.as_ref().map(IntakeError::code),
        Some(ErrorCode::TransmissionFile)
    );
    assert!(h.scratch.instances("R")?.is_empty());
    Ok(())
}

#[tokio::test]
async fn store_only_accepts_raw_files() -> Result<()> {
    let h = harness_with(|config| config.validation = ValidationMode::StoreOnly)?;
    let accepted = h
        .orchestrator
        .upload(UploadRequest::new(
            "raw",
            "not an archive",
            "R",
            "script.R",
            Cursor::new(b"print(1)".to_vec()),
        ))
        .await?;
    assert!(accepted.path.join("script.R").is_file());
    assert!(!accepted.path.join("input").exists());
    assert_eq!(accepted.size_bytes, 8);
    Ok(())
}

#[tokio::test]
async fn unavailable_storage_root_marks_degraded() -> Result<()> {
    let scratch = ScratchStorage::new()?;
    let blocker = scratch.base().join("blocker");
    std::fs::write(&blocker, b"file")?;
    let config = IntakeConfig {
        storage_root: blocker.join("algorithms"),
        ..IntakeConfig::default()
    };
    let orchestrator = UploadOrchestrator::new(
        config,
        Arc::new(MemoryCatalog::new()),
        Arc::new(ServiceStateTracker::new()),
    );
    let err = orchestrator
        .upload(request("R", sample_package("R")?))
        .await
        .err();
    assert_eq!(
        err.as_ref().map(IntakeError::code),
        Some(ErrorCode::CannotCreateFile)
    );
    assert!(orchestrator.storage_degraded());
    Ok(())
}

#[tokio::test]
async fn metrics_count_outcomes_and_stages() -> Result<()> {
    let scratch = ScratchStorage::new()?;
    let metrics = Metrics::new()?;
    let config = IntakeConfig {
        storage_root: scratch.root().to_path_buf(),
        ..IntakeConfig::default()
    };
    let orchestrator = UploadOrchestrator::new(
        config,
        Arc::new(MemoryCatalog::new()),
        Arc::new(ServiceStateTracker::with_metrics(metrics.clone())),
    )
    .with_metrics(metrics.clone());

    orchestrator
        .upload(request("R", sample_package("R")?))
        .await?;
    let _ = orchestrator.upload(request("Cobol", Vec::new())).await;

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.uploads_accepted_total, 1);
    assert_eq!(snapshot.uploads_rejected_total, 1);
    assert!(snapshot.upload_bytes_total > 0);
    let rendered = metrics.render()?;
    assert!(rendered.contains("pipeline_stage_total{stage=\"archive_contract\",status=\"completed\"} 1"));
    assert!(rendered.contains("upload_rejections_total{code=\"202\"} 1"));
    Ok(())
}

/// Archive large enough that expansion is still running when it is cancelled.
fn wide_package() -> Result<Vec<u8>> {
    let names: Vec<String> = (0..5_000).map(|index| format!("d{index}/f.txt")).collect();
    let mut entries = vec![ZipEntry::file("main.py", b"print('sort')")];
    entries.extend(names.iter().map(|name| ZipEntry::file(name, b"x")));
    zip_bytes(&entries)
}

/// Wait until every instance folder for `language` is gone and stays gone.
async fn settled_instances(h: &Harness, language: &str) -> Result<Vec<PathBuf>> {
    for _ in 0..500 {
        if h.scratch.instances(language)?.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    tokio::time::sleep(Duration::from_millis(200)).await;
    h.scratch.instances(language)
}

#[tokio::test]
async fn cancelled_receive_leaves_no_instance() -> Result<()> {
    let h = harness()?;
    let upload = UploadRequest::new(
        "sort-algo",
        "quicksort",
        "Python",
        "sort-algo.zip",
        PendingReader,
    );
    let outcome =
        tokio::time::timeout(Duration::from_millis(50), h.orchestrator.upload(upload)).await;
    assert!(outcome.is_err(), "pending upload should not complete");

    assert!(settled_instances(&h, "Python").await?.is_empty());
    assert_eq!(h.tracker.uploads_in_flight(), 0);
    assert_eq!(h.tracker.checks_in_flight(), 0);
    assert_eq!(h.tracker.current_status(), ServiceStatus::Idle);
    assert!(h.catalog.records().is_empty());
    Ok(())
}

#[tokio::test]
async fn cancelled_extraction_leaves_no_instance() -> Result<()> {
    let h = harness()?;
    let upload = h.orchestrator.upload(request("Python", wide_package()?));
    tokio::pin!(upload);

    let checking = async {
        while h.tracker.checks_in_flight() == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    };
    tokio::select! {
        result = &mut upload => {
            bail!(
                "upload finished before extraction was cancelled: {:?}",
                result.map(|ok| ok.path)
            );
        }
        () = checking => {}
    }
    drop(upload);

    assert!(settled_instances(&h, "Python").await?.is_empty());
    assert_eq!(h.tracker.uploads_in_flight(), 0);
    assert_eq!(h.tracker.checks_in_flight(), 0);
    assert!(h.catalog.records().is_empty());
    Ok(())
}

#[tokio::test]
async fn repeated_cancellations_never_orphan_folders() -> Result<()> {
    let h = harness()?;
    let package = wide_package()?;
    for millis in [5_u64, 10, 15, 20, 25] {
        let upload = h.orchestrator.upload(request("Python", package.clone()));
        // Uploads that finish inside the window are catalogued and kept.
        let _ = tokio::time::timeout(Duration::from_millis(millis), upload).await;
    }

    let catalogued: Vec<PathBuf> = h
        .catalog
        .records()
        .iter()
        .map(|record| PathBuf::from(&record.path))
        .collect();
    let python_root = std::fs::canonicalize(h.scratch.root().join("Python"))?;
    let orphans = || -> Result<Vec<PathBuf>> {
        Ok(h.scratch
            .instances("Python")?
            .into_iter()
            .filter_map(|folder| folder.file_name().map(|name| python_root.join(name)))
            .filter(|folder| !catalogued.contains(folder))
            .collect())
    };
    for _ in 0..500 {
        if orphans()?.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(orphans()?, Vec::<PathBuf>::new());
    assert_eq!(h.tracker.snapshot().uploads, 0);
    assert_eq!(h.tracker.snapshot().checks, 0);
    Ok(())
}
