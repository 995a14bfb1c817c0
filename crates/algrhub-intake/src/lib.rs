#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(unused, unreachable_pub, missing_docs)]
#![allow(clippy::module_name_repetitions)]

//! Algorithm package intake: validate, store, receive, expand, verify, catalogue.
//!
//! Layout: `params.rs` (request validation), `sanitize.rs` (safe names),
//! `layout.rs` (storage hierarchy), `receiver.rs` (streaming to disk),
//! `archive.rs` (zip expansion), `validator.rs` (package contract),
//! `scope.rs` (instance folder ownership shared with blocking work),
//! `stage.rs` (pluggable post-receive stages), `tracker.rs` (in-flight sets and
//! service status), `catalog.rs` (catalog collaborator), `service.rs`
//! (the orchestrator).

pub mod archive;
pub mod catalog;
pub mod error;
pub mod layout;
pub mod model;
pub mod params;
pub mod receiver;
pub mod sanitize;
pub mod scope;
pub mod service;
pub mod stage;
pub mod tracker;
pub mod validator;

pub use archive::{ArchiveExpander, ExpandReport};
pub use catalog::{
    AlgorithmCatalog, AlgorithmRecord, CatalogError, CatalogResult, JsonLinesCatalog,
    MemoryCatalog,
};
pub use error::{ArchiveError, ErrorCode, IntakeError, IntakeResult, ReceiveError};
pub use layout::{PackageInstance, StorageLayout};
pub use model::{AcceptedPackage, FilePart, UploadRequest};
pub use params::{ValidatedParams, validate_params};
pub use receiver::{PackageReceiver, ReceivedFile};
pub use scope::{InstanceScope, ScopeWork};
pub use service::UploadOrchestrator;
pub use stage::{ArchiveContractStage, PackageStage, StageContext, StageReport};
pub use tracker::{InFlightGuard, InFlightKind, ServiceStateTracker, ServiceStatus, TrackerSnapshot};
pub use validator::{ContractReport, PackageValidator};
