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

//! Telemetry primitives shared across the algrhub workspace.
//!
//! This crate centralises logging, metrics, and request-context helpers so the
//! intake pipeline and the HTTP surface report through one consistent channel.
//!
//! Layout: `init.rs` (subscriber install), `layers.rs` (request-id layers),
//! `context.rs` (task-local request context), `metrics.rs` (Prometheus registry),
//! `error.rs` (error type).

pub mod context;
pub mod error;
pub mod init;
pub mod layers;
pub mod metrics;

pub use context::{
    GlobalContextGuard, current_request_id, current_route, set_request_context, upload_span,
    with_request_context,
};
pub use error::{CollectorStep, Result, TelemetryError};
pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging};
pub use layers::{REQUEST_ID_HEADER, propagate_request_id_layer, set_request_id_layer};
pub use metrics::{Metrics, MetricsSnapshot, UPLOAD_COLLECTORS};
