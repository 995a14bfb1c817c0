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

//! HTTP surface for algorithm package uploads.
//!
//! Layout: `http/router.rs` (server host and middleware stack),
//! `http/upload.rs` (multipart intake), `http/health.rs` (status, health,
//! metrics), `http/telemetry.rs` (request metrics layer), `state.rs` (shared
//! handler state), `models.rs` (wire types).

pub mod error;
/// HTTP handlers, middleware, and router construction.
pub mod http;
pub mod models;
pub(crate) mod state;

pub use error::ApiServerError;
pub use http::router::ApiServer;
pub use models::{BaseResponse, HealthResponse, LanguagesResponse, ProblemDetails};
