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

//! `PostgreSQL` catalog for accepted algorithm packages: migrations and queries.

pub mod catalog;
pub mod error;

pub use catalog::{PgCatalog, run_migrations};
pub use error::{DataError, Result as DataResult};
