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

//! Shared test helpers used across integration suites.
//! Layout: archive.rs (zip fixtures), io.rs (misbehaving readers),
//! fixtures.rs (scratch storage roots), postgres.rs (database discovery).

pub mod archive;
pub mod fixtures;
pub mod io;
pub mod postgres;
