//! Errors raised while hosting the API.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Failures binding or running the HTTP listener.
#[derive(Debug, Error)]
pub enum ApiServerError {
    /// The listener socket could not be bound.
    #[error("failed to bind API listener")]
    Bind {
        /// Requested address.
        addr: SocketAddr,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The server loop terminated with an error.
    #[error("API server terminated with an error")]
    Serve {
        /// Underlying IO error.
        source: io::Error,
    },
}
