//! Error types for the audio pipeline library.

use std::net::SocketAddr;

/// Errors that can occur in the audio pipeline library.
///
/// Only construction-time and caller mistakes surface as `Err` values:
///
/// - **Config**: [`Config`](Self::Config) — invalid or incomplete
///   [`ServerConfig`](crate::ServerConfig), detected by
///   [`Server::new`](crate::Server::new).
/// - **Caller**: [`DuplicatePort`](Self::DuplicatePort) — a port address
///   registered twice.
///
/// Everything else follows the pipeline's drop-or-degrade policy: transient
/// input faults (unroutable datagrams, parse failures, pool exhaustion) are
/// counted and logged, session faults mark the session broken, and resource
/// faults end the run loop through [`Server::tick`](crate::Server::tick)
/// returning `false`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The server configuration is invalid (empty channel mask, zero tick
    /// size, or a missing required collaborator).
    #[error("invalid config: {0}")]
    Config(&'static str),

    /// A parser is already registered for this local address.
    #[error("port already registered: {0}")]
    DuplicatePort(SocketAddr),
}

/// Convenience alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
