use crate::grid::GridError;
use shared::{ArgError, Fault};
use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// Why a single call could not be completed.
#[derive(Error, Debug)]
pub enum CallError {
    #[error(transparent)]
    Fault(#[from] Fault),

    /// The argument region was too short or malformed. Ends the connection.
    #[error("validation fault: {0}")]
    Validation(#[from] ArgError),

    /// The engine refused the input. The connection carries on.
    #[error(transparent)]
    Grid(#[from] GridError),

    /// Server state can no longer be trusted. Stops the whole server.
    #[error("internal invariant violated: {0}")]
    Invariant(String),
}

impl CallError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, CallError::Invariant(_))
    }
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("server stopped after an internal invariant fault: {0}")]
    InvariantViolated(String),
}
