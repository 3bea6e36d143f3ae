use shared::{DecodeError, Fault, Status};
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("could not connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Fault(#[from] Fault),

    /// The server answered FAILURE; carries its message.
    #[error("server reported failure: {0}")]
    Failure(String),

    #[error("response ended with unexpected status {0:?}")]
    UnexpectedStatus(Status),

    #[error("could not decode response: {0}")]
    Decode(#[from] DecodeError),

    #[error("could not encode arguments: {0}")]
    Encode(#[from] bincode::Error),

    #[error("fuzz worker failed: {0}")]
    Worker(String),
}
