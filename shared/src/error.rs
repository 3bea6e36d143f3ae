use crate::codes::CallCode;
use std::io;
use thiserror::Error;

/// Faults raised by the framed transport.
///
/// Transient conditions (`WouldBlock`, `Interrupted`) never surface here;
/// the transport retries them in place.
#[derive(Error, Debug)]
pub enum Fault {
    /// The peer closed, reset, or became unreachable.
    #[error("connection fault: {0}")]
    Connection(String),

    /// The peer broke the acknowledgement handshake.
    #[error("protocol fault: {0}")]
    Protocol(String),

    /// Any other socket failure.
    #[error("transport fault while {context}: {source}")]
    Transport {
        context: &'static str,
        #[source]
        source: io::Error,
    },
}

impl Fault {
    /// Classifies a non-transient I/O error raised while `context`.
    pub fn from_io(source: io::Error, context: &'static str) -> Self {
        use io::ErrorKind::*;

        match source.kind() {
            ConnectionReset | ConnectionAborted | BrokenPipe | NotConnected
            | ConnectionRefused | UnexpectedEof | NetworkUnreachable | NetworkDown
            | HostUnreachable => Fault::Connection(format!("{} while {}", source, context)),
            _ => Fault::Transport { context, source },
        }
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, Fault::Connection(_))
    }
}

/// Returns true for I/O errors the transport retries without giving up.
pub fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// A call's argument region could not be decoded.
#[derive(Error, Debug)]
pub enum ArgError {
    #[error("{call} expects at least {expected} argument bytes, got {actual}")]
    TooShort {
        call: CallCode,
        expected: usize,
        actual: usize,
    },

    #[error("malformed {call} arguments: {reason}")]
    Malformed { call: CallCode, reason: String },
}

/// A response payload did not match the shape its call promises.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("payload field could not be read: {0}")]
    Field(#[from] bincode::Error),

    #[error("snapshot could not be decompressed: {0}")]
    Decompress(#[from] io::Error),

    #[error("invalid payload: {0}")]
    Invalid(String),
}
