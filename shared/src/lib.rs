//! # Weight Map Wire Protocol
//!
//! Everything both ends of a weight-map connection must agree on: the fixed
//! 1024-byte frame, the call and status codes, the typed argument layouts,
//! the path and snapshot payload formats, and the reliable transport that
//! moves frames over a byte stream.
//!
//! ## Framing
//! Every message in either direction is exactly [`FRAME_SIZE`] bytes: a
//! little-endian `i32` header followed by a zero-padded payload region of
//! [`PAYLOAD_CAPACITY`] bytes.
//!
//! ## Stop-and-Wait Responses
//! Responses longer than one payload region are split across frames. Every
//! frame but the last carries [`Status::Continue`]; the receiver must answer
//! each frame with an [`Status::Acknowledge`] frame before the next one is
//! sent. See [`transport::FrameStream`].
//!
//! ## Module Organization
//! - [`codes`]: call and status code tables
//! - [`frame`]: fixed-size frame codec
//! - [`args`]: bincode wire options and typed call arguments
//! - [`payload`]: scalar, path and weight-snapshot payloads
//! - [`transport`]: full-buffer I/O, chunked send and acknowledged receive
//! - [`error`]: transport faults and decode errors

pub mod args;
pub mod codes;
pub mod error;
pub mod frame;
pub mod payload;
pub mod transport;

pub use args::{wire_options, CallArgs, Orientation, Position};
pub use codes::{CallCode, Status};
pub use error::{ArgError, DecodeError, Fault};
pub use frame::{Frame, FRAME_SIZE, HEADER_SIZE, PAYLOAD_CAPACITY};
pub use payload::{Point, WeightsSnapshot};
pub use transport::{FrameStream, Response};

/// Cell coordinate along either axis.
pub type Coord = u16;

/// Traversal cost stored in one cell.
pub type Weight = u16;
