//! # Weight Map Client Library
//!
//! Async client for the weight map server: a typed method per remote call
//! on [`MapClient`], plus a randomised load driver in [`fuzz`].
//!
//! Every response frame is acknowledged as soon as it arrives, so the server
//! can stream responses larger than one frame. FAILURE responses surface as
//! [`ClientError::Failure`] with the server's message.

pub mod error;
pub mod fuzz;
pub mod map_client;

pub use error::ClientError;
pub use map_client::MapClient;
