//! # Weight Map Server Library
//!
//! A TCP server that owns one shared cost grid and answers remote calls that
//! edit it, query it, and run path searches over it for any number of
//! concurrently connected clients.
//!
//! ## Core Responsibilities
//!
//! ### Request Handling
//! Each accepted connection gets its own task that reads fixed-size request
//! frames, routes them through the [`dispatch::Dispatcher`], and sends the
//! response back with the stop-and-wait transfer from the `shared` crate.
//! Requests on one connection are handled strictly in order.
//!
//! ### Shared Map State
//! The grid, the robot position and the robot orientation live in
//! [`state::SharedState`], each behind its own lock. Every engine call runs
//! on the blocking pool while holding the grid lock, so a long path search
//! never stalls other connections' I/O and no handler ever sees a
//! half-applied mutation.
//!
//! ### Lifecycle
//! [`network::Server`] binds the listener, polls `accept` so it notices a
//! shutdown request within one poll interval, and stops the whole server if
//! any worker reports an internal invariant fault.
//!
//! ## Module Organization
//!
//! ### Grid (`grid`)
//! The [`grid::GridEngine`] trait and the reference [`grid::WeightMap`]:
//! - Border and obstacle painting
//! - 8-connected A* search, to a cell or to a column
//! - Path compression and ratio-bounded smoothing
//!
//! ### Dispatch (`dispatch`)
//! One handler per call code, argument validation, and the error policy that
//! decides whether a failure ends the call, the connection, or the server.
//!
//! ### Connection (`connection`)
//! The per-connection worker loop and its optional trace file.
//!
//! ### Network (`network`)
//! Listener setup with address-reuse fallback and the accept loop.
//!
//! ### Snapshot (`snapshot`)
//! The zlib-compressed bulk copy of every cell returned by GetWeights.

pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod grid;
pub mod network;
pub mod snapshot;
pub mod state;

pub use config::ServerConfig;
pub use error::{CallError, ServerError};
pub use grid::{GridEngine, WeightMap};
pub use network::{Server, ServerHandle};
