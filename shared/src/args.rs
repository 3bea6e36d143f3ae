//! Typed argument layouts for request frames.
//!
//! Every field is a fixed-width little-endian value, so an argument struct
//! occupies exactly [`CallCode::min_args_len`] bytes at the start of the
//! payload region. Anything after that is padding and ignored.

use crate::codes::CallCode;
use crate::error::ArgError;
use bincode::Options;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Bincode configuration shared by every encoder and decoder on the wire:
/// fixed-width integers, little-endian, no length prefixes on structs.
pub fn wire_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .allow_trailing_bytes()
}

/// Arguments carried by one kind of request.
pub trait CallArgs: Serialize + DeserializeOwned {
    const CALL: CallCode;

    /// Decodes the arguments from the usable part of a payload region.
    fn decode(buf: &[u8]) -> Result<Self, ArgError> {
        let expected = Self::CALL.min_args_len();
        if buf.len() < expected {
            return Err(ArgError::TooShort {
                call: Self::CALL,
                expected,
                actual: buf.len(),
            });
        }
        wire_options()
            .deserialize(&buf[..expected])
            .map_err(|e| ArgError::Malformed {
                call: Self::CALL,
                reason: e.to_string(),
            })
    }

    fn encode(&self) -> Result<Vec<u8>, bincode::Error> {
        wire_options().serialize(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddBorderArgs {
    pub border_width: i32,
    pub weight: i32,
    /// Bitmask of edges, see `BorderPlace` on the server.
    pub place: i32,
}

impl CallArgs for AddBorderArgs {
    const CALL: CallCode = CallCode::AddBorder;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddObstacleArgs {
    pub x: i32,
    pub y: i32,
    pub radius: i32,
    pub weight: i32,
    /// Non-zero to fade the weight towards the rim.
    pub gradient: i32,
}

impl CallArgs for AddObstacleArgs {
    const CALL: CallCode = CallCode::AddObstacle;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetPathArgs {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl CallArgs for GetPathArgs {
    const CALL: CallCode = CallCode::GetPath;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathToLineArgs {
    pub x1: i32,
    pub y1: i32,
    /// Column any cell of which ends the search.
    pub x_target: i32,
}

impl CallArgs for PathToLineArgs {
    const CALL: CallCode = CallCode::PathToLine;
}

/// Destination for a search starting at the stored robot position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathToArgs {
    pub x: i32,
    pub y: i32,
}

impl CallArgs for PathToArgs {
    const CALL: CallCode = CallCode::PathTo;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetWeightArgs {
    pub x: i32,
    pub y: i32,
    pub weight: i32,
}

impl CallArgs for SetWeightArgs {
    const CALL: CallCode = CallCode::SetWeight;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellArgs {
    pub x: i32,
    pub y: i32,
}

impl CallArgs for CellArgs {
    const CALL: CallCode = CallCode::GetWeight;
}

/// Robot position, sent by SetPos and returned by GetPos.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl CallArgs for Position {
    const CALL: CallCode = CallCode::SetPos;
}

/// Robot orientation in radians.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl CallArgs for Orientation {
    const CALL: CallCode = CallCode::SetRollPitchYaw;
}
