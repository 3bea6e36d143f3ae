//! Response payload formats.
//!
//! Payloads have no length prefix of their own; receivers rely on each
//! call's known shape and ignore the zero padding of the final frame.

use crate::args::wire_options;
use crate::error::DecodeError;
use crate::{Coord, Weight};
use bincode::Options;
use flate2::read::ZlibDecoder;
use serde::de::DeserializeOwned;
use serde::ser::{Error as _, SerializeTuple};
use serde::{Deserialize, Serialize, Serializer};
use std::io::Read;

/// A grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: Coord,
    pub y: Coord,
}

impl Point {
    pub const fn new(x: Coord, y: Coord) -> Self {
        Self { x, y }
    }
}

/// Encodes one fixed-size value (an `i32` scalar, a position, an orientation).
pub fn encode_value<T: Serialize>(value: &T) -> Result<Vec<u8>, bincode::Error> {
    wire_options().serialize(value)
}

/// Reads one fixed-size value from the front of a payload.
pub fn decode_value<T: DeserializeOwned>(payload: &[u8]) -> Result<T, DecodeError> {
    let mut cursor = payload;
    Ok(wire_options().deserialize_from(&mut cursor)?)
}

struct PathWire<'a>(&'a [Point]);

impl Serialize for PathWire<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let count = i32::try_from(self.0.len())
            .map_err(|_| S::Error::custom("path has more points than an i32 count can hold"))?;
        let mut tuple = serializer.serialize_tuple(self.0.len() + 1)?;
        tuple.serialize_element(&count)?;
        for point in self.0 {
            tuple.serialize_element(point)?;
        }
        tuple.end()
    }
}

/// Encodes a path as an `i32` point count followed by `u16` x, y pairs.
pub fn encode_path(path: &[Point]) -> Result<Vec<u8>, bincode::Error> {
    wire_options().serialize(&PathWire(path))
}

pub fn decode_path(payload: &[u8]) -> Result<Vec<Point>, DecodeError> {
    let mut cursor = payload;
    let count: i32 = wire_options().deserialize_from(&mut cursor)?;
    let count = usize::try_from(count)
        .map_err(|_| DecodeError::Invalid(format!("negative path length {}", count)))?;
    if cursor.len() < count * 4 {
        return Err(DecodeError::Invalid(format!(
            "path claims {} points but only {} bytes follow",
            count,
            cursor.len()
        )));
    }
    (0..count)
        .map(|_| {
            wire_options()
                .deserialize_from(&mut cursor)
                .map_err(DecodeError::from)
        })
        .collect()
}

/// Every cell cost of a map, row-major (outer loop over `y`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightsSnapshot {
    pub width: Coord,
    pub height: Coord,
    pub cells: Vec<Weight>,
}

impl WeightsSnapshot {
    pub fn weight(&self, x: Coord, y: Coord) -> Option<Weight> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.cells
            .get(usize::from(y) * usize::from(self.width) + usize::from(x))
            .copied()
    }

    /// Uncompressed layout: `u16` width, `u16` height, then the cells.
    pub fn to_raw(&self) -> Result<Vec<u8>, bincode::Error> {
        wire_options().serialize(self)
    }

    /// Inflates a zlib stream and parses the raw layout.
    pub fn decode_compressed(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut raw = Vec::new();
        ZlibDecoder::new(payload).read_to_end(&mut raw)?;

        let mut cursor = raw.as_slice();
        let width: Coord = wire_options().deserialize_from(&mut cursor)?;
        let height: Coord = wire_options().deserialize_from(&mut cursor)?;
        let expected = usize::from(width) * usize::from(height);
        if cursor.len() != expected * 2 {
            return Err(DecodeError::Invalid(format!(
                "{}x{} snapshot needs {} cell bytes, found {}",
                width,
                height,
                expected * 2,
                cursor.len()
            )));
        }
        let cells = (0..expected)
            .map(|_| wire_options().deserialize_from(&mut cursor))
            .collect::<Result<Vec<Weight>, _>>()?;

        Ok(Self { width, height, cells })
    }
}

impl Serialize for WeightsSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(self.cells.len() + 2)?;
        tuple.serialize_element(&self.width)?;
        tuple.serialize_element(&self.height)?;
        for cell in &self.cells {
            tuple.serialize_element(cell)?;
        }
        tuple.end()
    }
}
