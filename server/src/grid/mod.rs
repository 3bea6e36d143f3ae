//! Grid engine abstraction and the reference weight map.
//!
//! The server touches the map only through [`GridEngine`], always while
//! holding the grid lock, so engines need no internal synchronisation.

mod path;
mod search;
mod weight_map;

pub use path::{compress, smooth};
pub use weight_map::WeightMap;

use shared::{Coord, Point, Weight};
use std::fmt;
use thiserror::Error;

/// Edges selected by an AddBorder call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BorderPlace(u8);

impl BorderPlace {
    pub const TOP: BorderPlace = BorderPlace(1);
    pub const BOTTOM: BorderPlace = BorderPlace(2);
    pub const RIGHT: BorderPlace = BorderPlace(4);
    pub const LEFT: BorderPlace = BorderPlace(8);
    pub const ALL: BorderPlace = BorderPlace(15);

    /// Parses a wire bitmask. Empty masks and unknown bits are rejected.
    pub fn from_code(code: i32) -> Result<Self, GridError> {
        if code <= 0 || code > i32::from(Self::ALL.0) {
            return Err(GridError::InvalidBorderPlace(code));
        }
        Ok(BorderPlace(code as u8))
    }

    pub fn contains(self, other: BorderPlace) -> bool {
        self.0 & other.0 == other.0
    }
}

impl fmt::Display for BorderPlace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::TOP, "TOP"),
            (Self::BOTTOM, "BOTTOM"),
            (Self::RIGHT, "RIGHT"),
            (Self::LEFT, "LEFT"),
        ];
        let selected: Vec<&str> = names
            .iter()
            .filter(|(edge, _)| self.contains(*edge))
            .map(|(_, name)| *name)
            .collect();
        f.write_str(&selected.join("|"))
    }
}

/// The engine refused its input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    #[error("cell ({x}, {y}) is outside the {width}x{height} map")]
    OutOfBounds {
        x: i64,
        y: i64,
        width: Coord,
        height: Coord,
    },

    #[error("weight {weight} is outside {min}..={max}")]
    WeightOutOfRange { weight: i64, min: Weight, max: Weight },

    #[error("invalid border place mask {0}")]
    InvalidBorderPlace(i32),

    #[error("invalid {what}: {value}")]
    InvalidArgument { what: &'static str, value: i64 },
}

/// Operations the server needs from a cost grid.
pub trait GridEngine: Send + 'static {
    const MIN_WEIGHT: Weight;
    const MAX_WEIGHT: Weight;

    /// Dimensions never change after construction. The server caches them
    /// and answers GetWidth/GetHeight without taking the grid lock.
    fn width(&self) -> Coord;
    fn height(&self) -> Coord;

    /// Highest cost currently stored anywhere in the map.
    fn max_weight_in_map(&self) -> Weight;

    fn weight(&self, x: Coord, y: Coord) -> Result<Weight, GridError>;
    fn set_weight(&mut self, x: Coord, y: Coord, weight: Weight) -> Result<(), GridError>;

    fn add_border(&mut self, border_width: Coord, weight: Weight, place: BorderPlace) -> Result<(), GridError>;
    fn add_obstacle(&mut self, center: Point, radius: u32, weight: Weight, gradient: bool) -> Result<(), GridError>;

    /// Cheapest cell sequence from `from` to `to`, both inclusive. Empty when
    /// no route exists.
    fn shortest_path(&self, from: Point, to: Point) -> Result<Vec<Point>, GridError>;

    /// Cheapest cell sequence from `from` to any cell in `column`.
    fn shortest_path_to_column(&self, from: Point, column: Coord) -> Result<Vec<Point>, GridError>;

    fn compress_path(path: &mut Vec<Point>)
    where
        Self: Sized,
    {
        compress(path);
    }

    fn smooth_path(path: &mut Vec<Point>, allowed_ratio: f32)
    where
        Self: Sized,
    {
        smooth(path, allowed_ratio);
    }

    /// Human-readable rendering, one line per row.
    fn to_text(&self) -> String;
}
