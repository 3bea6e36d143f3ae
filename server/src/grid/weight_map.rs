use super::search::{astar, octile};
use super::{BorderPlace, GridEngine, GridError};
use shared::{Coord, Point, Weight};
use std::fmt;

/// Dense row-major cost grid. Cells at [`WeightMap::MAX_WEIGHT`] are walls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightMap {
    width: Coord,
    height: Coord,
    cells: Vec<Weight>,
}

impl WeightMap {
    /// Creates a map with every cell at the minimum cost.
    pub fn new(width: Coord, height: Coord) -> Self {
        Self {
            width,
            height,
            cells: vec![Self::MIN_WEIGHT; usize::from(width) * usize::from(height)],
        }
    }

    fn check_point(&self, point: Point) -> Result<usize, GridError> {
        if point.x >= self.width || point.y >= self.height {
            return Err(GridError::OutOfBounds {
                x: i64::from(point.x),
                y: i64::from(point.y),
                width: self.width,
                height: self.height,
            });
        }
        Ok(self.index_of(point))
    }

    fn check_weight(weight: Weight) -> Result<(), GridError> {
        if !(Self::MIN_WEIGHT..=Self::MAX_WEIGHT).contains(&weight) {
            return Err(GridError::WeightOutOfRange {
                weight: i64::from(weight),
                min: Self::MIN_WEIGHT,
                max: Self::MAX_WEIGHT,
            });
        }
        Ok(())
    }

    /// Painting only ever raises a cell.
    fn raise(&mut self, index: usize, weight: Weight) {
        let cell = &mut self.cells[index];
        *cell = (*cell).max(weight);
    }

    pub(super) fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Index of an in-bounds point.
    pub(super) fn index_of(&self, point: Point) -> usize {
        usize::from(point.y) * usize::from(self.width) + usize::from(point.x)
    }

    pub(super) fn point_at(&self, index: usize) -> Point {
        let width = usize::from(self.width);
        Point::new((index % width) as Coord, (index / width) as Coord)
    }

    /// Neighbour of `point` shifted by `(dx, dy)`, if it is on the map.
    pub(super) fn offset(&self, point: Point, dx: i32, dy: i32) -> Option<Point> {
        let x = i32::from(point.x) + dx;
        let y = i32::from(point.y) + dy;
        if x < 0 || y < 0 || x >= i32::from(self.width) || y >= i32::from(self.height) {
            return None;
        }
        Some(Point::new(x as Coord, y as Coord))
    }

    pub(super) fn cost(&self, point: Point) -> Weight {
        self.cells[self.index_of(point)]
    }

    pub fn is_passable(&self, point: Point) -> bool {
        point.x < self.width && point.y < self.height && self.cost(point) < Self::MAX_WEIGHT
    }
}

impl GridEngine for WeightMap {
    const MIN_WEIGHT: Weight = 1;
    const MAX_WEIGHT: Weight = 255;

    fn width(&self) -> Coord {
        self.width
    }

    fn height(&self) -> Coord {
        self.height
    }

    fn max_weight_in_map(&self) -> Weight {
        self.cells.iter().copied().max().unwrap_or(Self::MIN_WEIGHT)
    }

    fn weight(&self, x: Coord, y: Coord) -> Result<Weight, GridError> {
        let index = self.check_point(Point::new(x, y))?;
        Ok(self.cells[index])
    }

    fn set_weight(&mut self, x: Coord, y: Coord, weight: Weight) -> Result<(), GridError> {
        Self::check_weight(weight)?;
        let index = self.check_point(Point::new(x, y))?;
        self.cells[index] = weight;
        Ok(())
    }

    fn add_border(&mut self, border_width: Coord, weight: Weight, place: BorderPlace) -> Result<(), GridError> {
        Self::check_weight(weight)?;
        let band = u32::from(border_width);
        let (width, height) = (u32::from(self.width), u32::from(self.height));

        for y in 0..height {
            for x in 0..width {
                let inside = (place.contains(BorderPlace::TOP) && y < band)
                    || (place.contains(BorderPlace::BOTTOM) && y + band >= height)
                    || (place.contains(BorderPlace::LEFT) && x < band)
                    || (place.contains(BorderPlace::RIGHT) && x + band >= width);
                if inside && band > 0 {
                    let index = self.index_of(Point::new(x as Coord, y as Coord));
                    self.raise(index, weight);
                }
            }
        }
        Ok(())
    }

    fn add_obstacle(&mut self, center: Point, radius: u32, weight: Weight, gradient: bool) -> Result<(), GridError> {
        Self::check_weight(weight)?;
        self.check_point(center)?;

        let r = i64::from(radius);
        let (cx, cy) = (i64::from(center.x), i64::from(center.y));
        let x_range = (cx - r).max(0)..=(cx + r).min(i64::from(self.width) - 1);
        let y_range = (cy - r).max(0)..=(cy + r).min(i64::from(self.height) - 1);

        for y in y_range {
            for x in x_range.clone() {
                let distance = ((x - cx) as f64).hypot((y - cy) as f64);
                if distance > f64::from(radius) {
                    continue;
                }
                let value = if gradient {
                    let scaled = f64::from(weight) * (1.0 - distance / (f64::from(radius) + 1.0));
                    (scaled.round() as Weight).max(Self::MIN_WEIGHT)
                } else {
                    weight
                };
                let index = self.index_of(Point::new(x as Coord, y as Coord));
                self.raise(index, value);
            }
        }
        Ok(())
    }

    fn shortest_path(&self, from: Point, to: Point) -> Result<Vec<Point>, GridError> {
        self.check_point(from)?;
        self.check_point(to)?;
        if !self.is_passable(to) {
            return Ok(Vec::new());
        }
        let scale = f64::from(Self::MIN_WEIGHT);
        Ok(astar(self, from, |p| p == to, |p| octile(p, to) * scale))
    }

    fn shortest_path_to_column(&self, from: Point, column: Coord) -> Result<Vec<Point>, GridError> {
        self.check_point(from)?;
        if column >= self.width {
            return Err(GridError::OutOfBounds {
                x: i64::from(column),
                y: i64::from(from.y),
                width: self.width,
                height: self.height,
            });
        }
        let scale = f64::from(Self::MIN_WEIGHT);
        Ok(astar(
            self,
            from,
            |p| p.x == column,
            |p| f64::from(p.x.abs_diff(column)) * scale,
        ))
    }

    fn to_text(&self) -> String {
        if self.width == 0 {
            return String::new();
        }
        self.cells
            .chunks(usize::from(self.width))
            .map(|row| {
                row.iter()
                    .map(|w| format!("{:>3}", w))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for WeightMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}
