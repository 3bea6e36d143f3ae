//! GetWeights payload: every cell, zlib-compressed.

use crate::grid::{GridEngine, GridError};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use shared::WeightsSnapshot;
use std::io::{self, Write};

/// Copies every cell in row-major order. Called with the grid lock held.
pub fn capture<G: GridEngine>(grid: &G) -> Result<WeightsSnapshot, GridError> {
    let (width, height) = (grid.width(), grid.height());
    let mut cells = Vec::with_capacity(usize::from(width) * usize::from(height));
    for y in 0..height {
        for x in 0..width {
            cells.push(grid.weight(x, y)?);
        }
    }
    Ok(WeightsSnapshot {
        width,
        height,
        cells,
    })
}

/// Raw layout compressed at the best level. Runs outside the grid lock.
pub fn compress(snapshot: &WeightsSnapshot) -> io::Result<Vec<u8>> {
    let raw = snapshot
        .to_raw()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(raw.len() / 4), Compression::best());
    encoder.write_all(&raw)?;
    encoder.finish()
}
