//! State shared by every connection worker.
//!
//! Lock order is fixed: a worker holds at most one of the grid, position and
//! orientation locks at any time, and never across an `.await`.

use crate::error::CallError;
use crate::grid::GridEngine;
use shared::{Coord, Orientation, Position};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub struct SharedState<G> {
    grid: Mutex<G>,
    // Cached from the engine, whose dimensions are fixed
    width: Coord,
    height: Coord,
    position: Mutex<Position>,
    orientation: Mutex<Orientation>,
    running: AtomicBool,
    smoothing_ratio: f32,
}

fn poisoned(what: &str) -> CallError {
    CallError::Invariant(format!("{} lock poisoned by a panicked worker", what))
}

impl<G: GridEngine> SharedState<G> {
    pub fn new(grid: G, smoothing_ratio: f32) -> Self {
        Self {
            width: grid.width(),
            height: grid.height(),
            grid: Mutex::new(grid),
            position: Mutex::new(Position::default()),
            orientation: Mutex::new(Orientation::default()),
            running: AtomicBool::new(true),
            smoothing_ratio,
        }
    }

    pub fn width(&self) -> Coord {
        self.width
    }

    pub fn height(&self) -> Coord {
        self.height
    }

    pub fn smoothing_ratio(&self) -> f32 {
        self.smoothing_ratio
    }

    /// Runs `f` on the blocking pool while holding the grid lock.
    ///
    /// A poisoned lock or a panic inside `f` is reported as
    /// [`CallError::Invariant`].
    pub async fn with_grid<F, R>(self: &Arc<Self>, f: F) -> Result<R, CallError>
    where
        F: FnOnce(&mut G) -> R + Send + 'static,
        R: Send + 'static,
    {
        let state = Arc::clone(self);
        tokio::task::spawn_blocking(move || {
            let mut grid = state.grid.lock().map_err(|_| poisoned("grid"))?;
            let result = f(&mut grid);
            Ok::<R, CallError>(result)
        })
        .await
        .map_err(|e| CallError::Invariant(format!("grid operation failed: {}", e)))?
    }

    pub fn position(&self) -> Result<Position, CallError> {
        self.position
            .lock()
            .map(|position| *position)
            .map_err(|_| poisoned("position"))
    }

    pub fn set_position(&self, position: Position) -> Result<(), CallError> {
        *self.position.lock().map_err(|_| poisoned("position"))? = position;
        Ok(())
    }

    pub fn orientation(&self) -> Result<Orientation, CallError> {
        self.orientation
            .lock()
            .map(|orientation| *orientation)
            .map_err(|_| poisoned("orientation"))
    }

    pub fn set_orientation(&self, orientation: Orientation) -> Result<(), CallError> {
        *self.orientation.lock().map_err(|_| poisoned("orientation"))? = orientation;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Clears the running flag. Returns true only for the call that
    /// actually stopped the server.
    pub fn stop(&self) -> bool {
        self.running.swap(false, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{BorderPlace, GridError, WeightMap};
    use assert_approx_eq::assert_approx_eq;
    use shared::Point;

    fn state(width: Coord, height: Coord) -> Arc<SharedState<WeightMap>> {
        Arc::new(SharedState::new(WeightMap::new(width, height), 0.95))
    }

    #[tokio::test]
    async fn test_with_grid_mutates_and_reads() {
        let state = state(4, 4);
        state
            .with_grid(|grid| grid.set_weight(1, 2, 30))
            .await
            .unwrap()
            .unwrap();
        let weight = state.with_grid(|grid| grid.weight(1, 2)).await.unwrap();
        assert_eq!(weight, Ok(30));
        assert_eq!(state.width(), 4);
        assert_eq!(state.height(), 4);
    }

    #[tokio::test]
    async fn test_cached_dimensions_match_engine_after_mutation() {
        let state = state(7, 3);
        state
            .with_grid(|grid| {
                grid.add_border(1, 100, BorderPlace::ALL)?;
                grid.add_obstacle(Point::new(3, 1), 5, 80, true)?;
                grid.set_weight(6, 2, WeightMap::MIN_WEIGHT)?;
                Ok::<(), GridError>(())
            })
            .await
            .unwrap()
            .unwrap();

        let engine_dims = state.with_grid(|grid| (grid.width(), grid.height())).await.unwrap();
        assert_eq!(engine_dims, (state.width(), state.height()));
        assert_eq!(engine_dims, (7, 3));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_reset_is_never_interleaved_with_writers() {
        let state = state(16, 4);

        let writers: Vec<_> = (0..2u16)
            .map(|row| {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    for round in 0..100u16 {
                        let x = round % 16;
                        state
                            .with_grid(move |grid| grid.set_weight(x, row, 200))
                            .await
                            .unwrap()
                            .unwrap();
                    }
                })
            })
            .collect();

        let resetter = {
            let state = Arc::clone(&state);
            tokio::spawn(async move {
                let mut clean = Vec::new();
                for _ in 0..50 {
                    let all_min = state
                        .with_grid(|grid| {
                            for y in 0..grid.height() {
                                for x in 0..grid.width() {
                                    grid.set_weight(x, y, WeightMap::MIN_WEIGHT).unwrap();
                                }
                            }
                            grid.max_weight_in_map() == WeightMap::MIN_WEIGHT
                        })
                        .await
                        .unwrap();
                    clean.push(all_min);
                }
                clean
            })
        };

        for writer in writers {
            writer.await.unwrap();
        }
        let clean = resetter.await.unwrap();
        assert!(clean.iter().all(|ok| *ok));
    }

    #[tokio::test]
    async fn test_panicking_engine_call_is_invariant_fault() {
        let state = state(2, 2);
        let err = state
            .with_grid(|_grid| panic!("engine bug"))
            .await
            .unwrap_err();
        assert!(err.is_fatal());

        // The panic poisoned the lock, so later calls fail the same way
        let err = state.with_grid(|grid| grid.width()).await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_pose_defaults_and_updates() {
        let state = state(2, 2);
        assert_eq!(state.position().unwrap(), Position { x: 0, y: 0 });
        state.set_position(Position { x: 7, y: -3 }).unwrap();
        assert_eq!(state.position().unwrap(), Position { x: 7, y: -3 });

        state
            .set_orientation(Orientation { roll: 0.1, pitch: 0.2, yaw: 3.1 })
            .unwrap();
        let orientation = state.orientation().unwrap();
        assert_approx_eq!(orientation.roll, 0.1);
        assert_approx_eq!(orientation.yaw, 3.1);
    }

    #[test]
    fn test_stop_happens_once() {
        let state = state(1, 1);
        assert!(state.is_running());
        assert!(state.stop());
        assert!(!state.stop());
        assert!(!state.is_running());
    }
}
