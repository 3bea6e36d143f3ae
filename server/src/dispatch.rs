//! Routes request frames to call handlers and sends their responses.
//!
//! Error policy per call:
//! - unknown header: FAILURE, connection continues
//! - engine refuses the input: FAILURE, connection continues
//! - arguments too short or malformed: FAILURE, connection ends
//! - internal invariant broken: FAILURE, connection ends, server stops
//! - transport fault: connection ends without a response

use crate::connection::ConnectionLog;
use crate::error::CallError;
use crate::grid::{BorderPlace, GridEngine, GridError};
use crate::snapshot;
use crate::state::SharedState;
use log::{debug, info, warn};
use serde::Serialize;
use shared::args::{
    AddBorderArgs, AddObstacleArgs, CallArgs, CellArgs, GetPathArgs, PathToArgs, PathToLineArgs,
    SetWeightArgs,
};
use shared::payload::{encode_path, encode_value};
use shared::{
    CallCode, Coord, Frame, FrameStream, Orientation, Point, Position, Status, Weight,
    PAYLOAD_CAPACITY,
};
use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};

/// What the connection worker does after a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum After {
    Continue,
    CloseConnection,
    StopServer,
}

/// A handler's response, sent once the handler has released every lock.
struct Outcome {
    status: Status,
    payload: Vec<u8>,
    after: After,
}

impl Outcome {
    fn success(payload: Vec<u8>) -> Self {
        Self {
            status: Status::Success,
            payload,
            after: After::Continue,
        }
    }

    fn empty() -> Self {
        Self::success(Vec::new())
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            status: Status::Failure,
            payload: message.into().into_bytes(),
            after: After::Continue,
        }
    }

    fn then(mut self, after: After) -> Self {
        self.after = after;
        self
    }
}

fn coord(what: &'static str, value: i32) -> Result<Coord, GridError> {
    Coord::try_from(value).map_err(|_| GridError::InvalidArgument {
        what,
        value: i64::from(value),
    })
}

fn point(x: i32, y: i32) -> Result<Point, GridError> {
    Ok(Point::new(coord("x coordinate", x)?, coord("y coordinate", y)?))
}

fn weight<G: GridEngine>(value: i32) -> Result<Weight, GridError> {
    Weight::try_from(value)
        .ok()
        .filter(|w| (G::MIN_WEIGHT..=G::MAX_WEIGHT).contains(w))
        .ok_or(GridError::WeightOutOfRange {
            weight: i64::from(value),
            min: G::MIN_WEIGHT,
            max: G::MAX_WEIGHT,
        })
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CallError> {
    encode_value(value).map_err(|e| CallError::Invariant(format!("response could not be encoded: {}", e)))
}

pub struct Dispatcher<G> {
    state: Arc<SharedState<G>>,
    connection_id: u64,
}

impl<G: GridEngine> Dispatcher<G> {
    pub fn new(state: Arc<SharedState<G>>, connection_id: u64) -> Self {
        Self {
            state,
            connection_id,
        }
    }

    /// Handles one request frame. Only the first `args_len` bytes of the
    /// payload region count as arguments.
    pub async fn dispatch<S>(
        &self,
        stream: &mut FrameStream<S>,
        log: &mut ConnectionLog,
        frame: &Frame,
        args_len: usize,
    ) -> Result<Flow, CallError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let args = &frame.payload()[..args_len.min(PAYLOAD_CAPACITY)];
        let call = match CallCode::try_from(frame.header()) {
            Ok(call) => call,
            Err(code) => {
                warn!("Connection {}: invalid call header {}", self.connection_id, code);
                log.record(format_args!("Invalid call header {}", code));
                stream
                    .send_response(Status::Failure, b"Invalid Call Header")
                    .await?;
                return Ok(Flow::Continue);
            }
        };

        let outcome = match self.handle(call, args, log).await {
            Ok(outcome) => outcome,
            Err(CallError::Grid(err)) => {
                debug!("Connection {}: {} rejected: {}", self.connection_id, call, err);
                log.record(format_args!("{} rejected: {}", call, err));
                Outcome::failure(err.to_string())
            }
            Err(CallError::Fault(fault)) => return Err(fault.into()),
            Err(err) => {
                log.record(format_args!("{} failed: {}", call, err));
                let report = err.to_string();
                if let Err(fault) = stream.send_response(Status::Failure, report.as_bytes()).await {
                    debug!(
                        "Connection {}: could not report failure: {}",
                        self.connection_id, fault
                    );
                }
                return Err(err);
            }
        };

        stream.send_response(outcome.status, &outcome.payload).await?;

        match outcome.after {
            After::Continue => Ok(Flow::Continue),
            After::CloseConnection => Ok(Flow::Close),
            After::StopServer => {
                if self.state.stop() {
                    info!("Connection {} shut the server down", self.connection_id);
                }
                Ok(Flow::Close)
            }
        }
    }

    fn trace(&self, log: &mut ConnectionLog, call: CallCode, details: fmt::Arguments<'_>) {
        debug!("Connection {}: {} {}", self.connection_id, call, details);
        log.record(format_args!("{} {}", call, details));
    }

    async fn handle(&self, call: CallCode, args: &[u8], log: &mut ConnectionLog) -> Result<Outcome, CallError> {
        match call {
            CallCode::AddBorder => self.add_border(args, log).await,
            CallCode::AddObstacle => self.add_obstacle(args, log).await,
            CallCode::GetPath => self.get_path(args, log).await,
            CallCode::PathToLine => self.path_to_line(args, log).await,
            CallCode::PathTo => self.path_to(args, log).await,
            CallCode::GetWidth => {
                self.trace(log, call, format_args!(""));
                Ok(Outcome::success(encode(&i32::from(self.state.width()))?))
            }
            CallCode::GetHeight => {
                self.trace(log, call, format_args!(""));
                Ok(Outcome::success(encode(&i32::from(self.state.height()))?))
            }
            CallCode::GetMaxWeight => {
                self.trace(log, call, format_args!(""));
                Ok(Outcome::success(encode(&i32::from(G::MAX_WEIGHT))?))
            }
            CallCode::GetMinWeight => {
                self.trace(log, call, format_args!(""));
                Ok(Outcome::success(encode(&i32::from(G::MIN_WEIGHT))?))
            }
            CallCode::GetMaxWeightInMap => {
                self.trace(log, call, format_args!(""));
                let max = self.state.with_grid(|grid| grid.max_weight_in_map()).await?;
                Ok(Outcome::success(encode(&i32::from(max))?))
            }
            CallCode::SetWeight => self.set_weight(args, log).await,
            CallCode::GetWeight => self.get_weight(args, log).await,
            CallCode::ResetMap => self.reset_map(log).await,
            CallCode::GetWeights => self.get_weights(log).await,
            CallCode::GetString => {
                self.trace(log, call, format_args!(""));
                let text = self.state.with_grid(|grid| grid.to_text()).await?;
                Ok(Outcome::success(text.into_bytes()))
            }
            CallCode::DebugPrint => {
                self.trace(log, call, format_args!(""));
                let text = self.state.with_grid(|grid| grid.to_text()).await?;
                println!("{}", text);
                Ok(Outcome::empty())
            }
            CallCode::SetPos => {
                let position = Position::decode(args)?;
                self.trace(log, call, format_args!("x={} y={}", position.x, position.y));
                self.state.set_position(position)?;
                Ok(Outcome::empty())
            }
            CallCode::GetPos => {
                self.trace(log, call, format_args!(""));
                Ok(Outcome::success(encode(&self.state.position()?)?))
            }
            CallCode::SetRollPitchYaw => {
                let orientation = Orientation::decode(args)?;
                self.trace(
                    log,
                    call,
                    format_args!(
                        "roll={} pitch={} yaw={}",
                        orientation.roll, orientation.pitch, orientation.yaw
                    ),
                );
                self.state.set_orientation(orientation)?;
                Ok(Outcome::empty())
            }
            CallCode::GetRollPitchYaw => {
                self.trace(log, call, format_args!(""));
                Ok(Outcome::success(encode(&self.state.orientation()?)?))
            }
            CallCode::CloseConnection => {
                self.trace(log, call, format_args!(""));
                Ok(Outcome::empty().then(After::CloseConnection))
            }
            CallCode::CloseServer => {
                self.trace(log, call, format_args!(""));
                Ok(Outcome::empty().then(After::StopServer))
            }
        }
    }

    async fn add_border(&self, args: &[u8], log: &mut ConnectionLog) -> Result<Outcome, CallError> {
        let a = AddBorderArgs::decode(args)?;
        self.trace(
            log,
            AddBorderArgs::CALL,
            format_args!("border_width={} weight={} place={}", a.border_width, a.weight, a.place),
        );
        let place = BorderPlace::from_code(a.place)?;
        let band = coord("border width", a.border_width)?;
        let weight = weight::<G>(a.weight)?;

        self.state
            .with_grid(move |grid| grid.add_border(band, weight, place))
            .await??;
        Ok(Outcome::empty())
    }

    async fn add_obstacle(&self, args: &[u8], log: &mut ConnectionLog) -> Result<Outcome, CallError> {
        let a = AddObstacleArgs::decode(args)?;
        self.trace(
            log,
            AddObstacleArgs::CALL,
            format_args!(
                "x={} y={} radius={} weight={} gradient={}",
                a.x, a.y, a.radius, a.weight, a.gradient
            ),
        );
        let center = point(a.x, a.y)?;
        let radius = u32::try_from(a.radius).map_err(|_| GridError::InvalidArgument {
            what: "radius",
            value: i64::from(a.radius),
        })?;
        let weight = weight::<G>(a.weight)?;
        let gradient = a.gradient != 0;

        self.state
            .with_grid(move |grid| grid.add_obstacle(center, radius, weight, gradient))
            .await??;
        Ok(Outcome::empty())
    }

    async fn get_path(&self, args: &[u8], log: &mut ConnectionLog) -> Result<Outcome, CallError> {
        let a = GetPathArgs::decode(args)?;
        self.trace(
            log,
            GetPathArgs::CALL,
            format_args!("from=({}, {}) to=({}, {})", a.x1, a.y1, a.x2, a.y2),
        );
        let from = point(a.x1, a.y1)?;
        let to = point(a.x2, a.y2)?;

        let path = self
            .state
            .with_grid(move |grid| grid.shortest_path(from, to))
            .await??;
        self.path_outcome(path)
    }

    async fn path_to_line(&self, args: &[u8], log: &mut ConnectionLog) -> Result<Outcome, CallError> {
        let a = PathToLineArgs::decode(args)?;
        self.trace(
            log,
            PathToLineArgs::CALL,
            format_args!("from=({}, {}) column={}", a.x1, a.y1, a.x_target),
        );
        let from = point(a.x1, a.y1)?;
        let column = coord("target column", a.x_target)?;

        let path = self
            .state
            .with_grid(move |grid| grid.shortest_path_to_column(from, column))
            .await??;
        self.path_outcome(path)
    }

    async fn path_to(&self, args: &[u8], log: &mut ConnectionLog) -> Result<Outcome, CallError> {
        let a = PathToArgs::decode(args)?;
        let position = self.state.position()?;
        self.trace(
            log,
            PathToArgs::CALL,
            format_args!("from=({}, {}) to=({}, {})", position.x, position.y, a.x, a.y),
        );
        let from = point(position.x, position.y)?;
        let to = point(a.x, a.y)?;

        let path = self
            .state
            .with_grid(move |grid| grid.shortest_path(from, to))
            .await??;
        self.path_outcome(path)
    }

    /// Compresses and smooths a raw search result outside the grid lock.
    fn path_outcome(&self, mut path: Vec<Point>) -> Result<Outcome, CallError> {
        G::compress_path(&mut path);
        G::smooth_path(&mut path, self.state.smoothing_ratio());

        let (width, height) = (self.state.width(), self.state.height());
        if let Some(off_map) = path.iter().find(|p| p.x >= width || p.y >= height) {
            return Err(CallError::Invariant(format!(
                "path search produced off-map point ({}, {})",
                off_map.x, off_map.y
            )));
        }

        let payload = encode_path(&path)
            .map_err(|e| CallError::Invariant(format!("path could not be encoded: {}", e)))?;
        debug!("Connection {}: path with {} points", self.connection_id, path.len());
        Ok(Outcome::success(payload))
    }

    async fn set_weight(&self, args: &[u8], log: &mut ConnectionLog) -> Result<Outcome, CallError> {
        let a = SetWeightArgs::decode(args)?;
        self.trace(
            log,
            SetWeightArgs::CALL,
            format_args!("x={} y={} weight={}", a.x, a.y, a.weight),
        );
        let cell = point(a.x, a.y)?;
        let weight = weight::<G>(a.weight)?;

        self.state
            .with_grid(move |grid| grid.set_weight(cell.x, cell.y, weight))
            .await??;
        Ok(Outcome::empty())
    }

    async fn get_weight(&self, args: &[u8], log: &mut ConnectionLog) -> Result<Outcome, CallError> {
        let a = CellArgs::decode(args)?;
        self.trace(log, CellArgs::CALL, format_args!("x={} y={}", a.x, a.y));
        let cell = point(a.x, a.y)?;

        let weight = self
            .state
            .with_grid(move |grid| grid.weight(cell.x, cell.y))
            .await??;
        Ok(Outcome::success(encode(&i32::from(weight))?))
    }

    /// Every cell back to the minimum in one critical section.
    async fn reset_map(&self, log: &mut ConnectionLog) -> Result<Outcome, CallError> {
        self.trace(log, CallCode::ResetMap, format_args!(""));
        self.state
            .with_grid(|grid| -> Result<(), GridError> {
                for y in 0..grid.height() {
                    for x in 0..grid.width() {
                        grid.set_weight(x, y, G::MIN_WEIGHT)?;
                    }
                }
                Ok(())
            })
            .await?
            .map_err(|e| CallError::Invariant(format!("reset rejected an on-map cell: {}", e)))?;
        Ok(Outcome::empty())
    }

    async fn get_weights(&self, log: &mut ConnectionLog) -> Result<Outcome, CallError> {
        self.trace(log, CallCode::GetWeights, format_args!(""));
        let snapshot = self
            .state
            .with_grid(|grid| snapshot::capture(&*grid))
            .await?
            .map_err(|e| CallError::Invariant(format!("snapshot read an off-map cell: {}", e)))?;

        match snapshot::compress(&snapshot) {
            Ok(compressed) if !compressed.is_empty() => Ok(Outcome::success(compressed)),
            Ok(_) => Ok(Outcome::failure("Compression produced no output")),
            Err(e) => Ok(Outcome::failure(format!("Compression failed: {}", e))),
        }
    }
}
