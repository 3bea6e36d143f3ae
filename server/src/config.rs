use crate::error::ServerError;
use shared::Coord;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::PathBuf;

/// Smoothing ratio used when none, or an out-of-range one, is given.
pub const DEFAULT_SMOOTHING_RATIO: f32 = 0.95;

/// Lowest port the server accepts, apart from 0 (ephemeral) for tests.
pub const MIN_PORT: u16 = 1024;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: Ipv4Addr,
    pub port: u16,
    pub width: Coord,
    pub height: Coord,
    /// Log every call at debug level.
    pub verbose: bool,
    /// Write one trace file per connection into `log_dir`.
    pub log_connections: bool,
    pub log_dir: PathBuf,
    /// Deviation bound handed to path smoothing, in `(0, 1]`.
    pub smoothing_ratio: f32,
}

impl ServerConfig {
    pub fn new(port: u16, width: Coord, height: Coord) -> Self {
        Self {
            host: Ipv4Addr::UNSPECIFIED,
            port,
            width,
            height,
            verbose: false,
            log_connections: false,
            log_dir: PathBuf::from("."),
            smoothing_ratio: DEFAULT_SMOOTHING_RATIO,
        }
    }

    pub fn with_host(mut self, host: Ipv4Addr) -> Self {
        self.host = host;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Default `env_logger` filter; `RUST_LOG` still overrides it.
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "info"
        }
    }

    pub fn with_smoothing_ratio(mut self, ratio: Option<f32>) -> Self {
        self.smoothing_ratio = normalize_ratio(ratio);
        self
    }

    pub fn with_connection_logs(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.log_connections = true;
        self.log_dir = log_dir.into();
        self
    }

    pub fn validate(&self) -> Result<(), ServerError> {
        if self.port != 0 && self.port < MIN_PORT {
            return Err(ServerError::Config(format!(
                "port {} is reserved, use {} or above",
                self.port, MIN_PORT
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(ServerError::Config(format!(
                "map size {}x{} must be positive in both dimensions",
                self.width, self.height
            )));
        }
        if !(self.smoothing_ratio > 0.0 && self.smoothing_ratio <= 1.0) {
            return Err(ServerError::Config(format!(
                "smoothing ratio {} is outside (0, 1]",
                self.smoothing_ratio
            )));
        }
        if self.log_connections && !self.log_dir.is_dir() {
            return Err(ServerError::Config(format!(
                "log directory {} does not exist",
                self.log_dir.display()
            )));
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.host, self.port))
    }
}

/// Falls back to [`DEFAULT_SMOOTHING_RATIO`] for a missing ratio or one
/// outside `(0, 1]`.
pub fn normalize_ratio(ratio: Option<f32>) -> f32 {
    match ratio {
        Some(r) if r > 0.0 && r <= 1.0 => r,
        _ => DEFAULT_SMOOTHING_RATIO,
    }
}
