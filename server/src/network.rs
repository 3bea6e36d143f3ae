//! Listener setup and the accept loop.

use crate::config::ServerConfig;
use crate::connection::{unix_secs, Connection, ConnectionLog};
use crate::error::ServerError;
use crate::grid::GridEngine;
use crate::state::SharedState;
use log::{debug, error, info, warn};
use shared::error::is_transient;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::mpsc;
use tokio::task;
use tokio::time::{sleep, timeout};

/// How long the accept loop waits before re-checking the running flag.
pub const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);
/// Pending connections the kernel queues for us.
pub const LISTEN_BACKLOG: u32 = 255;

/// Binds `addr`, retrying once with address reuse if it is still held by a
/// previous instance.
fn bind_listener(addr: SocketAddr) -> Result<TcpListener, ServerError> {
    let bind_err = |source: io::Error| ServerError::Bind { addr, source };

    let socket = TcpSocket::new_v4()?;
    match socket.bind(addr) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
            warn!("Address {} in use, retrying with address reuse", addr);
            socket.set_reuseaddr(true).map_err(bind_err)?;
            #[cfg(all(unix, not(target_os = "solaris"), not(target_os = "illumos")))]
            socket.set_reuseport(true).map_err(bind_err)?;
            socket.bind(addr).map_err(bind_err)?;
        }
        Err(e) => return Err(bind_err(e)),
    }
    socket.listen(LISTEN_BACKLOG).map_err(bind_err)
}

/// Opens the trace file for a connection on the blocking pool. Any failure
/// leaves the connection running without a trace file.
async fn open_connection_log(log_dir: Option<PathBuf>, startup_secs: u64, connection_id: u64) -> ConnectionLog {
    let Some(dir) = log_dir else {
        return ConnectionLog::disabled();
    };
    let now = unix_secs(SystemTime::now());
    let opened = task::spawn_blocking(move || ConnectionLog::create(&dir, startup_secs, connection_id, now)).await;
    match opened {
        Ok(Ok(log)) => log,
        Ok(Err(e)) => {
            warn!("Could not open log file for connection {}: {}", connection_id, e);
            ConnectionLog::disabled()
        }
        Err(e) => {
            warn!("Log file task for connection {} failed: {}", connection_id, e);
            ConnectionLog::disabled()
        }
    }
}

enum LoopEvent {
    Fatal(String),
    Accepted(io::Result<(TcpStream, SocketAddr)>),
    Idle,
}

/// Stops a running server from outside the accept loop.
pub struct ServerHandle<G> {
    state: Arc<SharedState<G>>,
}

impl<G> Clone for ServerHandle<G> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<G: GridEngine> ServerHandle<G> {
    pub fn stop(&self) -> bool {
        self.state.stop()
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }
}

pub struct Server<G> {
    listener: TcpListener,
    state: Arc<SharedState<G>>,
    config: ServerConfig,
    startup_secs: u64,
    next_connection_id: u64,
    fatal_tx: mpsc::UnboundedSender<String>,
    fatal_rx: mpsc::UnboundedReceiver<String>,
}

impl<G: GridEngine> Server<G> {
    /// Validates `config` and binds the listening socket. `grid` must have
    /// the dimensions the configuration names.
    pub async fn bind(config: ServerConfig, grid: G) -> Result<Self, ServerError> {
        config.validate()?;
        if (grid.width(), grid.height()) != (config.width, config.height) {
            return Err(ServerError::Config(format!(
                "grid is {}x{} but the configuration asks for {}x{}",
                grid.width(),
                grid.height(),
                config.width,
                config.height
            )));
        }

        let listener = bind_listener(config.socket_addr())?;
        let (fatal_tx, fatal_rx) = mpsc::unbounded_channel();

        Ok(Self {
            listener,
            state: Arc::new(SharedState::new(grid, config.smoothing_ratio)),
            config,
            startup_secs: unix_secs(SystemTime::now()),
            next_connection_id: 0,
            fatal_tx,
            fatal_rx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn handle(&self) -> ServerHandle<G> {
        ServerHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Accepts connections until the server is stopped, handing each one to
    /// its own task. Returns an error if any worker reports an invariant
    /// fault.
    pub async fn run(mut self) -> Result<(), ServerError> {
        info!("Server listening on {}", self.local_addr()?);

        while self.state.is_running() {
            let event = tokio::select! {
                Some(reason) = self.fatal_rx.recv() => LoopEvent::Fatal(reason),
                accepted = timeout(ACCEPT_POLL_INTERVAL, self.listener.accept()) => match accepted {
                    Ok(result) => LoopEvent::Accepted(result),
                    Err(_) => LoopEvent::Idle,
                },
            };

            match event {
                LoopEvent::Fatal(reason) => return Err(self.fail(reason)),
                LoopEvent::Accepted(Ok((stream, peer))) => self.spawn_connection(stream, peer),
                LoopEvent::Accepted(Err(e)) if is_transient(&e) => sleep(ACCEPT_POLL_INTERVAL).await,
                LoopEvent::Accepted(Err(e)) => {
                    warn!("Failed to accept connection: {}", e);
                    sleep(ACCEPT_POLL_INTERVAL).await;
                }
                LoopEvent::Idle => {}
            }
        }

        if let Ok(reason) = self.fatal_rx.try_recv() {
            return Err(self.fail(reason));
        }
        info!("Server stopped accepting connections");
        Ok(())
    }

    fn fail(&self, reason: String) -> ServerError {
        self.state.stop();
        error!("Stopping server: {}", reason);
        ServerError::InvariantViolated(reason)
    }

    fn spawn_connection(&mut self, stream: TcpStream, peer: SocketAddr) {
        self.next_connection_id += 1;
        let id = self.next_connection_id;

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Connection {}: could not disable Nagle: {}", id, e);
        }

        let log_dir = self
            .config
            .log_connections
            .then(|| self.config.log_dir.clone());
        let startup_secs = self.startup_secs;
        let state = Arc::clone(&self.state);
        let fatal_tx = self.fatal_tx.clone();

        tokio::spawn(async move {
            let log = open_connection_log(log_dir, startup_secs, id).await;
            let connection = Connection::new(id, peer.to_string(), stream, log);
            if let Err(err) = connection.serve(state).await {
                if err.is_fatal() && fatal_tx.send(format!("connection {}: {}", id, err)).is_err() {
                    debug!("Connection {}: accept loop already gone", id);
                }
            }
        });
        debug!("Task dispatched for connection {} from {}", id, peer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::WeightMap;
    use std::net::Ipv4Addr;

    fn loopback(width: u16, height: u16) -> ServerConfig {
        ServerConfig::new(0, width, height).with_host(Ipv4Addr::LOCALHOST)
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let server = Server::bind(loopback(5, 5), WeightMap::new(5, 5)).await.unwrap();
        let addr = server.local_addr().unwrap();
        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn test_bind_rejects_mismatched_grid() {
        let result = Server::bind(loopback(5, 5), WeightMap::new(4, 5)).await;
        assert!(matches!(result, Err(ServerError::Config(_))));
    }

    #[tokio::test]
    async fn test_bind_rejects_reserved_port() {
        let config = ServerConfig::new(22, 5, 5).with_host(Ipv4Addr::LOCALHOST);
        let result = Server::bind(config, WeightMap::new(5, 5)).await;
        assert!(matches!(result, Err(ServerError::Config(_))));
    }

    #[tokio::test]
    async fn test_stop_ends_run() {
        let server = Server::bind(loopback(3, 3), WeightMap::new(3, 3)).await.unwrap();
        let handle = server.handle();
        let task = tokio::spawn(server.run());

        sleep(Duration::from_millis(50)).await;
        assert!(handle.stop());

        let result = timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
        assert!(result.is_ok());
        assert!(!handle.is_running());
    }

    #[tokio::test]
    async fn test_bind_occupied_port_is_bind_error() {
        let first = Server::bind(loopback(3, 3), WeightMap::new(3, 3)).await.unwrap();
        let port = first.local_addr().unwrap().port();
        let same_port = ServerConfig::new(port, 3, 3).with_host(Ipv4Addr::LOCALHOST);

        let second = Server::bind(same_port.clone(), WeightMap::new(3, 3)).await;
        match second {
            Err(ServerError::Bind { addr, .. }) => assert_eq!(addr.port(), port),
            Err(other) => panic!("unexpected error {:?}", other),
            Ok(_) => panic!("bound a port that is already listening"),
        }

        drop(first);
        let rebound = Server::bind(same_port, WeightMap::new(3, 3)).await.unwrap();
        assert_eq!(rebound.local_addr().unwrap().port(), port);
    }

    #[tokio::test]
    async fn test_connection_log_created_per_connection() {
        let dir = std::env::temp_dir().join(format!("weightmap-net-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let log = open_connection_log(Some(dir.clone()), 1234, 9).await;
        let name = log.path().unwrap().file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.starts_with("Inst_1234_Conn_9_started_at_"));

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn test_connection_log_disabled_without_dir() {
        let log = open_connection_log(None, 1234, 9).await;
        assert!(log.path().is_none());
    }

    #[tokio::test]
    async fn test_unwritable_log_dir_falls_back_to_disabled() {
        let missing = std::env::temp_dir().join(format!("weightmap-missing-{}", std::process::id())).join("nested");
        let log = open_connection_log(Some(missing), 1, 1).await;
        assert!(log.path().is_none());
    }
}
