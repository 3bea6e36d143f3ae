//! Per-connection worker and its optional trace file.

use crate::dispatch::{Dispatcher, Flow};
use crate::error::CallError;
use crate::grid::GridEngine;
use crate::state::SharedState;
use log::{debug, error, info, warn};
use shared::{FrameStream, PAYLOAD_CAPACITY};
use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncRead, AsyncWrite};

pub fn unix_secs(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

/// Trace file for one connection. A disabled log swallows every record.
pub struct ConnectionLog {
    file: Option<(PathBuf, BufWriter<File>)>,
}

impl ConnectionLog {
    pub fn disabled() -> Self {
        Self { file: None }
    }

    /// Creates `Inst_<startup>_Conn_<id>_started_at_<now>.txt` in `dir`.
    pub fn create(dir: &Path, startup: u64, connection_id: u64, now: u64) -> io::Result<Self> {
        let path = dir.join(format!(
            "Inst_{}_Conn_{}_started_at_{}.txt",
            startup, connection_id, now
        ));
        let mut writer = BufWriter::new(File::create(&path)?);
        writeln!(writer, "{}", path.display())?;
        Ok(Self {
            file: Some((path, writer)),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.file.as_ref().map(|(path, _)| path.as_path())
    }

    pub fn record(&mut self, line: fmt::Arguments<'_>) {
        let failed = match &mut self.file {
            Some((path, writer)) => match writeln!(writer, "{}", line) {
                Ok(()) => false,
                Err(e) => {
                    warn!("Dropping connection log {}: {}", path.display(), e);
                    true
                }
            },
            None => false,
        };
        if failed {
            self.file = None;
        }
    }

    pub fn flush(&mut self) {
        if let Some((path, writer)) = &mut self.file {
            if let Err(e) = writer.flush() {
                warn!("Could not flush connection log {}: {}", path.display(), e);
            }
        }
    }
}

pub struct Connection<S> {
    id: u64,
    peer: String,
    stream: FrameStream<S>,
    log: ConnectionLog,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Connection<S> {
    pub fn new(id: u64, peer: impl Into<String>, stream: S, log: ConnectionLog) -> Self {
        Self {
            id,
            peer: peer.into(),
            stream: FrameStream::new(stream),
            log,
        }
    }

    /// Serves requests until the peer leaves, asks to close, the server
    /// stops, or a fault ends the connection. The terminating fault is
    /// returned so the caller can escalate invariant violations.
    pub async fn serve<G: GridEngine>(mut self, state: Arc<SharedState<G>>) -> Result<(), CallError> {
        info!("Connection {} opened from {}", self.id, self.peer);
        self.log
            .record(format_args!("Connection {} opened from {}", self.id, self.peer));

        let dispatcher = Dispatcher::new(Arc::clone(&state), self.id);
        let result = self.run(&dispatcher, &state).await;

        match &result {
            Ok(()) => info!("Connection {} closed", self.id),
            Err(CallError::Fault(fault)) if fault.is_connection() => {
                info!("Connection {} closed by peer: {}", self.id, fault)
            }
            Err(err) if err.is_fatal() => error!("Connection {} hit a fatal fault: {}", self.id, err),
            Err(err) => warn!("Connection {} terminated: {}", self.id, err),
        }
        match &result {
            Ok(()) => self.log.record(format_args!("Connection closed")),
            Err(err) => self.log.record(format_args!("Connection terminated: {}", err)),
        }
        self.log.flush();

        if let Err(fault) = self.stream.shutdown().await {
            debug!("Connection {} shutdown: {}", self.id, fault);
        }
        result
    }

    async fn run<G: GridEngine>(
        &mut self,
        dispatcher: &Dispatcher<G>,
        state: &SharedState<G>,
    ) -> Result<(), CallError> {
        while state.is_running() {
            let frame = self.stream.recv_frame().await?;
            let flow = dispatcher
                .dispatch(&mut self.stream, &mut self.log, &frame, PAYLOAD_CAPACITY)
                .await?;
            if flow == Flow::Close {
                break;
            }
        }
        Ok(())
    }
}
