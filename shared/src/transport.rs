//! Reliable frame transport over any async byte stream.
//!
//! Full-buffer reads and writes retry transient errors in place and turn
//! everything else into a [`Fault`]. On top of that sit both halves of the
//! stop-and-wait response exchange: [`FrameStream::send_response`] for the
//! server and [`FrameStream::receive_response`] for the client.

use crate::codes::Status;
use crate::error::{is_transient, Fault};
use crate::frame::{Frame, FRAME_SIZE, PAYLOAD_CAPACITY};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// A fully reassembled response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    /// Concatenated payload regions of every frame, padding included.
    pub payload: Vec<u8>,
    pub frames: usize,
}

impl Response {
    /// The payload read as UTF-8 text with the zero padding removed.
    pub fn text(&self) -> String {
        let end = self
            .payload
            .iter()
            .rposition(|b| *b != 0)
            .map_or(0, |last| last + 1);
        String::from_utf8_lossy(&self.payload[..end]).into_owned()
    }
}

pub struct FrameStream<S> {
    stream: S,
}

impl<S> FrameStream<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> FrameStream<S> {
    /// Writes all of `buf`, resuming after partial writes.
    pub async fn send_all(&mut self, buf: &[u8]) -> Result<(), Fault> {
        let mut sent = 0;
        while sent < buf.len() {
            match self.stream.write(&buf[sent..]).await {
                Ok(0) => {
                    return Err(Fault::Connection(format!(
                        "peer stopped accepting data after {} of {} bytes",
                        sent,
                        buf.len()
                    )))
                }
                Ok(n) => sent += n,
                Err(e) if is_transient(&e) => tokio::task::yield_now().await,
                Err(e) => return Err(Fault::from_io(e, "sending")),
            }
        }
        Ok(())
    }

    /// Fills all of `buf`, resuming after partial reads.
    pub async fn recv_all(&mut self, buf: &mut [u8]) -> Result<(), Fault> {
        let mut received = 0;
        while received < buf.len() {
            match self.stream.read(&mut buf[received..]).await {
                Ok(0) => {
                    return Err(Fault::Connection(format!(
                        "peer closed the stream after {} of {} bytes",
                        received,
                        buf.len()
                    )))
                }
                Ok(n) => received += n,
                Err(e) if is_transient(&e) => tokio::task::yield_now().await,
                Err(e) => return Err(Fault::from_io(e, "receiving")),
            }
        }
        Ok(())
    }

    pub async fn send_frame(&mut self, frame: &Frame) -> Result<(), Fault> {
        self.send_all(frame.as_bytes()).await?;
        self.stream
            .flush()
            .await
            .map_err(|e| Fault::from_io(e, "flushing"))
    }

    pub async fn recv_frame(&mut self) -> Result<Frame, Fault> {
        let mut bytes = [0u8; FRAME_SIZE];
        self.recv_all(&mut bytes).await?;
        Ok(Frame::from_bytes(bytes))
    }

    /// Sends `payload` in as many frames as it needs, waiting for an
    /// acknowledgement after each one. Every frame but the last is marked
    /// [`Status::Continue`]; the last carries `status`.
    ///
    /// Returns the number of frames sent. Any reply other than an
    /// acknowledgement is a [`Fault::Protocol`].
    pub async fn send_response(&mut self, status: Status, payload: &[u8]) -> Result<usize, Fault> {
        let mut chunks = payload.chunks(PAYLOAD_CAPACITY).peekable();
        let mut sent = 0;

        loop {
            let chunk = chunks.next().unwrap_or(&[]);
            let last = chunks.peek().is_none();
            let header = if last { status } else { Status::Continue };

            self.send_frame(&Frame::encode(header.into(), chunk)).await?;
            sent += 1;

            let reply = self.recv_frame().await?;
            if reply.header() != i32::from(Status::Acknowledge) {
                return Err(Fault::Protocol(format!(
                    "expected acknowledgement for frame {}, got header {}",
                    sent,
                    reply.header()
                )));
            }

            if last {
                return Ok(sent);
            }
        }
    }

    pub async fn acknowledge(&mut self) -> Result<(), Fault> {
        self.send_frame(&Frame::encode(Status::Acknowledge.into(), &[]))
            .await
    }

    /// Receives one response, acknowledging every frame and concatenating
    /// payloads while the header is [`Status::Continue`].
    pub async fn receive_response(&mut self) -> Result<Response, Fault> {
        let mut payload = Vec::with_capacity(PAYLOAD_CAPACITY);
        let mut frames = 0;

        loop {
            let frame = self.recv_frame().await?;
            let status = match Status::try_from(frame.header()) {
                Ok(Status::Acknowledge) | Err(_) => {
                    return Err(Fault::Protocol(format!(
                        "unexpected response header {}",
                        frame.header()
                    )))
                }
                Ok(status) => status,
            };

            self.acknowledge().await?;
            frames += 1;
            payload.extend_from_slice(frame.payload());

            if status != Status::Continue {
                return Ok(Response {
                    status,
                    payload,
                    frames,
                });
            }
        }
    }

    /// Sends one request frame with a raw header and waits for its response.
    pub async fn request(&mut self, header: i32, args: &[u8]) -> Result<Response, Fault> {
        if args.len() > PAYLOAD_CAPACITY {
            return Err(Fault::Protocol(format!(
                "{} argument bytes do not fit in one frame",
                args.len()
            )));
        }
        self.send_frame(&Frame::encode(header, args)).await?;
        self.receive_response().await
    }

    pub async fn shutdown(&mut self) -> Result<(), Fault> {
        self.stream
            .shutdown()
            .await
            .map_err(|e| Fault::from_io(e, "shutting down"))
    }
}
