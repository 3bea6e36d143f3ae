//! Typed binding for every call the map server understands.

use crate::error::ClientError;
use log::debug;
use shared::args::{
    AddBorderArgs, AddObstacleArgs, CallArgs, CellArgs, GetPathArgs, PathToArgs, PathToLineArgs,
    SetWeightArgs,
};
use shared::payload::{decode_path, decode_value};
use shared::{
    CallCode, FrameStream, Orientation, Point, Position, Response, Status, WeightsSnapshot,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// One connection to a map server.
///
/// Every response frame is acknowledged as it arrives and multi-frame
/// responses are reassembled before decoding. A FAILURE response becomes
/// [`ClientError::Failure`]; the connection stays usable unless the server
/// chose to close it.
pub struct MapClient<S = TcpStream> {
    stream: FrameStream<S>,
}

impl MapClient<TcpStream> {
    pub async fn connect(addr: &str) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| ClientError::Connect {
                addr: addr.to_string(),
                source,
            })?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not disable Nagle on {}: {}", addr, e);
        }
        Ok(Self::from_stream(stream))
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> MapClient<S> {
    pub fn from_stream(stream: S) -> Self {
        Self {
            stream: FrameStream::new(stream),
        }
    }

    /// Sends any header and argument bytes and returns the raw response,
    /// FAILURE included.
    pub async fn raw_call(&mut self, header: i32, args: &[u8]) -> Result<Response, ClientError> {
        Ok(self.stream.request(header, args).await?)
    }

    async fn call(&mut self, call: CallCode, args: &[u8]) -> Result<Vec<u8>, ClientError> {
        let response = self.raw_call(call.into(), args).await?;
        debug!("{} answered {:?} in {} frame(s)", call, response.status, response.frames);
        match response.status {
            Status::Success => Ok(response.payload),
            Status::Failure => Err(ClientError::Failure(response.text())),
            other => Err(ClientError::UnexpectedStatus(other)),
        }
    }

    async fn send<A: CallArgs>(&mut self, args: &A) -> Result<Vec<u8>, ClientError> {
        let bytes = args.encode()?;
        self.call(A::CALL, &bytes).await
    }

    async fn scalar(&mut self, call: CallCode) -> Result<i32, ClientError> {
        let payload = self.call(call, &[]).await?;
        Ok(decode_value(&payload)?)
    }

    pub async fn add_border(&mut self, border_width: i32, weight: i32, place: i32) -> Result<(), ClientError> {
        self.send(&AddBorderArgs {
            border_width,
            weight,
            place,
        })
        .await?;
        Ok(())
    }

    pub async fn add_obstacle(
        &mut self,
        x: i32,
        y: i32,
        radius: i32,
        weight: i32,
        gradient: bool,
    ) -> Result<(), ClientError> {
        self.send(&AddObstacleArgs {
            x,
            y,
            radius,
            weight,
            gradient: i32::from(gradient),
        })
        .await?;
        Ok(())
    }

    pub async fn get_path(&mut self, x1: i32, y1: i32, x2: i32, y2: i32) -> Result<Vec<Point>, ClientError> {
        let payload = self.send(&GetPathArgs { x1, y1, x2, y2 }).await?;
        Ok(decode_path(&payload)?)
    }

    pub async fn path_to_line(&mut self, x1: i32, y1: i32, x_target: i32) -> Result<Vec<Point>, ClientError> {
        let payload = self.send(&PathToLineArgs { x1, y1, x_target }).await?;
        Ok(decode_path(&payload)?)
    }

    /// Path from the stored robot position.
    pub async fn path_to(&mut self, x: i32, y: i32) -> Result<Vec<Point>, ClientError> {
        let payload = self.send(&PathToArgs { x, y }).await?;
        Ok(decode_path(&payload)?)
    }

    pub async fn width(&mut self) -> Result<i32, ClientError> {
        self.scalar(CallCode::GetWidth).await
    }

    pub async fn height(&mut self) -> Result<i32, ClientError> {
        self.scalar(CallCode::GetHeight).await
    }

    pub async fn max_weight(&mut self) -> Result<i32, ClientError> {
        self.scalar(CallCode::GetMaxWeight).await
    }

    pub async fn min_weight(&mut self) -> Result<i32, ClientError> {
        self.scalar(CallCode::GetMinWeight).await
    }

    pub async fn max_weight_in_map(&mut self) -> Result<i32, ClientError> {
        self.scalar(CallCode::GetMaxWeightInMap).await
    }

    pub async fn set_weight(&mut self, x: i32, y: i32, weight: i32) -> Result<(), ClientError> {
        self.send(&SetWeightArgs { x, y, weight }).await?;
        Ok(())
    }

    pub async fn weight(&mut self, x: i32, y: i32) -> Result<i32, ClientError> {
        let payload = self.send(&CellArgs { x, y }).await?;
        Ok(decode_value(&payload)?)
    }

    pub async fn reset_map(&mut self) -> Result<(), ClientError> {
        self.call(CallCode::ResetMap, &[]).await?;
        Ok(())
    }

    /// Every cell, decompressed.
    pub async fn weights(&mut self) -> Result<WeightsSnapshot, ClientError> {
        let payload = self.call(CallCode::GetWeights, &[]).await?;
        Ok(WeightsSnapshot::decode_compressed(&payload)?)
    }

    /// The server's text rendering of the map.
    pub async fn map_text(&mut self) -> Result<String, ClientError> {
        let response = self.raw_call(CallCode::GetString.into(), &[]).await?;
        match response.status {
            Status::Success => Ok(response.text()),
            Status::Failure => Err(ClientError::Failure(response.text())),
            other => Err(ClientError::UnexpectedStatus(other)),
        }
    }

    /// Asks the server to print the map on its own console.
    pub async fn debug_print(&mut self) -> Result<(), ClientError> {
        self.call(CallCode::DebugPrint, &[]).await?;
        Ok(())
    }

    pub async fn set_position(&mut self, x: i32, y: i32) -> Result<(), ClientError> {
        self.send(&Position { x, y }).await?;
        Ok(())
    }

    pub async fn position(&mut self) -> Result<Position, ClientError> {
        let payload = self.call(CallCode::GetPos, &[]).await?;
        Ok(decode_value(&payload)?)
    }

    pub async fn set_orientation(&mut self, roll: f64, pitch: f64, yaw: f64) -> Result<(), ClientError> {
        self.send(&Orientation { roll, pitch, yaw }).await?;
        Ok(())
    }

    pub async fn orientation(&mut self) -> Result<Orientation, ClientError> {
        let payload = self.call(CallCode::GetRollPitchYaw, &[]).await?;
        Ok(decode_value(&payload)?)
    }

    /// Stops the server. It closes this connection afterwards.
    pub async fn shutdown_server(&mut self) -> Result<(), ClientError> {
        self.call(CallCode::CloseServer, &[]).await?;
        Ok(())
    }

    /// Says goodbye with CloseConnection, then shuts the socket.
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.call(CallCode::CloseConnection, &[]).await?;
        self.disconnect().await
    }

    /// Shuts the socket without telling the server.
    pub async fn disconnect(mut self) -> Result<(), ClientError> {
        Ok(self.stream.shutdown().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::Frame;
    use tokio_test::io::Builder;

    fn ack() -> Frame {
        Frame::encode(Status::Acknowledge.into(), &[])
    }

    #[tokio::test]
    async fn test_width_exchange() {
        let request = Frame::encode(CallCode::GetWidth.into(), &[]);
        let reply = Frame::encode(Status::Success.into(), &270i32.to_le_bytes());
        let mock = Builder::new()
            .write(request.as_bytes())
            .read(reply.as_bytes())
            .write(ack().as_bytes())
            .build();

        let mut client = MapClient::from_stream(mock);
        assert_eq!(client.width().await.unwrap(), 270);
    }

    #[tokio::test]
    async fn test_set_weight_sends_typed_arguments() {
        let args = [2, 0, 0, 0, 3, 0, 0, 0, 50, 0, 0, 0];
        let request = Frame::encode(CallCode::SetWeight.into(), &args);
        let reply = Frame::encode(Status::Success.into(), &[]);
        let mock = Builder::new()
            .write(request.as_bytes())
            .read(reply.as_bytes())
            .write(ack().as_bytes())
            .build();

        let mut client = MapClient::from_stream(mock);
        client.set_weight(2, 3, 50).await.unwrap();
    }

    #[tokio::test]
    async fn test_failure_carries_server_message() {
        let request = Frame::encode(CallCode::GetWeight.into(), &[9, 0, 0, 0, 9, 0, 0, 0]);
        let reply = Frame::encode(Status::Failure.into(), b"cell (9, 9) is outside the 5x5 map");
        let mock = Builder::new()
            .write(request.as_bytes())
            .read(reply.as_bytes())
            .write(ack().as_bytes())
            .build();

        let mut client = MapClient::from_stream(mock);
        match client.weight(9, 9).await {
            Err(ClientError::Failure(message)) => {
                assert_eq!(message, "cell (9, 9) is outside the 5x5 map")
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_path_reassembled_from_two_frames() {
        let path: Vec<Point> = (0..300u16).map(|i| Point::new(i, i % 7)).collect();
        let payload = shared::payload::encode_path(&path).unwrap();
        let first = Frame::encode(Status::Continue.into(), &payload[..1020]);
        let second = Frame::encode(Status::Success.into(), &payload[1020..]);
        let request = Frame::encode(CallCode::PathTo.into(), &[1, 0, 0, 0, 1, 0, 0, 0]);
        let mock = Builder::new()
            .write(request.as_bytes())
            .read(first.as_bytes())
            .write(ack().as_bytes())
            .read(second.as_bytes())
            .write(ack().as_bytes())
            .build();

        let mut client = MapClient::from_stream(mock);
        assert_eq!(client.path_to(1, 1).await.unwrap(), path);
    }

    #[tokio::test]
    async fn test_orientation_decoding() {
        let mut payload = Vec::new();
        for value in [0.1f64, 0.2, -0.3] {
            payload.extend_from_slice(&value.to_le_bytes());
        }
        let request = Frame::encode(CallCode::GetRollPitchYaw.into(), &[]);
        let reply = Frame::encode(Status::Success.into(), &payload);
        let mock = Builder::new()
            .write(request.as_bytes())
            .read(reply.as_bytes())
            .write(ack().as_bytes())
            .build();

        let mut client = MapClient::from_stream(mock);
        let orientation = client.orientation().await.unwrap();
        assert_approx_eq!(orientation.roll, 0.1);
        assert_approx_eq!(orientation.pitch, 0.2);
        assert_approx_eq!(orientation.yaw, -0.3);
    }
}
