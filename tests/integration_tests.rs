//! Integration tests for the weight map server and client
//!
//! Every test runs a real server on an ephemeral loopback port and talks to
//! it over TCP.

use client::fuzz::{self, FuzzConfig};
use client::{ClientError, MapClient};
use server::grid::{BorderPlace, GridError};
use server::{GridEngine, Server, ServerConfig, ServerError, ServerHandle, WeightMap};
use shared::{CallCode, Coord, Frame, Point, Status, Weight, FRAME_SIZE, PAYLOAD_CAPACITY};
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const DEADLINE: Duration = Duration::from_secs(10);

async fn start_server<G: GridEngine>(
    grid: G,
) -> (String, ServerHandle<G>, JoinHandle<Result<(), ServerError>>) {
    let config = ServerConfig::new(0, grid.width(), grid.height()).with_host(Ipv4Addr::LOCALHOST);
    let server = Server::bind(config, grid).await.unwrap();
    let addr = server.local_addr().unwrap().to_string();
    let handle = server.handle();
    let task = tokio::spawn(server.run());
    (addr, handle, task)
}

async fn start_map(width: Coord, height: Coord) -> (String, ServerHandle<WeightMap>, JoinHandle<Result<(), ServerError>>) {
    start_server(WeightMap::new(width, height)).await
}

/// PROTOCOL TESTS
mod protocol_tests {
    use super::*;

    /// Tests that a painted border is visible through GetWeight
    #[tokio::test]
    async fn border_then_get_weight() {
        let (addr, handle, _task) = start_map(10, 10).await;
        let mut client = MapClient::connect(&addr).await.unwrap();

        client.add_border(2, 255, 15).await.unwrap();
        assert_eq!(client.weight(0, 0).await.unwrap(), 255);
        assert_eq!(client.weight(9, 4).await.unwrap(), 255);
        assert_eq!(client.weight(5, 5).await.unwrap(), 1);

        client.close().await.unwrap();
        handle.stop();
    }

    /// Tests that an unknown header is answered with FAILURE and the
    /// connection stays usable
    #[tokio::test]
    async fn unknown_call_keeps_connection() {
        let (addr, handle, _task) = start_map(6, 4).await;
        let mut client = MapClient::connect(&addr).await.unwrap();

        let response = client.raw_call(77, &[]).await.unwrap();
        assert_eq!(response.status, Status::Failure);
        assert_eq!(response.text(), "Invalid Call Header");

        assert_eq!(client.width().await.unwrap(), 6);
        client.close().await.unwrap();
        handle.stop();
    }

    /// Tests that responses are split into max(1, ceil(L / 1020)) frames
    #[tokio::test]
    async fn large_response_chunk_count() {
        let (addr, handle, _task) = start_map(100, 100).await;
        let mut client = MapClient::connect(&addr).await.unwrap();

        let response = client.raw_call(CallCode::GetString.into(), &[]).await.unwrap();
        let text = response.text();
        assert_eq!(text.lines().count(), 100);
        assert_eq!(response.frames, Frame::chunk_count(text.len()));
        assert_eq!(response.frames, text.len().div_ceil(PAYLOAD_CAPACITY));

        let empty = client.raw_call(CallCode::ResetMap.into(), &[]).await.unwrap();
        assert_eq!(empty.frames, 1);

        client.close().await.unwrap();
        handle.stop();
    }

    /// Tests that answering a CONTINUE frame with anything but an
    /// acknowledgement makes the server drop the connection
    #[tokio::test]
    async fn non_ack_reply_terminates_connection() {
        let (addr, handle, _task) = start_map(100, 100).await;
        let mut raw = TcpStream::connect(&addr).await.unwrap();

        let request = Frame::encode(CallCode::GetString.into(), &[]);
        raw.write_all(request.as_bytes()).await.unwrap();

        let mut buf = [0u8; FRAME_SIZE];
        raw.read_exact(&mut buf).await.unwrap();
        assert_eq!(Frame::from_bytes(buf).header(), i32::from(Status::Continue));

        let wrong = Frame::encode(Status::Success.into(), &[]);
        raw.write_all(wrong.as_bytes()).await.unwrap();

        let read = timeout(DEADLINE, raw.read(&mut buf)).await.unwrap();
        assert!(matches!(read, Ok(0) | Err(_)), "server kept talking: {:?}", read);

        // Other connections are unaffected
        let mut client = MapClient::connect(&addr).await.unwrap();
        assert_eq!(client.height().await.unwrap(), 100);
        client.close().await.unwrap();
        handle.stop();
    }

    /// Tests that engine-level rejections leave the connection open
    #[tokio::test]
    async fn rejected_input_keeps_connection() {
        let (addr, handle, _task) = start_map(5, 5).await;
        let mut client = MapClient::connect(&addr).await.unwrap();

        assert!(matches!(
            client.set_weight(50, 0, 10).await,
            Err(ClientError::Failure(_))
        ));
        assert!(matches!(
            client.set_weight(1, 1, 1000).await,
            Err(ClientError::Failure(_))
        ));
        assert!(matches!(
            client.add_border(1, 10, 0).await,
            Err(ClientError::Failure(_))
        ));
        assert_eq!(client.weight(1, 1).await.unwrap(), 1);

        client.close().await.unwrap();
        handle.stop();
    }
}

/// MAP AND PATH TESTS
mod map_tests {
    use super::*;

    /// Tests the compressed bulk snapshot against per-cell reads
    #[tokio::test]
    async fn get_weights_round_trip() {
        let (addr, handle, _task) = start_map(4, 3).await;
        let mut client = MapClient::connect(&addr).await.unwrap();

        for y in 0..3 {
            for x in 0..4 {
                client.set_weight(x, y, 10 * (y * 4 + x + 1)).await.unwrap();
            }
        }

        let snapshot = client.weights().await.unwrap();
        assert_eq!((snapshot.width, snapshot.height), (4, 3));
        for y in 0..3u16 {
            for x in 0..4u16 {
                let expected = client.weight(i32::from(x), i32::from(y)).await.unwrap();
                assert_eq!(snapshot.weight(x, y).map(i32::from), Some(expected));
            }
        }
        assert_eq!(snapshot.weight(3, 2), Some(120));

        client.close().await.unwrap();
        handle.stop();
    }

    /// Tests concurrent writers on two connections racing a reset on a
    /// third: no cell ever holds a value nobody wrote
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_and_reset() {
        let (addr, handle, _task) = start_map(20, 4).await;

        let writers: Vec<_> = (0..2)
            .map(|row| {
                let addr = addr.clone();
                tokio::spawn(async move {
                    let mut client = MapClient::connect(&addr).await.unwrap();
                    for round in 0..60 {
                        client.set_weight(round % 20, row, 200).await.unwrap();
                    }
                    client.close().await.unwrap();
                })
            })
            .collect();

        let resetter = {
            let addr = addr.clone();
            tokio::spawn(async move {
                let mut client = MapClient::connect(&addr).await.unwrap();
                for _ in 0..20 {
                    client.reset_map().await.unwrap();
                }
                client
            })
        };

        for writer in writers {
            writer.await.unwrap();
        }
        let mut client = resetter.await.unwrap();

        let snapshot = client.weights().await.unwrap();
        assert!(snapshot.cells.iter().all(|w| *w == 1 || *w == 200));
        assert!(snapshot.cells[40..].iter().all(|w| *w == 1));

        client.reset_map().await.unwrap();
        let snapshot = client.weights().await.unwrap();
        assert!(snapshot.cells.iter().all(|w| *w == 1));

        client.close().await.unwrap();
        handle.stop();
    }

    /// Tests path search, compression and the pose-relative variants
    #[tokio::test]
    async fn path_calls() {
        let (addr, handle, _task) = start_map(20, 20).await;
        let mut client = MapClient::connect(&addr).await.unwrap();

        let diagonal = client.get_path(0, 0, 19, 19).await.unwrap();
        assert_eq!(diagonal, vec![Point::new(0, 0), Point::new(19, 19)]);

        client.set_position(3, 5).await.unwrap();
        let position = client.position().await.unwrap();
        assert_eq!((position.x, position.y), (3, 5));
        let to = client.path_to(12, 5).await.unwrap();
        assert_eq!(to, vec![Point::new(3, 5), Point::new(12, 5)]);

        let to_line = client.path_to_line(0, 10, 15).await.unwrap();
        assert_eq!(to_line.first(), Some(&Point::new(0, 10)));
        assert_eq!(to_line.last().map(|p| p.x), Some(15));

        for y in 0..20 {
            client.set_weight(10, y, 255).await.unwrap();
        }
        assert!(client.get_path(0, 0, 19, 0).await.unwrap().is_empty());
        assert_eq!(client.max_weight_in_map().await.unwrap(), 255);

        client.close().await.unwrap();
        handle.stop();
    }

    /// Tests obstacle painting and the weight range queries
    #[tokio::test]
    async fn obstacles_and_ranges() {
        let (addr, handle, _task) = start_map(15, 15).await;
        let mut client = MapClient::connect(&addr).await.unwrap();

        assert_eq!(client.min_weight().await.unwrap(), 1);
        assert_eq!(client.max_weight().await.unwrap(), 255);

        client.add_obstacle(7, 7, 3, 90, false).await.unwrap();
        assert_eq!(client.weight(7, 10).await.unwrap(), 90);
        assert_eq!(client.weight(10, 10).await.unwrap(), 1);

        client.add_obstacle(2, 2, 2, 120, true).await.unwrap();
        assert_eq!(client.weight(2, 2).await.unwrap(), 120);
        assert!(client.weight(4, 2).await.unwrap() < 120);

        let text = client.map_text().await.unwrap();
        assert_eq!(text.lines().count(), 15);
        client.debug_print().await.unwrap();

        client.close().await.unwrap();
        handle.stop();
    }

    /// Tests orientation storage
    #[tokio::test]
    async fn orientation_round_trip() {
        let (addr, handle, _task) = start_map(3, 3).await;
        let mut client = MapClient::connect(&addr).await.unwrap();

        client.set_orientation(0.05, -1.2, 3.1).await.unwrap();
        let orientation = client.orientation().await.unwrap();
        assert_approx_eq::assert_approx_eq!(orientation.roll, 0.05);
        assert_approx_eq::assert_approx_eq!(orientation.pitch, -1.2);
        assert_approx_eq::assert_approx_eq!(orientation.yaw, 3.1);

        client.close().await.unwrap();
        handle.stop();
    }
}

/// LIFECYCLE TESTS
mod lifecycle_tests {
    use super::*;

    /// Tests that CloseServer is acknowledged and ends the accept loop
    #[tokio::test]
    async fn close_server_stops_accepting() {
        let (addr, handle, task) = start_map(5, 5).await;
        let mut client = MapClient::connect(&addr).await.unwrap();

        client.shutdown_server().await.unwrap();
        client.disconnect().await.ok();

        let result = timeout(DEADLINE, task).await.unwrap().unwrap();
        assert!(result.is_ok());
        assert!(!handle.is_running());
        assert!(MapClient::connect(&addr).await.is_err());
    }

    /// Tests that CloseConnection ends only the calling connection
    #[tokio::test]
    async fn close_connection_keeps_server() {
        let (addr, handle, _task) = start_map(5, 5).await;

        let first = MapClient::connect(&addr).await.unwrap();
        first.close().await.unwrap();

        let mut second = MapClient::connect(&addr).await.unwrap();
        assert_eq!(second.width().await.unwrap(), 5);
        assert!(handle.is_running());

        second.close().await.unwrap();
        handle.stop();
    }

    /// Delegates to a weight map but panics when rendered as text
    struct PanickingRender(WeightMap);

    impl GridEngine for PanickingRender {
        const MIN_WEIGHT: Weight = WeightMap::MIN_WEIGHT;
        const MAX_WEIGHT: Weight = WeightMap::MAX_WEIGHT;

        fn width(&self) -> Coord {
            self.0.width()
        }
        fn height(&self) -> Coord {
            self.0.height()
        }
        fn max_weight_in_map(&self) -> Weight {
            self.0.max_weight_in_map()
        }
        fn weight(&self, x: Coord, y: Coord) -> Result<Weight, GridError> {
            self.0.weight(x, y)
        }
        fn set_weight(&mut self, x: Coord, y: Coord, weight: Weight) -> Result<(), GridError> {
            self.0.set_weight(x, y, weight)
        }
        fn add_border(&mut self, border_width: Coord, weight: Weight, place: BorderPlace) -> Result<(), GridError> {
            self.0.add_border(border_width, weight, place)
        }
        fn add_obstacle(&mut self, center: Point, radius: u32, weight: Weight, gradient: bool) -> Result<(), GridError> {
            self.0.add_obstacle(center, radius, weight, gradient)
        }
        fn shortest_path(&self, from: Point, to: Point) -> Result<Vec<Point>, GridError> {
            self.0.shortest_path(from, to)
        }
        fn shortest_path_to_column(&self, from: Point, column: Coord) -> Result<Vec<Point>, GridError> {
            self.0.shortest_path_to_column(from, column)
        }
        fn to_text(&self) -> String {
            panic!("renderer failure")
        }
    }

    /// Tests that an internal invariant fault is reported and stops the
    /// whole server with an error
    #[tokio::test]
    async fn invariant_fault_stops_server() {
        let (addr, handle, task) = start_server(PanickingRender(WeightMap::new(4, 4))).await;
        let mut client = MapClient::connect(&addr).await.unwrap();

        assert_eq!(client.width().await.unwrap(), 4);
        assert!(matches!(
            client.map_text().await,
            Err(ClientError::Failure(_))
        ));

        let result = timeout(DEADLINE, task).await.unwrap().unwrap();
        assert!(matches!(result, Err(ServerError::InvariantViolated(_))));
        assert!(!handle.is_running());
    }

    /// Tests the fuzz driver against a live server
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn fuzz_driver_runs_clean() {
        let (addr, handle, _task) = start_map(30, 30).await;
        let config = FuzzConfig {
            connections: 3,
            calls_per_connection: 150,
            seed: Some(7),
        };

        let report = fuzz::run(&addr, &config).await.unwrap();
        assert_eq!(report.calls, 450);

        let mut client = MapClient::connect(&addr).await.unwrap();
        assert_eq!(client.width().await.unwrap(), 30);
        client.close().await.unwrap();
        handle.stop();
    }
}
