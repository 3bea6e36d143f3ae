//! Randomised load driver: several connections issuing random valid calls
//! at once.

use crate::error::ClientError;
use crate::map_client::MapClient;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::DecodeError;
use tokio::io::{AsyncRead, AsyncWrite};

#[derive(Debug, Clone)]
pub struct FuzzConfig {
    pub connections: usize,
    pub calls_per_connection: usize,
    /// Base seed; connection `i` uses `seed + i`. Random when absent.
    pub seed: Option<u64>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FuzzReport {
    pub calls: usize,
    /// Calls the server answered with FAILURE.
    pub failures: usize,
}

impl FuzzReport {
    fn merge(&mut self, other: FuzzReport) {
        self.calls += other.calls;
        self.failures += other.failures;
    }
}

/// Opens `config.connections` connections to `addr` and fuzzes them
/// concurrently. Any transport or decode error aborts the run.
pub async fn run(addr: &str, config: &FuzzConfig) -> Result<FuzzReport, ClientError> {
    let workers: Vec<_> = (0..config.connections)
        .map(|worker| {
            let addr = addr.to_string();
            let seed = config.seed.map(|seed| seed.wrapping_add(worker as u64));
            let calls = config.calls_per_connection;
            tokio::spawn(async move {
                let client = MapClient::connect(&addr).await?;
                fuzz_connection(client, seed, calls).await
            })
        })
        .collect();

    let mut report = FuzzReport::default();
    for worker in workers {
        let worker_report = worker
            .await
            .map_err(|e| ClientError::Worker(e.to_string()))??;
        report.merge(worker_report);
    }
    info!(
        "Fuzzing finished: {} calls, {} failures",
        report.calls, report.failures
    );
    Ok(report)
}

/// Issues `calls` random calls on one connection, then closes it.
pub async fn fuzz_connection<S>(
    mut client: MapClient<S>,
    seed: Option<u64>,
    calls: usize,
) -> Result<FuzzReport, ClientError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let width = client.width().await?;
    let height = client.height().await?;
    if width <= 0 || height <= 0 {
        return Err(DecodeError::Invalid(format!("server reports a {}x{} map", width, height)).into());
    }
    let min = client.min_weight().await?;
    let max = client.max_weight().await?;
    if min > max {
        return Err(DecodeError::Invalid(format!("server reports weight range {}..={}", min, max)).into());
    }

    let mut report = FuzzReport::default();
    for _ in 0..calls {
        let x = rng.gen_range(0..width);
        let y = rng.gen_range(0..height);
        let result = match rng.gen_range(0..8) {
            0 => client.set_weight(x, y, rng.gen_range(min..=max)).await,
            1 => client.weight(x, y).await.map(drop),
            2 => {
                let radius = rng.gen_range(0..5);
                let weight = rng.gen_range(min..=max);
                client.add_obstacle(x, y, radius, weight, rng.gen()).await
            }
            3 => {
                let (x2, y2) = (rng.gen_range(0..width), rng.gen_range(0..height));
                client.get_path(x, y, x2, y2).await.map(drop)
            }
            4 => client.set_position(x, y).await,
            5 => {
                let (x2, y2) = (rng.gen_range(0..width), rng.gen_range(0..height));
                client.path_to(x2, y2).await.map(drop)
            }
            6 => {
                let column = rng.gen_range(0..width);
                client.path_to_line(x, y, column).await.map(drop)
            }
            _ => client.max_weight_in_map().await.map(drop),
        };

        report.calls += 1;
        match result {
            Ok(()) => {}
            Err(ClientError::Failure(message)) => {
                debug!("Server refused a fuzzed call: {}", message);
                report.failures += 1;
            }
            Err(e) => return Err(e),
        }
    }

    client.close().await?;
    Ok(report)
}
