use clap::Parser;
use log::{error, info};
use server::config::MIN_PORT;
use server::{Server, ServerConfig, ServerError, WeightMap};
use std::net::Ipv4Addr;
use std::path::PathBuf;

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about = "Shared weight map and path planning server")]
struct Args {
    /// Port to listen on
    #[clap(short, long, value_parser = clap::value_parser!(u16).range(i64::from(MIN_PORT)..))]
    port: u16,
    /// Map width in cells
    #[clap(short, long, value_parser = clap::value_parser!(u16).range(1..))]
    width: u16,
    /// Map height in cells
    #[clap(long, value_parser = clap::value_parser!(u16).range(1..))]
    height: u16,
    /// IPv4 address to bind to
    #[clap(long, default_value = "0.0.0.0")]
    host: Ipv4Addr,
    /// Enable debug logging of every call
    #[clap(short, long)]
    verbose: bool,
    /// Write one trace file per connection
    #[clap(short, long)]
    log: bool,
    /// Directory for per-connection trace files
    #[clap(long, default_value = ".")]
    log_dir: PathBuf,
    /// Path smoothing ratio in (0, 1]
    #[clap(short, long)]
    threshold: Option<f32>,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        let mut config = ServerConfig::new(self.port, self.width, self.height)
            .with_host(self.host)
            .with_smoothing_ratio(self.threshold)
            .with_verbose(self.verbose);
        if self.log {
            config = config.with_connection_logs(self.log_dir);
        }
        config
    }
}

fn init_logging(config: &ServerConfig) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.log_filter()))
        .init();
}

async fn run(config: ServerConfig) -> Result<(), ServerError> {
    let grid = WeightMap::new(config.width, config.height);
    let server = Server::bind(config.clone(), grid).await?;

    info!(
        "Server created on port {}. Size: ({}, {}), smoothing ratio: {}",
        server.local_addr()?.port(),
        config.width,
        config.height,
        config.smoothing_ratio
    );

    let handle = server.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down gracefully...");
            handle.stop();
        }
    });

    server.run().await
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let threshold = args.threshold;
    let config = args.into_config();
    init_logging(&config);

    if let Some(threshold) = threshold {
        if config.smoothing_ratio != threshold {
            info!(
                "Threshold {} is outside (0, 1], using {}",
                threshold, config.smoothing_ratio
            );
        }
    }

    if let Err(e) = run(config).await {
        error!("FATAL ERROR: {}", e);
        std::process::exit(1);
    }
}
