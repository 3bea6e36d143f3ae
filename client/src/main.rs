use clap::{Parser, Subcommand};
use client::fuzz::{self, FuzzConfig};
use client::{ClientError, MapClient};
use log::{error, info};
use shared::WeightsSnapshot;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(flatten)]
    Call(CallCommand),

    /// Hammer the server with random calls from several connections
    Fuzz {
        #[arg(short = 'c', long, default_value = "4")]
        connections: usize,
        #[arg(short = 'n', long, default_value = "1000")]
        calls: usize,
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Subcommand, Debug)]
enum CallCommand {
    /// Print map dimensions and weight range
    Info,
    /// Print the cost of one cell
    Weight { x: i32, y: i32 },
    /// Set the cost of one cell
    SetWeight { x: i32, y: i32, weight: i32 },
    /// Put every cell back to the minimum cost
    Reset,
    /// Raise cells along the selected edges (TOP=1 BOTTOM=2 RIGHT=4 LEFT=8)
    Border {
        width: i32,
        weight: i32,
        #[arg(default_value = "15")]
        place: i32,
    },
    /// Raise a disc of cells
    Obstacle {
        x: i32,
        y: i32,
        radius: i32,
        weight: i32,
        #[arg(long)]
        gradient: bool,
    },
    /// Shortest path between two cells
    Path { x1: i32, y1: i32, x2: i32, y2: i32 },
    /// Shortest path from the stored position
    PathTo { x: i32, y: i32 },
    /// Shortest path to any cell of a column
    PathToLine { x1: i32, y1: i32, column: i32 },
    /// Store the robot position
    SetPos { x: i32, y: i32 },
    /// Print the stored robot position
    Pos,
    /// Store the robot orientation in radians
    #[command(allow_negative_numbers = true)]
    SetRpy { roll: f64, pitch: f64, yaw: f64 },
    /// Print the stored robot orientation
    Rpy,
    /// Print the server's text rendering of the map
    Print,
    /// Download every cell and print them
    Weights,
    /// Make the server print the map on its console
    DebugPrint,
    /// Stop the server
    Shutdown,
}

fn print_snapshot(snapshot: &WeightsSnapshot) {
    if snapshot.width == 0 {
        return;
    }
    for row in snapshot.cells.chunks(usize::from(snapshot.width)) {
        let line: Vec<String> = row.iter().map(|w| format!("{:>3}", w)).collect();
        println!("{}", line.join(" "));
    }
}

async fn execute(client: &mut MapClient, command: CallCommand) -> Result<(), ClientError> {
    match command {
        CallCommand::Info => {
            let (width, height) = (client.width().await?, client.height().await?);
            let (min, max) = (client.min_weight().await?, client.max_weight().await?);
            println!("size: {}x{}", width, height);
            println!("weights: {}..={}", min, max);
            println!("highest weight in map: {}", client.max_weight_in_map().await?);
        }
        CallCommand::Weight { x, y } => println!("{}", client.weight(x, y).await?),
        CallCommand::SetWeight { x, y, weight } => client.set_weight(x, y, weight).await?,
        CallCommand::Reset => client.reset_map().await?,
        CallCommand::Border { width, weight, place } => {
            client.add_border(width, weight, place).await?
        }
        CallCommand::Obstacle {
            x,
            y,
            radius,
            weight,
            gradient,
        } => client.add_obstacle(x, y, radius, weight, gradient).await?,
        CallCommand::Path { x1, y1, x2, y2 } => {
            for point in client.get_path(x1, y1, x2, y2).await? {
                println!("{} {}", point.x, point.y);
            }
        }
        CallCommand::PathTo { x, y } => {
            for point in client.path_to(x, y).await? {
                println!("{} {}", point.x, point.y);
            }
        }
        CallCommand::PathToLine { x1, y1, column } => {
            for point in client.path_to_line(x1, y1, column).await? {
                println!("{} {}", point.x, point.y);
            }
        }
        CallCommand::SetPos { x, y } => client.set_position(x, y).await?,
        CallCommand::Pos => {
            let position = client.position().await?;
            println!("{} {}", position.x, position.y);
        }
        CallCommand::SetRpy { roll, pitch, yaw } => client.set_orientation(roll, pitch, yaw).await?,
        CallCommand::Rpy => {
            let o = client.orientation().await?;
            println!("{} {} {}", o.roll, o.pitch, o.yaw);
        }
        CallCommand::Print => println!("{}", client.map_text().await?),
        CallCommand::Weights => print_snapshot(&client.weights().await?),
        CallCommand::DebugPrint => client.debug_print().await?,
        CallCommand::Shutdown => client.shutdown_server().await?,
    }
    Ok(())
}

async fn run(args: Args) -> Result<(), ClientError> {
    match args.command {
        Command::Fuzz {
            connections,
            calls,
            seed,
        } => {
            let config = FuzzConfig {
                connections,
                calls_per_connection: calls,
                seed,
            };
            info!("Fuzzing {} with {} connections", args.server, connections);
            fuzz::run(&args.server, &config).await?;
            Ok(())
        }
        Command::Call(command) => {
            let mut client = MapClient::connect(&args.server).await?;
            let shutting_down = matches!(command, CallCommand::Shutdown);
            execute(&mut client, command).await?;
            if shutting_down {
                client.disconnect().await
            } else {
                client.close().await
            }
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        error!("{}", e);
        std::process::exit(1);
    }
}
