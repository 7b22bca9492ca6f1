//! xtask - Development task runner for retrace
//!
//! Usage:
//!   cargo run -p xtask -- map-bench <warmup-kind> <warmup-n> <kind> <n>

mod map_bench;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Development task runner for retrace")]
struct Cli {
    /// Log filter, overriding `RUST_LOG`
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Time inserts, reads and updates on a versioned map
    MapBench(map_bench::MapBenchArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match &cli.log {
        Some(directives) => EnvFilter::try_new(directives)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::MapBench(args) => map_bench::run(&args),
    }
}
