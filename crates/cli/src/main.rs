use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tiercache_cache::{FileCache, FileCacheConfig};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::Commands;

#[derive(Parser)]
#[command(name = "tiercache")]
#[command(about = "Inspect and maintain a tiercache file cache directory", long_about = None)]
#[command(version)]
struct Cli {
    /// Cache directory
    #[arg(long, env = "TIERCACHE_DIR")]
    dir: PathBuf,

    /// Minimum seconds between background GC sweeps
    #[arg(long, default_value = "300")]
    gc_interval: u64,

    /// Let GC sweeps also remove expired entry files
    #[arg(long)]
    sweep_entries: bool,

    #[command(subcommand)]
    command: Commands,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = FileCacheConfig::new(cli.dir)
        .with_gc_interval(Duration::from_secs(cli.gc_interval))
        .with_sweep_entries(cli.sweep_entries);
    let cache: FileCache<String> = FileCache::new(config)?;

    cli.command.execute(&cache).await
}
