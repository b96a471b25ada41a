use std::path::PathBuf;

use clap::Parser;
use kalshi_stream::config::ConfigPaths;
use kalshi_stream::supervisor::Supervisor;
use tracing_subscriber::EnvFilter;

/// Runs the Kalshi market-data stream until interrupted.
#[derive(Debug, Parser)]
struct Args {
    /// Base directory containing `config/common/config.yaml` and `config/pipeline/tickers.yaml`.
    #[arg(long, env = "KALSHI_STREAM_CONFIG_DIR", default_value = ".")]
    config_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config_paths = ConfigPaths::under(&args.config_dir);

    let supervisor = Supervisor::bootstrap(config_paths).await?;
    supervisor.boot().await?;

    tokio::select! {
        result = supervisor.run() => {
            if let Err(err) = result {
                tracing::error!(%err, "supervisor exited with error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received interrupt, shutting down");
        }
    }

    supervisor.shutdown().await;
    Ok(())
}
