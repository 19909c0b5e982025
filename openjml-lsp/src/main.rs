use clap::Parser;
use openjml::{OpenJml, OpenJmlConfig};
use openjml_lsp::transport;
use tracing_subscriber::EnvFilter;

/// Language server reporting OpenJML findings for Java and JML sources
#[derive(Debug, Parser)]
#[command(name = "openjml-lsp", version, about)]
struct Cli {
    /// Connect to an editor listening on this port
    #[arg(long, value_name = "PORT", conflicts_with = "server")]
    client: Option<u16>,

    /// Listen on this port and serve every editor that connects
    #[arg(long, value_name = "PORT")]
    server: Option<u16>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_tracing(default_level: &str) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // stdout carries the protocol in local mode
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err))
}

async fn log_openjml_version() {
    let config = std::env::current_dir()
        .ok()
        .and_then(|dir| OpenJmlConfig::load(&dir).ok().flatten())
        .unwrap_or_default();

    match OpenJml::new(config).version().await {
        Ok(version) => tracing::info!(%version, "OpenJML version"),
        Err(err) => tracing::warn!(%err, "OpenJML is not available"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;

    log_openjml_version().await;

    match (cli.client, cli.server) {
        (Some(port), _) => transport::connect(port).await?,
        (None, Some(port)) => transport::listen(port).await?,
        (None, None) => transport::serve_stdio().await,
    }

    Ok(())
}
