use anyhow::Context;
use clap::Parser;
use mock_proxy::config::Config;
use mock_proxy::proxy::ProxyServer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mock-proxy", version, about = "Record/replay HTTP mock proxy")]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "MOCK_PROXY_CONFIG")]
    config: String,

    /// Override the listen port from the configuration
    #[arg(short, long)]
    port: Option<u16>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .context("Invalid log level")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config))?;
    if let Some(port) = args.port {
        config.listen.port = port;
        config.validate()?;
    }

    info!("mock-proxy {} starting", env!("CARGO_PKG_VERSION"));
    ProxyServer::new(config)?.run().await
}
