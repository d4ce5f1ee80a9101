use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;
use typografd::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::parse();
    let listener = TcpListener::bind(config.addr()).await?;
    info!(
        addr = %listener.local_addr()?,
        upstream = %config.upstream_url,
        timeout_ms = config.timeout_ms,
        "listening"
    );
    typografd::run(listener, config.state()).await?;
    Ok(())
}
