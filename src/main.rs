use blog_views::config::Config;
use blog_views::kv::select_store;
use blog_views::server::Server;
use clap::Parser;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!("Starting blog-views");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Environment: {}", config.environment);

    // Created once and shared by every request for the life of the process
    let store = select_store(config.environment, &config.kv_options())?;

    let server = Server::bind(config.listen_addr, store).await?;
    info!("Server listening on: {}", server.local_addr());

    server
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
