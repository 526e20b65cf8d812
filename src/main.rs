use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{info, warn};
use docfly::{build_state, config::Config, create_router, utils::init_logger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded: {:?}", config.server);

    let state = build_state(config.clone())?;

    // Storage problems are not fatal; uploads will report them per file.
    if let Err(e) = state.uploads.prepare_storage().await {
        warn!(error = %e, bucket = %state.gateway.bucket(), "Storage is not ready");
    }

    let app = create_router(state);

    let host: std::net::IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::from((host, config.server.port));
    info!("Server listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
