use anyhow::Result;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use debinfo_site::config::Args;
use debinfo_site::{create_app, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    args.logging.init()?;

    let config = args.load_config()?;
    info!(
        "Starting debinfo site on {} ({:?} rendering, {} mounts)",
        config.listen_address,
        config.policy,
        config.mounts.len()
    );

    // Discovery finishes before the listener is bound.
    let state = AppState::from_config(&config).await?;
    let app = create_app(state);

    let listener = TcpListener::bind(&config.listen_address).await?;
    info!("Server listening on {}", config.listen_address);

    axum::serve(listener, app).await?;

    Ok(())
}
