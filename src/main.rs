use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;

use perchance_relay::{api, build_state, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    Config::dotenv_load();
    let config = Config::new();
    config.print_env_vars();

    let state = build_state(&config)?;
    let app = api::router(state);

    let ip: std::net::IpAddr = config.host.parse().unwrap_or_else(|_| {
        tracing::warn!("Invalid HOST '{}', falling back to 0.0.0.0", config.host);
        std::net::IpAddr::from([0, 0, 0, 0])
    });
    let socket_address = SocketAddr::new(ip, config.port);
    tracing::info!("Image generation relay listening on {}", socket_address);
    tracing::info!("UploadThing configured: {}", config.uploadthing_configured());

    axum::Server::bind(&socket_address)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
