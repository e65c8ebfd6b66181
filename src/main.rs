use remo_exporter::{server, AuthHttpClient, Config, Exporter, RemoClient};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    info!("Starting Nature Remo Exporter");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to create config: {e}");
            std::process::exit(1);
        }
    };
    info!(
        api_base_url = %config.api_base_url,
        metrics_path = %config.metrics_path,
        cache_ttl_secs = config.cache_ttl.as_secs(),
        request_timeout_secs = config.request_timeout.as_secs(),
        "Configuration loaded"
    );

    let auth_client = AuthHttpClient::new(config.oauth_token.clone(), config.request_timeout)?;
    let remo_client = RemoClient::new(
        Arc::new(auth_client),
        config.api_base_url.clone(),
        config.cache_ttl,
    );
    let exporter = Arc::new(Exporter::new(Arc::new(remo_client)));
    let router = server::router(exporter, &config.metrics_path);

    let socket_addr = SocketAddr::from(([0, 0, 0, 0], config.listen_port));
    let listener = TcpListener::bind(socket_addr).await?;
    info!("Listening on {socket_addr}");

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {e}");
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    };

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Exporter shutdown complete");
    Ok(())
}
