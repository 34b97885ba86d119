//! # Commerce Gateway - Main Entry Point
//!
//! Boots the gateway: observability first, then configuration (YAML file if
//! `GATEWAY_CONFIG_PATH` is set, environment-backed defaults otherwise),
//! then the server with graceful shutdown on SIGINT/SIGTERM.

use tracing::{error, info};

use commerce_gateway::{GatewayConfig, GatewayResult, GatewayServer};

#[tokio::main]
async fn main() -> GatewayResult<()> {
    init_observability();

    info!(version = env!("CARGO_PKG_VERSION"), "starting commerce gateway");

    let config = load_config().await?;
    info!(
        identity = %config.upstreams.identity_url,
        orders = %config.upstreams.orders_url,
        "configuration loaded"
    );

    let server = GatewayServer::new(config)?;
    if let Err(err) = server.serve().await {
        error!(error = %err, "gateway exited with error");
        return Err(err);
    }

    Ok(())
}

/// Structured logging with env-filter control (`RUST_LOG`)
fn init_observability() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "commerce_gateway=info,tower_http=debug".into()),
        )
        .init();
}

async fn load_config() -> GatewayResult<GatewayConfig> {
    match std::env::var("GATEWAY_CONFIG_PATH") {
        Ok(path) => GatewayConfig::load_from_file(&path).await,
        Err(_) => GatewayConfig::from_env(),
    }
}
