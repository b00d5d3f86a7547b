use advisor_stream::relay::{run_server, RelayState};
use advisor_stream::RelayConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RelayConfig::from_env()?;
    if config.gateway_api_key.is_none() {
        tracing::warn!("GATEWAY_API_KEY is not set; chat requests will fail until it is");
    }
    tracing::info!(gateway = %config.gateway_url, model = %config.model, "relay configured");

    let addr = config.bind_addr;
    run_server(RelayState::new(config), addr).await
}
