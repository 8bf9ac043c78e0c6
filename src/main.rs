//! Speed-to-lead telephony bridge server entrypoint.

use bianca_bridge::{config::Config, server, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider().install_default().expect("failed to install rustls crypto provider");

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = Config::from_env()?;
    let state = AppState::new(config);
    server::run(state).await
}
