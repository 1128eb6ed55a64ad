use anyhow::{Context, Result};
use discord_relay::RelayBot;
use discord_relay::core::config::AppConfig;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; real deployments set the environment directly.
    let _ = dotenvy::dotenv();
    discord_relay::setup_logging();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "failed to load config");
            return Err(e).context("failed to load config");
        }
    };
    info!(
        guild_id = ?config.guild_id,
        stream_enabled = config.stream_api_endpoint.is_some(),
        elysia_enabled = config.elysia_api_endpoint.is_some(),
        "starting discord relay"
    );

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutdown signal received");
        signal_token.cancel();
    });

    RelayBot::new(config, shutdown)
        .run()
        .await
        .context("discord client failed")?;

    info!("shut down cleanly");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
