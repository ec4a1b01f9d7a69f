use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use wa_relay::api::{ApiState, relay_routes};
use wa_relay::channels::{BridgeClient, WhatsAppClient, wait_until_ready};
use wa_relay::config::RelayConfig;
use wa_relay::relay::{RelayService, Sleeper, TokioSleeper};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = RelayConfig::from_env();
    config.validate()?;
    config.ensure_dirs().await?;

    // Initialize tracing; keep the guard alive so buffered file logs flush.
    let _log_guard = init_tracing(&config);

    eprintln!("📨 wa-relay v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Bridge: {}", config.bridge.base_url);
    eprintln!("   Uploads: {}", config.upload_dir.display());
    eprintln!(
        "   Jitter: {}-{}ms, confirm: {} x {}ms",
        config.dispatch.jitter_min.as_millis(),
        config.dispatch.jitter_max.as_millis(),
        config.confirm.max_attempts,
        config.confirm.interval.as_millis()
    );

    let client: Arc<dyn WhatsAppClient> = Arc::new(BridgeClient::new(&config.bridge)?);
    let sleeper: Arc<dyn Sleeper> = Arc::new(TokioSleeper);

    // ── Session ──────────────────────────────────────────────────────────
    eprintln!("   Waiting for the channel session to be ready...");
    wait_until_ready(client.as_ref(), sleeper.as_ref(), config.ready_poll_interval).await;

    // ── HTTP ─────────────────────────────────────────────────────────────
    let relay = Arc::new(RelayService::new(client, sleeper, &config));
    let app = relay_routes(
        ApiState {
            relay,
            upload_dir: config.upload_dir.clone(),
            date_format: config.date_format.clone(),
        },
        config.max_upload_bytes,
    );

    let listener = tokio::net::TcpListener::bind(config.listen_addr()).await?;
    tracing::info!(addr = %config.listen_addr(), "Relay HTTP server started");
    eprintln!("   Listening on http://{}\n", config.listen_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn init_tracing(config: &RelayConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout = tracing_subscriber::fmt::layer().with_target(false);

    match config.log_dir {
        Some(ref dir) => {
            let appender = tracing_appender::rolling::daily(dir, "wa-relay.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stdout)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_target(false)
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(filter).with(stdout).init();
            None
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
