mod config;
mod scheduler;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use lovenote_ai::{DailyMessageGenerator, GeminiConfig, GeminiModel};
use lovenote_api::daily::DailyService;
use lovenote_api::gate::AuthGate;
use lovenote_api::registry::DeviceRegistry;
use lovenote_api::{AppState, AppStateInner};
use lovenote_db::Database;
use lovenote_gateway::dispatcher::Dispatcher;
use lovenote_notify::{AlertRelay, NotificationDispatcher, TelegramTransport, WebPushTransport};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    "lovenote_server=debug,lovenote_api=debug,lovenote_notify=debug,\
                     lovenote_ai=debug,lovenote_gateway=debug,tower_http=debug"
                        .into()
                }),
        )
        .init();

    let config = Config::from_env()?;

    let db = Arc::new(Database::open(&config.db_path)?);
    let realtime = Dispatcher::new();

    let vapid_pem = std::fs::read(&config.vapid_private_key_file)
        .with_context(|| format!("reading {}", config.vapid_private_key_file.display()))?;
    let push = Arc::new(WebPushTransport::new(vapid_pem, config.vapid_subject.clone())?);
    let notifier = Arc::new(NotificationDispatcher::new(db.clone(), push, config.local_offset));

    let telegram = Arc::new(TelegramTransport::new(
        config.telegram_api_url.clone(),
        config.telegram_bot_token.clone(),
        config.telegram_chat_id.clone(),
    )?);
    let (alerts, _alert_worker) = AlertRelay::spawn(telegram);

    let model = Arc::new(GeminiModel::new(GeminiConfig {
        api_url: config.gemini_api_url.clone(),
        api_key: config.gemini_api_key.clone(),
        model: config.gemini_model.clone(),
        ..GeminiConfig::default()
    })?);
    let generator = Arc::new(DailyMessageGenerator::new(model, config.local_offset));

    let registry = Arc::new(DeviceRegistry::new(db.clone(), realtime.clone(), alerts.clone()));
    let gate = Arc::new(AuthGate::new(
        db.clone(),
        registry.clone(),
        &config.admin_token,
        &config.client_token,
    ));
    let daily = Arc::new(DailyService::new(
        db.clone(),
        realtime.clone(),
        notifier.clone(),
        alerts.clone(),
        generator.clone(),
        config.local_offset,
        config.city.clone(),
    ));

    let state: AppState = Arc::new(AppStateInner {
        db,
        realtime,
        gate,
        registry,
        notifier,
        alerts,
        generator,
        daily: daily.clone(),
        cron_secret: config.cron_secret.clone(),
    });

    let app = lovenote_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let shutdown = CancellationToken::new();
    let scheduler = tokio::spawn(scheduler::run_scheduler(
        daily,
        config.scheduler_every,
        shutdown.clone(),
    ));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("LoveNote server listening on {}", addr);
    info!("Local offset {}, scheduler every {:?}", config.local_offset, config.scheduler_every);
    info!("Web push VAPID key {}...", &config.vapid_public_key[..12]);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    scheduler.await.ok();
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(_) => {
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
    shutdown.cancel();
}
