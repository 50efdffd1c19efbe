use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;

use notifico_engine::cleanup::Reaper;
use notifico_engine::config::Settings;
use notifico_engine::delivery::{FcmClient, SmtpClient};
use notifico_engine::server::{create_app, AppState};
use notifico_engine::shutdown::GracefulShutdown;
use notifico_engine::socket::HeartbeatTask;
use notifico_engine::telemetry::init_telemetry;
use notifico_engine::workers::{EmailWorker, InAppWorker, PushWorker};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::new()?;

    let _telemetry_guard =
        init_telemetry(&settings.otel).expect("Failed to initialize telemetry");

    tracing::info!("Configuration loaded");

    let state = AppState::new(settings.clone()).await?;
    tracing::info!("Application state initialized");

    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let smtp = Arc::new(SmtpClient::new(&settings.smtp)?);
    let fcm = Arc::new(FcmClient::new(settings.fcm.clone())?);

    let poll_interval = Duration::from_millis(settings.queue.worker_poll_interval_ms);
    let batch_size = settings.queue.drain_batch_size;

    let email_worker = EmailWorker::new(
        state.store.clone(),
        state.queue_substrate.clone(),
        smtp,
        poll_interval,
        batch_size,
    );
    let in_app_worker = InAppWorker::new(
        state.store.clone(),
        state.queue_substrate.clone(),
        state.router.clone(),
        poll_interval,
        batch_size,
    );
    let push_worker = PushWorker::new(
        state.store.clone(),
        state.queue_substrate.clone(),
        state.token_registry.clone(),
        fcm,
        poll_interval,
        batch_size,
    );

    let email_shutdown = shutdown_tx.subscribe();
    let email_handle = tokio::spawn(async move { email_worker.run(email_shutdown).await });

    let in_app_shutdown = shutdown_tx.subscribe();
    let in_app_handle = tokio::spawn(async move { in_app_worker.run(in_app_shutdown).await });

    let push_shutdown = shutdown_tx.subscribe();
    let push_handle = tokio::spawn(async move { push_worker.run(push_shutdown).await });

    let heartbeat_task = HeartbeatTask::new(
        state.connection_manager.clone(),
        state.session_store.clone(),
        Duration::from_secs(settings.websocket.cleanup_interval),
        chrono::Duration::seconds(settings.websocket.connection_timeout as i64),
        shutdown_tx.subscribe(),
    );
    let heartbeat_handle = tokio::spawn(async move { heartbeat_task.run().await });

    let reaper = Reaper::new(
        state.store.clone(),
        state.token_registry.clone(),
        settings.cleanup.clone(),
        shutdown_tx.subscribe(),
    );
    let reaper_handle = tokio::spawn(async move { reaper.run().await });

    let graceful_shutdown = Arc::new(GracefulShutdown::new(
        state.connection_manager.clone(),
        state.queue_substrate.clone(),
        shutdown_tx.clone(),
    ));

    let app = create_app(state);

    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(wait_for_shutdown_signal())
    .await?;

    let result = graceful_shutdown.execute("server stopped accepting connections").await;
    tracing::info!(?result, "graceful shutdown finished");

    tracing::info!("Waiting for background tasks to finish...");
    let _ = tokio::join!(
        email_handle,
        in_app_handle,
        push_handle,
        heartbeat_handle,
        reaper_handle,
    );

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
