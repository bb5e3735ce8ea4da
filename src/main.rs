mod api;
mod backend;
mod config;
mod error;
mod jobs;
mod media;
mod storage;
mod uploads;

use std::sync::Arc;

use tracing::info;

use crate::api::{build_router, AppState};
use crate::backend::build_backends;
use crate::config::AppConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "speech_relay_server=info,axum=info".into()),
        )
        .compact()
        .init();

    let cfg = AppConfig::from_env()?;
    let sdk_config = aws_config::load_from_env().await;
    let backends = build_backends(&sdk_config)?;
    let state = Arc::new(AppState::new(cfg.clone(), backends));
    state.scratch.ensure().await?;

    let app = build_router(state);

    let addr = format!("{}:{}", cfg.host, cfg.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        host = %cfg.host,
        port = cfg.port,
        region = %sdk_config
            .region()
            .map(ToString::to_string)
            .unwrap_or_else(|| "unset".to_string()),
        input_bucket = %cfg.input_bucket,
        output_bucket = %cfg.output_bucket,
        upload_dir = ?cfg.upload_dir,
        "starting speech-relay-server"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
            let _ = sigterm.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
