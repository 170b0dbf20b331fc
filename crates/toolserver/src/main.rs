use anyhow::Context;
use std::sync::Arc;

use ytmedia_toolserver::{
    api::create_router, engine::ffmpeg, ActivityMonitor, AppState, ConfigStore,
    NativeFolderPicker, ServerConfig, YtDlpConfig, YtDlpEngine,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let server = ServerConfig::from_env();

    let config = match &server.config_dir {
        Some(dir) => ConfigStore::new(dir),
        None => ConfigStore::open_default().context("failed to resolve config directory")?,
    };
    tracing::info!(path = %config.path().display(), "using config file");

    let ffmpeg_location = ffmpeg::locate(server.ffmpeg_path.as_deref());
    let ffmpeg = ffmpeg_location
        .as_deref()
        .map(ffmpeg::is_runnable)
        .unwrap_or(false);
    if !ffmpeg {
        tracing::warn!("ffmpeg not found; merging and transcoding will fail");
    }

    let engine = YtDlpEngine::new(YtDlpConfig {
        binary: server.ytdlp_path.clone(),
        ffmpeg_location,
    });
    let activity = Arc::new(ActivityMonitor::new(
        server.grace_period,
        server.heartbeat_timeout,
    ));

    let state = AppState::new(
        Arc::new(config),
        Arc::clone(&activity),
        Arc::new(engine),
        Arc::new(NativeFolderPicker),
        ffmpeg,
    );

    if server.idle_shutdown {
        // hard exit, tasks are in-memory only
        tokio::spawn(activity.run(|| {
            std::process::exit(0);
        }));
    } else {
        tracing::info!("idle shutdown disabled");
    }

    let app = create_router(state);

    let addr = server.addr;
    tracing::info!("toolserver listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    axum::serve(listener, app).await.context("toolserver failed")?;
    Ok(())
}
