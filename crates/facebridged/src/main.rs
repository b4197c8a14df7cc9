use anyhow::{Context, Result};
use facebridge_core::FaceFacade;
use facebridge_onnx::OnnxProvider;
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod engine;

use config::{BusKind, Config};
use dbus_interface::{FaceService, BUS_NAME, OBJECT_PATH};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "facebridged starting");

    let config = Config::load().context("failed to load configuration")?;
    tracing::info!(
        model_dir = %config.model_dir.display(),
        max_faces = config.max_faces,
        bus = ?config.bus,
        "configuration loaded"
    );

    let provider = OnnxProvider::new(&config.model_dir);
    let facade = FaceFacade::new(provider, config.engine_config());
    let engine = engine::spawn_engine(facade).context("failed to spawn engine thread")?;

    match (&config.credentials, config.auto_init) {
        (Some(credentials), true) => match engine.initialize(credentials.clone()).await {
            Ok(_) => tracing::info!("engine initialized at startup"),
            Err(rejection) => tracing::warn!(
                code = rejection.code,
                error = %rejection.message,
                "startup initialization failed; waiting for Initialize"
            ),
        },
        (None, true) => tracing::info!("no credentials configured; waiting for Initialize"),
        (_, false) => tracing::info!("auto-initialize disabled"),
    }

    let builder = match config.bus {
        BusKind::Session => zbus::connection::Builder::session()?,
        BusKind::System => zbus::connection::Builder::system()?,
    };
    let _connection = builder
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, FaceService::new(engine.clone()))?
        .build()
        .await
        .with_context(|| format!("failed to register {BUS_NAME} on the {:?} bus", config.bus))?;

    tracing::info!(name = BUS_NAME, path = OBJECT_PATH, "facebridged ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("facebridged shutting down");

    if let Err(rejection) = engine.shutdown().await {
        tracing::warn!(code = rejection.code, error = %rejection.message, "engine shutdown failed");
    }
    engine.close().await;

    Ok(())
}
