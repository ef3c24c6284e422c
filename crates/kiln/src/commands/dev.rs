//! Development loop: initial build plus server and watcher.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use kiln_pipeline::{Pipeline, StageKind};
use kiln_server::{DevServer, DevServerConfig};

use crate::config::{load_config, ConfigFile};

/// Stages run once when the dev loop starts.
const INITIAL_STAGES: [StageKind; 4] = [
    StageKind::Styles,
    StageKind::Images,
    StageKind::Scripts,
    StageKind::Pages,
];

/// Run the initial stages in parallel alongside the watcher.
pub async fn run(config_path: &Path, port: Option<u16>, open: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let (pipeline, server) = setup(config, port, open);
    let hub = server.hub();

    let initial = async {
        let handles = INITIAL_STAGES.map(|kind| {
            let pipeline = Arc::clone(&pipeline);
            let hub = hub.clone();
            (
                kind,
                tokio::task::spawn_blocking(move || pipeline.run(kind, &hub)),
            )
        });

        for (kind, handle) in handles {
            handle
                .await
                .context("Stage task panicked")?
                .with_context(|| format!("{} failed", kind))?;
        }
        tracing::info!("Initial build complete");
        Ok::<(), anyhow::Error>(())
    };

    let serving = async { server.start().await.context("Dev server failed") };

    tokio::try_join!(initial, serving)?;

    Ok(())
}

/// Serve and watch without an initial build.
pub async fn watch(config_path: &Path, port: Option<u16>, open: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let (_pipeline, server) = setup(config, port, open);

    server.start().await?;

    Ok(())
}

fn setup(config: ConfigFile, port: Option<u16>, open: bool) -> (Arc<Pipeline>, DevServer) {
    let server_config = DevServerConfig {
        root: config.pipeline.app_dir().to_path_buf(),
        port: port.unwrap_or(config.server.port),
        host: config.server.host,
        open: open && config.server.open,
    };

    tracing::info!("Starting development server on port {}", server_config.port);

    let pipeline = Arc::new(Pipeline::new(config.pipeline));
    let server = DevServer::new(server_config).with_pipeline(Arc::clone(&pipeline));
    (pipeline, server)
}
