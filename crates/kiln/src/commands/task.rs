//! Run a single stage.

use std::path::Path;

use anyhow::{Context, Result};
use kiln_pipeline::{NoReload, Pipeline, StageKind};

use crate::config::load_config;

/// Run the command for one stage.
pub async fn run(config_path: &Path, kind: StageKind) -> Result<()> {
    let config = load_config(config_path)?;
    let pipeline = Pipeline::new(config.pipeline);

    let report = tokio::task::spawn_blocking(move || pipeline.run(kind, &NoReload))
        .await
        .context("Stage task panicked")?
        .with_context(|| format!("{} failed", kind))?;

    for path in &report.written {
        tracing::debug!("Wrote {}", path.display());
    }

    Ok(())
}
