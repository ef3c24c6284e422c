//! Production build command.

use std::path::Path;

use anyhow::{Context, Result};
use kiln_pipeline::Pipeline;

use crate::config::load_config;

/// Run the build command.
pub async fn run(config_path: &Path) -> Result<()> {
    tracing::info!("Building for production...");

    let config = load_config(config_path)?;
    let dist = config.pipeline.dist_dir().to_path_buf();
    let pipeline = Pipeline::new(config.pipeline);

    let reports = tokio::task::spawn_blocking(move || pipeline.build())
        .await
        .context("Build task panicked")?
        .context("Build failed")?;

    let copied: usize = reports.iter().map(|r| r.written.len()).sum();
    let duration_ms: u64 = reports.iter().map(|r| r.duration_ms).sum();

    tracing::info!("Packaged {} files in {}ms", copied, duration_ms);
    tracing::info!("Output: {}", dist.display());

    Ok(())
}
