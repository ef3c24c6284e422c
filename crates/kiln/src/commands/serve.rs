//! `kiln serve`: static preview of the packaged distribution.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use axum::Router;
use tower_http::services::{ServeDir, ServeFile};

use crate::config::load_config;

/// Page served for unknown paths when the build ships one.
const NOT_FOUND_PAGE: &str = "404.html";

/// Serve `dir` (the configured dist directory by default) on `port`.
pub async fn run(config_path: &Path, port: u16, dir: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    let root = dir.unwrap_or_else(|| config.pipeline.dist_dir().to_path_buf());
    check_build(&root)?;

    let addr = preview_address(&config.server.host, port)?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let url = format!("http://{}", addr);

    tracing::info!("Previewing {} at {}", root.display(), url);

    if config.server.open {
        if let Err(e) = open::that(&url) {
            tracing::warn!("Could not open browser: {}", e);
        }
    }

    axum::serve(listener, preview_router(&root))
        .await
        .context("Preview server failed")?;

    Ok(())
}

/// Fail when there is nothing to preview; warn when the build is empty.
fn check_build(root: &Path) -> Result<()> {
    if !root.is_dir() {
        anyhow::bail!(
            "Directory not found: {}. Run 'kiln build' first.",
            root.display()
        );
    }

    let empty = root
        .read_dir()
        .with_context(|| format!("Failed to read {}", root.display()))?
        .next()
        .is_none();
    if empty {
        tracing::warn!("{} is empty. Run 'kiln build' to package the app.", root.display());
    }

    Ok(())
}

fn preview_address(host: &str, port: u16) -> Result<SocketAddr> {
    format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid address {}:{}", host, port))
}

/// Static files with directory index pages and an optional `404.html`.
fn preview_router(root: &Path) -> Router {
    let files = ServeDir::new(root)
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new(root.join(NOT_FOUND_PAGE)));

    Router::new().fallback_service(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn missing_build_is_an_error() {
        let temp = tempdir().unwrap();

        let err = check_build(&temp.path().join("dist")).unwrap_err();

        assert!(err.to_string().contains("kiln build"));
    }

    #[test]
    fn empty_build_is_served() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("dist")).unwrap();

        assert!(check_build(&temp.path().join("dist")).is_ok());
    }

    #[test]
    fn parses_preview_address() {
        let addr = preview_address("127.0.0.1", 4000).unwrap();

        assert_eq!(addr.port(), 4000);
        assert!(preview_address("localhost name", 4000).is_err());
    }
}
