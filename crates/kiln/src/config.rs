//! Configuration file structure (kiln.toml).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use kiln_pipeline::PipelineConfig;
use serde::Deserialize;

#[derive(Debug, Default)]
pub struct ConfigFile {
    pub pipeline: PipelineConfig,
    pub server: ServerSettings,
}

/// The `[server]` table; every other table belongs to the pipeline.
#[derive(Deserialize)]
struct ServerSection {
    #[serde(default)]
    server: ServerSettings,
}

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_open")]
    pub open: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            open: default_open(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_open() -> bool {
    true
}

/// Load configuration from `path` if it exists.
/// Returns an error if the config file exists but is malformed.
pub fn load_config(path: &Path) -> Result<ConfigFile> {
    if path.exists() {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config = parse_config(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        tracing::info!("Loaded config from {}", path.display());
        return Ok(config);
    }
    Ok(ConfigFile::default())
}

fn parse_config(content: &str) -> Result<ConfigFile> {
    let pipeline = PipelineConfig::from_toml(content)?;
    let ServerSection { server } = toml::from_str(content)?;
    Ok(ConfigFile { pipeline, server })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    #[test]
    fn reads_pipeline_and_server_sections() {
        let config = parse_config(
            r#"
[paths]
dist = "public"

[styles]
browsers = ["safari 8"]

[server]
port = 8080
"#,
        )
        .unwrap();

        assert_eq!(config.pipeline.paths.dist, PathBuf::from("public"));
        assert_eq!(config.pipeline.styles.browsers, vec!["safari 8".to_string()]);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert!(config.server.open);
    }

    #[test]
    fn missing_file_means_defaults() {
        let temp = tempfile::tempdir().unwrap();

        let config = load_config(&temp.path().join("kiln.toml")).unwrap();

        assert_eq!(config.pipeline.paths.app, PathBuf::from("app"));
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("kiln.toml");
        fs::write(&path, "[server\nport = ").unwrap();

        assert!(load_config(&path).is_err());
    }
}
