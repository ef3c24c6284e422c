//! Pipeline configuration (the `kiln.toml` model).
//!
//! Every key is optional. Paths under `[paths]` are relative to the working
//! directory; every other path is relative to the app directory.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Full pipeline configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub styles: StylesConfig,
    pub scripts: ScriptsConfig,
    pub images: ImagesConfig,
    pub fonts: FontsConfig,
    pub pages: PagesConfig,
    pub sprite: SpriteConfig,
    pub package: PackageConfig,
}

/// Working and distribution directories.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Working directory holding sources and intermediate artifacts
    pub app: PathBuf,

    /// Distribution directory filled by the packager
    pub dist: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            app: PathBuf::from("app"),
            dist: PathBuf::from("dist"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StylesConfig {
    /// Root Sass entry
    pub entry: PathBuf,

    /// Compiled stylesheet
    pub output: PathBuf,

    /// Browserslist queries used for vendor prefixing
    pub browsers: Vec<String>,

    /// Emit minified CSS
    pub minify: bool,

    /// Pattern of files that trigger a rebuild while watching
    pub watch: String,
}

impl Default for StylesConfig {
    fn default() -> Self {
        Self {
            entry: PathBuf::from("scss/style.scss"),
            output: PathBuf::from("css/style.min.css"),
            browsers: vec!["last 10 versions".to_string()],
            minify: true,
            watch: "scss/**/*.scss".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScriptsConfig {
    /// Entry files, concatenated in this order
    pub entries: Vec<PathBuf>,

    /// Bundled output
    pub output: PathBuf,

    pub minify: bool,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            entries: vec![PathBuf::from("js/main.js")],
            output: PathBuf::from("js/main.min.js"),
            minify: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    pub source: PathBuf,
    pub output: PathBuf,

    /// AVIF quality, 1-100
    pub avif_quality: f32,

    /// AVIF encoder speed, 1 (slowest) to 10 (fastest)
    pub avif_speed: u8,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("images/src"),
            output: PathBuf::from("images"),
            avif_quality: 50.0,
            avif_speed: 6,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FontsConfig {
    pub source: PathBuf,
    pub output: PathBuf,
}

impl Default for FontsConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("fonts/src"),
            output: PathBuf::from("fonts"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PagesConfig {
    /// Page templates (non-recursive)
    pub source: PathBuf,

    /// Include search paths, tried in order after the including file's directory
    pub components: Vec<PathBuf>,

    /// Directory receiving assembled pages
    pub output: PathBuf,
}

impl Default for PagesConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("pages"),
            components: vec![PathBuf::from("components")],
            output: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpriteConfig {
    /// Directory holding the icons
    pub icons: PathBuf,

    /// Sprite sheet, relative to the icons directory
    pub sprite: PathBuf,

    /// Preview page, relative to the icons directory
    pub example: Option<PathBuf>,
}

impl Default for SpriteConfig {
    fn default() -> Self {
        Self {
            icons: PathBuf::from("images"),
            sprite: PathBuf::from("sprite.svg"),
            example: Some(PathBuf::from("stack/sprite.stack.html")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PackageConfig {
    /// Ordered allow/deny globs; `!` denies and the last matching rule wins
    pub rules: Vec<String>,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            rules: [
                "css/style.min.css",
                "images/*.*",
                "!images/*.svg",
                "images/sprite.svg",
                "fonts/*.*",
                "js/main.min.js",
                "**/*.html",
                "!images/**/*.html",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl PipelineConfig {
    /// Parse a configuration document.
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Default configuration rooted at explicit directories.
    pub fn with_dirs(app: impl Into<PathBuf>, dist: impl Into<PathBuf>) -> Self {
        Self {
            paths: PathsConfig {
                app: app.into(),
                dist: dist.into(),
            },
            ..Self::default()
        }
    }

    pub fn app_dir(&self) -> &Path {
        &self.paths.app
    }

    pub fn dist_dir(&self) -> &Path {
        &self.paths.dist
    }

    /// Resolve a path relative to the app directory.
    pub fn in_app(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.paths.app.join(relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = PipelineConfig::from_toml("").unwrap();

        assert_eq!(config.paths.app, PathBuf::from("app"));
        assert_eq!(config.styles.output, PathBuf::from("css/style.min.css"));
        assert_eq!(config.images.avif_quality, 50.0);
        assert_eq!(config.package.rules.len(), 8);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = PipelineConfig::from_toml(
            r#"
[paths]
app = "src"

[scripts]
entries = ["js/vendor.js", "js/main.js"]
"#,
        )
        .unwrap();

        assert_eq!(config.paths.app, PathBuf::from("src"));
        assert_eq!(config.paths.dist, PathBuf::from("dist"));
        assert_eq!(config.scripts.entries.len(), 2);
        assert_eq!(config.scripts.output, PathBuf::from("js/main.min.js"));
        assert_eq!(config.in_app("css"), PathBuf::from("src/css"));
    }

    #[test]
    fn rejects_malformed_config() {
        let result = PipelineConfig::from_toml("[styles\nentry = 1");

        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
