//! Scaffold a kiln project.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use kiln_pipeline::PipelineConfig;

/// Run the init command next to `config_path`.
pub async fn run(config_path: &Path, yes: bool) -> Result<()> {
    tracing::info!("Initializing kiln...");

    let root = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    let created = scaffold(root, config_path, yes)?;
    for path in &created {
        tracing::info!("Created {}", path.display());
    }

    tracing::info!("Initialization complete!");
    tracing::info!("Run 'kiln' to build and start the development server.");

    Ok(())
}

/// Write the config file and starter sources. Existing files are kept unless
/// `overwrite` is set.
fn scaffold(root: &Path, config_path: &Path, overwrite: bool) -> Result<Vec<PathBuf>> {
    let defaults = PipelineConfig::default();
    let app = root.join(defaults.app_dir());
    let mut created = Vec::new();

    if app.exists() && !overwrite {
        tracing::warn!(
            "{} directory already exists. Use --yes to overwrite.",
            app.display()
        );
        return Ok(created);
    }

    for dir in [
        &defaults.images.source,
        &defaults.fonts.source,
        &defaults.sprite.icons,
    ] {
        let dir = app.join(dir);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let files = [
        (config_path.to_path_buf(), DEFAULT_CONFIG),
        (app.join(&defaults.styles.entry), DEFAULT_STYLE),
        (app.join(&defaults.scripts.entries[0]), DEFAULT_SCRIPT),
        (app.join(&defaults.pages.source).join("index.html"), DEFAULT_PAGE),
        (
            app.join(&defaults.pages.components[0]).join("header.html"),
            DEFAULT_HEADER,
        ),
    ];

    for (path, content) in files {
        if path.exists() && !overwrite {
            continue;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        created.push(path);
    }

    Ok(created)
}

const DEFAULT_CONFIG: &str = r#"# Kiln Configuration
# Every key is optional; the values below are the defaults.

[paths]
# Working directory with sources and intermediate artifacts
app = "app"

# Distribution directory filled by `kiln build`
dist = "dist"

[styles]
entry = "scss/style.scss"
output = "css/style.min.css"
browsers = ["last 10 versions"]

[scripts]
# Concatenated in this order
entries = ["js/main.js"]
output = "js/main.min.js"

[images]
source = "images/src"
output = "images"
avif_quality = 50

[fonts]
source = "fonts/src"
output = "fonts"

[pages]
source = "pages"
components = ["components"]

[server]
port = 3000
open = true
"#;

const DEFAULT_STYLE: &str = r#"$text: #222;

body {
  margin: 0;
  color: $text;
  font-family: system-ui, sans-serif;

  .header {
    padding: 1rem;
    user-select: none;
  }
}
"#;

const DEFAULT_SCRIPT: &str = r#"document.addEventListener('DOMContentLoaded', function () {
  console.log('kiln is running');
});
"#;

const DEFAULT_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>Kiln</title>
  <link rel="stylesheet" href="css/style.min.css">
</head>
<body>
  <!--= include header.html -->
  <main>
    <p>Edit app/pages/index.html to get started.</p>
  </main>
  <script src="js/main.min.js"></script>
</body>
</html>
"#;

const DEFAULT_HEADER: &str = r#"<header class="header">
  <h1>Kiln</h1>
</header>
"#;
