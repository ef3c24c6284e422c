//! Style bundling: Sass compilation, vendor prefixing, minification.

use std::path::Path;

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};

use crate::config::PipelineConfig;
use crate::stage::{write_output, Reload, Stage, StageError, StageKind, StageReport};

/// Compiles the root Sass entry into a single prefixed stylesheet.
pub struct StyleBundler;

impl Stage for StyleBundler {
    fn kind(&self) -> StageKind {
        StageKind::Styles
    }

    fn run(&self, config: &PipelineConfig) -> Result<StageReport, StageError> {
        let styles = &config.styles;
        let entry = config.in_app(&styles.entry);
        if !entry.is_file() {
            return Err(StageError::MissingInput(entry));
        }

        let css = compile_sass(&entry)?;
        let css = prefix_css(&css, &styles.browsers, styles.minify).map_err(|message| {
            StageError::Style {
                path: entry.clone(),
                message,
            }
        })?;

        let output = config.in_app(&styles.output);
        write_output(&output, css)?;

        let mut report = StageReport::new(StageKind::Styles)
            .with_reload(Reload::Stylesheet(url_path(&styles.output)));
        report.written.push(output);
        Ok(report)
    }
}

/// Compile a Sass entry to expanded CSS.
///
/// Nested imports resolve relative to the importing file, then the entry's
/// directory.
pub fn compile_sass(entry: &Path) -> Result<String, StageError> {
    let mut options = grass::Options::default().style(grass::OutputStyle::Expanded);
    if let Some(dir) = entry.parent() {
        options = options.load_path(dir);
    }

    grass::from_path(entry, &options).map_err(|e| StageError::Style {
        path: entry.to_path_buf(),
        message: e.to_string(),
    })
}

/// Add vendor prefixes for `browsers` and print the stylesheet.
pub fn prefix_css(css: &str, browsers: &[String], minify: bool) -> Result<String, String> {
    let targets = if browsers.is_empty() {
        Targets::default()
    } else {
        let browsers = Browsers::from_browserslist(browsers.iter().map(String::as_str))
            .map_err(|e| format!("Invalid browser query: {}", e))?;
        Targets {
            browsers,
            ..Targets::default()
        }
    };

    let mut stylesheet = StyleSheet::parse(css, ParserOptions::default())
        .map_err(|e| format!("CSS parse error: {}", e))?;

    stylesheet
        .minify(MinifyOptions {
            targets: targets.clone(),
            ..MinifyOptions::default()
        })
        .map_err(|e| format!("CSS minify error: {}", e))?;

    let printed = stylesheet
        .to_css(PrinterOptions {
            minify,
            targets,
            ..PrinterOptions::default()
        })
        .map_err(|e| format!("CSS print error: {}", e))?;

    Ok(printed.code)
}

/// URL path under which the dev server serves `relative`.
fn url_path(relative: &Path) -> String {
    let joined = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    format!("/{}", joined.trim_start_matches("./"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn compiles_nested_sass_with_imports() {
        let temp = tempdir().unwrap();
        let scss = temp.path().join("scss");
        fs::create_dir_all(&scss).unwrap();
        fs::write(scss.join("_vars.scss"), "$accent: red;\n").unwrap();
        fs::write(
            scss.join("style.scss"),
            "@import 'vars';\n.card { color: $accent; .title { font-weight: bold; } }\n",
        )
        .unwrap();

        let css = compile_sass(&scss.join("style.scss")).unwrap();

        assert!(css.contains(".card .title"));
        assert!(css.contains("color: red"));
    }

    #[test]
    fn reports_sass_errors() {
        let temp = tempdir().unwrap();
        let entry = temp.path().join("broken.scss");
        fs::write(&entry, ".a { color: $undefined; }").unwrap();

        let err = compile_sass(&entry).unwrap_err();

        assert!(matches!(err, StageError::Style { .. }));
    }

    #[test]
    fn adds_vendor_prefixes() {
        let css = prefix_css(
            ".a { user-select: none; }",
            &["safari 8".to_string()],
            true,
        )
        .unwrap();

        assert!(css.contains("-webkit-user-select:none"));
    }

    #[test]
    fn minified_output_has_no_newlines() {
        let css = prefix_css(".a {\n  color: blue;\n}\n", &[], true).unwrap();

        assert!(!css.contains('\n'));
        assert!(css.contains(".a"));
    }

    #[test]
    fn builds_stylesheet_into_app_dir() {
        let temp = tempdir().unwrap();
        let config = PipelineConfig::with_dirs(temp.path().join("app"), temp.path().join("dist"));
        fs::create_dir_all(config.in_app("scss")).unwrap();
        fs::write(config.in_app("scss/style.scss"), "body { margin: 0; }").unwrap();

        let report = StyleBundler.run(&config).unwrap();

        let css = fs::read_to_string(config.in_app("css/style.min.css")).unwrap();
        assert!(css.contains("body{margin:0}"));
        assert_eq!(
            report.reload,
            Reload::Stylesheet("/css/style.min.css".to_string())
        );
    }

    #[test]
    fn missing_entry_is_an_error() {
        let temp = tempdir().unwrap();
        let config = PipelineConfig::with_dirs(temp.path().join("app"), temp.path().join("dist"));

        let err = StyleBundler.run(&config).unwrap_err();

        assert!(matches!(err, StageError::MissingInput(_)));
    }
}
