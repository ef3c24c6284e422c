//! Page assembly: expand include directives in every page template.

use std::path::PathBuf;

use kiln_include::Assembler;
use rayon::prelude::*;

use crate::config::PipelineConfig;
use crate::stage::{
    extension, list_files, write_output, Reload, Stage, StageError, StageKind, StageReport,
};

/// Assembles `pages/*.html` into complete pages in the app directory.
pub struct PageAssembler;

impl Stage for PageAssembler {
    fn kind(&self) -> StageKind {
        StageKind::Pages
    }

    fn run(&self, config: &PipelineConfig) -> Result<StageReport, StageError> {
        let pages = &config.pages;
        let source_dir = config.in_app(&pages.source);
        if !source_dir.is_dir() {
            tracing::warn!("Pages directory not found: {}", source_dir.display());
            return Ok(StageReport::new(StageKind::Pages));
        }

        let include_paths = pages.components.iter().map(|c| config.in_app(c)).collect();
        let assembler = Assembler::new(include_paths);
        let out_dir = config.in_app(&pages.output);

        let templates: Vec<PathBuf> = list_files(&source_dir)?
            .into_iter()
            .filter(|p| extension(p) == "html")
            .collect();

        let written = templates
            .par_iter()
            .map(|template| {
                let html = assembler.assemble_file(template)?;
                let output = out_dir.join(template.file_name().unwrap_or_default());
                write_output(&output, html)?;
                tracing::debug!("Assembled {}", output.display());
                Ok(output)
            })
            .collect::<Result<Vec<_>, StageError>>()?;

        let mut report = StageReport::new(StageKind::Pages).with_reload(Reload::Page);
        report.written = written;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_include::IncludeError;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn setup() -> (tempfile::TempDir, PipelineConfig) {
        let temp = tempdir().unwrap();
        let config = PipelineConfig::with_dirs(temp.path().join("app"), temp.path().join("dist"));
        fs::create_dir_all(config.in_app("pages")).unwrap();
        fs::create_dir_all(config.in_app("components")).unwrap();
        (temp, config)
    }

    #[test]
    fn assembles_pages_with_components() {
        let (_temp, config) = setup();
        fs::write(config.in_app("components/header.html"), "<header>Hi</header>\n").unwrap();
        fs::write(
            config.in_app("pages/index.html"),
            "<body>\n<!--= include header.html -->\n</body>\n",
        )
        .unwrap();

        let report = PageAssembler.run(&config).unwrap();

        let html = fs::read_to_string(config.in_app("index.html")).unwrap();
        assert_eq!(html, "<body>\n<header>Hi</header>\n</body>\n");
        assert_eq!(report.written, vec![config.in_app("index.html")]);
        assert_eq!(report.reload, Reload::Page);
    }

    #[test]
    fn ignores_non_html_files() {
        let (_temp, config) = setup();
        fs::write(config.in_app("pages/notes.txt"), "x").unwrap();
        fs::write(config.in_app("pages/about.html"), "<p>about</p>").unwrap();

        let report = PageAssembler.run(&config).unwrap();

        assert_eq!(report.written.len(), 1);
        assert!(!config.in_app("notes.txt").exists());
    }

    #[test]
    fn missing_component_fails_the_stage() {
        let (_temp, config) = setup();
        fs::write(
            config.in_app("pages/index.html"),
            "<!--= include missing.html -->",
        )
        .unwrap();

        let err = PageAssembler.run(&config).unwrap_err();

        assert!(matches!(
            err,
            StageError::Include(IncludeError::NotFound { .. })
        ));
    }

    #[test]
    fn missing_pages_dir_yields_empty_report() {
        let temp = tempdir().unwrap();
        let config = PipelineConfig::with_dirs(temp.path().join("app"), temp.path().join("dist"));

        let report = PageAssembler.run(&config).unwrap();

        assert!(report.written.is_empty());
        assert_eq!(report.reload, Reload::None);
    }
}
