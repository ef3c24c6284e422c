//! Web font conversion.
//!
//! Sources are converted to WOFF and plain SFNT first; every SFNT in the output
//! directory is then converted to WOFF2.

pub mod sfnt;
pub mod woff;
pub mod woff2;

use std::path::{Path, PathBuf};

use crate::config::PipelineConfig;
use crate::stage::{
    extension, list_files, read_input, write_output, Stage, StageError, StageKind, StageReport,
};

pub use sfnt::Font;

/// Errors from parsing or encoding font containers.
#[derive(Debug, thiserror::Error)]
pub enum FontError {
    #[error("Unexpected end of data at byte {0}")]
    Truncated(usize),

    #[error("Unsupported font: {0}")]
    Unsupported(String),

    #[error("Malformed font: {0}")]
    Malformed(String),

    #[error("Compression failed: {0}")]
    Compression(#[from] std::io::Error),
}

const SOURCE_EXTENSIONS: &[&str] = &["ttf", "otf", "woff"];
const SFNT_EXTENSIONS: &[&str] = &["ttf", "otf"];

/// Converts source fonts into WOFF, TTF/OTF and WOFF2.
pub struct FontConverter;

impl Stage for FontConverter {
    fn kind(&self) -> StageKind {
        StageKind::Fonts
    }

    fn run(&self, config: &PipelineConfig) -> Result<StageReport, StageError> {
        let source_dir = config.in_app(&config.fonts.source);
        let out_dir = config.in_app(&config.fonts.output);
        let mut report = StageReport::new(StageKind::Fonts);

        if !source_dir.is_dir() {
            tracing::warn!("Font source directory not found: {}", source_dir.display());
            return Ok(report);
        }

        for source in list_files(&source_dir)? {
            if !SOURCE_EXTENSIONS.contains(&extension(&source).as_str()) {
                tracing::debug!("Skipping {}", source.display());
                continue;
            }
            report.written.extend(convert_source(&source, &out_dir)?);
        }

        for sfnt_file in list_files(&out_dir)? {
            if !SFNT_EXTENSIONS.contains(&extension(&sfnt_file).as_str()) {
                continue;
            }
            let font = load(&sfnt_file)?;
            let output = sfnt_file.with_extension("woff2");
            let bytes = woff2::encode(&font).map_err(font_error(&sfnt_file))?;
            write_output(&output, bytes)?;
            report.written.push(output);
        }

        Ok(report)
    }
}

/// Write `<stem>.woff` and `<stem>.ttf`/`.otf` for one source font.
fn convert_source(source: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, StageError> {
    let font = load(source)?;
    let stem = source.file_stem().unwrap_or_default().to_string_lossy();

    let woff_path = out_dir.join(format!("{}.woff", stem));
    let woff = woff::encode(&font).map_err(font_error(source))?;
    write_output(&woff_path, woff)?;

    let sfnt_path = out_dir.join(format!("{}.{}", stem, font.sfnt_extension()));
    write_output(&sfnt_path, font.to_sfnt())?;

    Ok(vec![woff_path, sfnt_path])
}

fn load(path: &Path) -> Result<Font, StageError> {
    let bytes = read_input(path)?;
    Font::from_bytes(&bytes).map_err(font_error(path))
}

fn font_error(path: &Path) -> impl FnOnce(FontError) -> StageError + '_ {
    move |source| StageError::Font {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::sfnt::tests::sample_font;
    use std::fs;
    use tempfile::tempdir;

    fn setup() -> (tempfile::TempDir, PipelineConfig) {
        let temp = tempdir().unwrap();
        let config = PipelineConfig::with_dirs(temp.path().join("app"), temp.path().join("dist"));
        fs::create_dir_all(config.in_app("fonts/src")).unwrap();
        (temp, config)
    }

    #[test]
    fn produces_all_three_formats() {
        let (_temp, config) = setup();
        fs::write(config.in_app("fonts/src/inter.ttf"), sample_font().to_sfnt()).unwrap();

        let report = FontConverter.run(&config).unwrap();

        let fonts = config.in_app("fonts");
        assert_eq!(&fs::read(fonts.join("inter.woff")).unwrap()[0..4], b"wOFF");
        assert_eq!(&fs::read(fonts.join("inter.woff2")).unwrap()[0..4], b"wOF2");
        assert_eq!(
            fs::read(fonts.join("inter.ttf")).unwrap(),
            sample_font().to_sfnt()
        );
        assert_eq!(report.written.len(), 3);
    }

    #[test]
    fn woff_sources_are_unpacked() {
        let (_temp, config) = setup();
        let woff = woff::encode(&sample_font()).unwrap();
        fs::write(config.in_app("fonts/src/icons.woff"), woff).unwrap();

        FontConverter.run(&config).unwrap();

        let ttf = fs::read(config.in_app("fonts/icons.ttf")).unwrap();
        assert_eq!(ttf, sample_font().to_sfnt());
        assert!(config.in_app("fonts/icons.woff2").exists());
    }

    #[test]
    fn corrupt_font_fails_the_stage() {
        let (_temp, config) = setup();
        fs::write(config.in_app("fonts/src/broken.ttf"), b"garbage!").unwrap();

        let err = FontConverter.run(&config).unwrap_err();

        assert!(matches!(err, StageError::Font { .. }));
    }

    #[test]
    fn ignores_other_files() {
        let (_temp, config) = setup();
        fs::write(config.in_app("fonts/src/LICENSE.txt"), "OFL").unwrap();

        let report = FontConverter.run(&config).unwrap();

        assert!(report.written.is_empty());
    }
}
