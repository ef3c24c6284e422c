//! Image conversion: AVIF, WebP and lossless recompression of the original.
//!
//! The three conversions run one after another over the full source list,
//! each skipping sources whose output is already up to date.

use std::collections::HashSet;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ImageFormat};
use rayon::prelude::*;

use crate::config::{ImagesConfig, PipelineConfig};
use crate::freshness;
use crate::stage::{
    extension, list_files, read_input, write_output, Stage, StageError, StageKind, StageReport,
};
use crate::svg;

/// Formats the raster conversions can decode.
const RASTER_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conversion {
    Avif,
    Webp,
    Optimize,
}

impl Conversion {
    const ORDER: [Conversion; 3] = [Self::Avif, Self::Webp, Self::Optimize];

    fn accepts(&self, ext: &str) -> bool {
        let raster = RASTER_EXTENSIONS.contains(&ext);
        match self {
            Self::Avif => raster,
            Self::Webp => raster && ext != "webp",
            Self::Optimize => raster || ext == "svg",
        }
    }

    fn output_for(&self, source: &Path, out_dir: &Path) -> PathBuf {
        let file_name = source.file_name().unwrap_or_default();
        let target = out_dir.join(file_name);
        match self {
            Self::Avif => target.with_extension("avif"),
            Self::Webp => target.with_extension("webp"),
            Self::Optimize => target,
        }
    }

    fn convert(&self, source: &Path, config: &ImagesConfig) -> Result<Vec<u8>, String> {
        match self {
            Self::Avif => {
                let img = decode(source)?;
                encode_avif(&img, config.avif_quality, config.avif_speed)
            }
            Self::Webp => encode_webp(&decode(source)?),
            Self::Optimize => optimize(source),
        }
    }
}

/// Converts new or changed images into AVIF and WebP and recompresses originals.
pub struct ImagePipeline;

impl Stage for ImagePipeline {
    fn kind(&self) -> StageKind {
        StageKind::Images
    }

    fn run(&self, config: &PipelineConfig) -> Result<StageReport, StageError> {
        let source_dir = config.in_app(&config.images.source);
        let out_dir = config.in_app(&config.images.output);
        let mut report = StageReport::new(StageKind::Images);

        if !source_dir.is_dir() {
            tracing::warn!("Image source directory not found: {}", source_dir.display());
            return Ok(report);
        }

        for conversion in Conversion::ORDER {
            // Each conversion re-reads the source list.
            let sources = list_files(&source_dir)?;

            let jobs = plan(conversion, &sources, &out_dir);

            let results: Vec<Result<Option<PathBuf>, StageError>> = jobs
                .par_iter()
                .map(|(source, output)| {
                    if freshness::is_fresh(source, output) {
                        tracing::debug!("Up to date: {}", output.display());
                        return Ok(None);
                    }

                    let bytes = conversion
                        .convert(source, &config.images)
                        .map_err(|message| StageError::Image {
                            path: source.clone(),
                            message,
                        })?;
                    write_output(output, bytes)?;
                    tracing::debug!("Wrote {}", output.display());
                    Ok(Some(output.clone()))
                })
                .collect();

            for result in results {
                match result? {
                    Some(path) => report.written.push(path),
                    None => report.skipped += 1,
                }
            }
        }

        Ok(report)
    }
}

/// Pair each accepted source with its output path.
///
/// Sources sharing an output (`hero.png` and `hero.jpg` both make `hero.avif`)
/// are resolved in path order: the first one wins and the rest are skipped
/// with a warning.
fn plan(conversion: Conversion, sources: &[PathBuf], out_dir: &Path) -> Vec<(PathBuf, PathBuf)> {
    let mut claimed = HashSet::new();
    let mut jobs = Vec::new();

    for source in sources {
        if !conversion.accepts(&extension(source)) {
            continue;
        }
        let output = conversion.output_for(source, out_dir);
        if !claimed.insert(output.clone()) {
            tracing::warn!(
                "Skipping {}: {} is already produced from another source",
                source.display(),
                output.display()
            );
            continue;
        }
        jobs.push((source.clone(), output));
    }

    jobs
}

fn decode(source: &Path) -> Result<DynamicImage, String> {
    image::open(source).map_err(|e| e.to_string())
}

/// Encode as lossy AVIF.
pub fn encode_avif(img: &DynamicImage, quality: f32, speed: u8) -> Result<Vec<u8>, String> {
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let pixels: Vec<ravif::RGBA8> = rgba
        .pixels()
        .map(|p| ravif::RGBA8::new(p[0], p[1], p[2], p[3]))
        .collect();

    let encoded = ravif::Encoder::new()
        .with_quality(quality)
        .with_speed(speed)
        .encode_rgba(ravif::Img::new(
            pixels.as_slice(),
            width as usize,
            height as usize,
        ))
        .map_err(|e| format!("AVIF encoding failed: {}", e))?;

    Ok(encoded.avif_file)
}

/// Encode as WebP.
pub fn encode_webp(img: &DynamicImage) -> Result<Vec<u8>, String> {
    let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
    let mut buf = Vec::new();
    rgba.write_to(&mut Cursor::new(&mut buf), ImageFormat::WebP)
        .map_err(|e| format!("WebP encoding failed: {}", e))?;
    Ok(buf)
}

/// Lossless recompression in the source's own format.
///
/// PNG is re-encoded at maximum effort and the smaller result kept; SVG is
/// minified; anything else is copied unchanged.
fn optimize(source: &Path) -> Result<Vec<u8>, String> {
    let original = read_input(source).map_err(|e| e.to_string())?;

    match extension(source).as_str() {
        "png" => {
            let img = image::load_from_memory_with_format(&original, ImageFormat::Png)
                .map_err(|e| e.to_string())?;
            let recompressed = recompress_png(&img)?;
            Ok(if recompressed.len() < original.len() {
                recompressed
            } else {
                original
            })
        }
        "svg" => {
            let text = String::from_utf8(original).map_err(|e| e.to_string())?;
            svg::minify(&text).map(String::into_bytes)
        }
        _ => Ok(original),
    }
}

fn recompress_png(img: &DynamicImage) -> Result<Vec<u8>, String> {
    let mut buf = Vec::new();
    let encoder =
        PngEncoder::new_with_quality(&mut buf, CompressionType::Best, FilterType::Adaptive);
    img.write_with_encoder(encoder)
        .map_err(|e| format!("PNG encoding failed: {}", e))?;
    Ok(buf)
}
