//! SVG sprite sheet in "stack" mode: every icon becomes a nested `<svg>` that
//! is shown only when targeted by its fragment (`sprite.svg#icon`).

use std::path::{Component, Path};

use crate::config::PipelineConfig;
use crate::stage::{
    extension, list_files, read_text, write_output, Stage, StageError, StageKind, StageReport,
};
use crate::svg::{self, Icon};
use crate::templates::{self, PreviewIcon};

const SPRITE_HEADER: &str = concat!(
    r#"<?xml version="1.0" encoding="utf-8"?>"#,
    r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink">"#,
    "<style>:root>svg{display:none}:root>svg:target{display:block}</style>",
);

/// Stacks the icons of the icon directory into one sprite sheet.
pub struct SpriteBuilder;

impl Stage for SpriteBuilder {
    fn kind(&self) -> StageKind {
        StageKind::Sprite
    }

    fn run(&self, config: &PipelineConfig) -> Result<StageReport, StageError> {
        let sprite_config = &config.sprite;
        let icons_dir = config.in_app(&sprite_config.icons);
        let sprite_path = icons_dir.join(&sprite_config.sprite);
        let mut report = StageReport::new(StageKind::Sprite);

        let icons = collect_icons(&icons_dir, &sprite_path)?;
        if icons.is_empty() {
            tracing::warn!("No icons found in {}", icons_dir.display());
            return Ok(report);
        }

        write_output(&sprite_path, render_sprite(&icons))?;
        report.written.push(sprite_path);

        if let Some(example) = &sprite_config.example {
            let href_base = relative_href(example, &sprite_config.sprite);
            let entries: Vec<PreviewIcon> = icons
                .iter()
                .map(|icon| PreviewIcon {
                    id: icon.id.clone(),
                    href: format!("{}#{}", href_base, icon.id),
                })
                .collect();

            let sprite_name = sprite_config
                .sprite
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let html = templates::render_sprite_preview(&sprite_name, &entries)
                .map_err(|e| StageError::Template(e.to_string()))?;

            let example_path = icons_dir.join(example);
            write_output(&example_path, html)?;
            report.written.push(example_path);
        }

        Ok(report)
    }
}

/// Icons directly inside `dir`, ordered by file name, excluding the sprite itself.
fn collect_icons(dir: &Path, sprite_path: &Path) -> Result<Vec<Icon>, StageError> {
    let mut icons = Vec::new();

    for path in list_files(dir)? {
        if extension(&path) != "svg" || path == sprite_path {
            continue;
        }

        let id = icon_id(&path);
        let source = read_text(&path)?;
        let icon = svg::parse_icon(&id, &source).map_err(|message| StageError::Svg {
            path: path.clone(),
            message,
        })?;
        icons.push(icon);
    }

    Ok(icons)
}

/// Fragment identifier for an icon file: its stem with unsafe characters replaced.
pub fn icon_id(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Serialize the stacked sprite.
pub fn render_sprite(icons: &[Icon]) -> String {
    let mut out = String::from(SPRITE_HEADER);

    for icon in icons {
        out.push_str(&format!("<svg id=\"{}\"", icon.id));
        if let Some(view_box) = &icon.view_box {
            out.push_str(&format!(" viewBox=\"{}\"", view_box));
        }
        if let Some(par) = &icon.preserve_aspect_ratio {
            out.push_str(&format!(" preserveAspectRatio=\"{}\"", par));
        }
        out.push('>');
        out.push_str(&icon.body);
        out.push_str("</svg>");
    }

    out.push_str("</svg>");
    out
}

/// URL of `target` as seen from the page at `page`, both relative to the same root.
fn relative_href(page: &Path, target: &Path) -> String {
    let from: Vec<Component> = page
        .parent()
        .map(|p| p.components().filter(|c| *c != Component::CurDir).collect())
        .unwrap_or_default();
    let to: Vec<Component> = target
        .components()
        .filter(|c| *c != Component::CurDir)
        .collect();

    let shared = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = vec!["..".to_string(); from.len() - shared];
    parts.extend(
        to[shared..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn setup() -> (tempfile::TempDir, PipelineConfig) {
        let temp = tempdir().unwrap();
        let config = PipelineConfig::with_dirs(temp.path().join("app"), temp.path().join("dist"));
        let images = config.in_app("images");
        fs::create_dir_all(&images).unwrap();
        fs::write(
            images.join("user.svg"),
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24"><circle r="4"/></svg>"#,
        )
        .unwrap();
        fs::write(
            images.join("cart icon.svg"),
            r#"<svg width="16" height="16"><path d="M0 0"/></svg>"#,
        )
        .unwrap();
        fs::write(images.join("photo.png"), b"not svg").unwrap();
        (temp, config)
    }

    #[test]
    fn stacks_icons_in_name_order() {
        let (_temp, config) = setup();

        SpriteBuilder.run(&config).unwrap();

        let sprite = fs::read_to_string(config.in_app("images/sprite.svg")).unwrap();
        assert!(sprite.starts_with(SPRITE_HEADER));
        let cart = sprite.find(r#"<svg id="cart-icon" viewBox="0 0 16 16">"#).unwrap();
        let user = sprite
            .find(r#"<svg id="user" viewBox="0 0 24 24"><circle r="4"/></svg>"#)
            .unwrap();
        assert!(cart < user);
        assert!(sprite.ends_with("</svg></svg>"));
    }

    #[test]
    fn rebuilding_is_byte_identical_and_skips_own_output() {
        let (_temp, config) = setup();

        SpriteBuilder.run(&config).unwrap();
        let first = fs::read(config.in_app("images/sprite.svg")).unwrap();
        let report = SpriteBuilder.run(&config).unwrap();
        let second = fs::read(config.in_app("images/sprite.svg")).unwrap();

        assert_eq!(first, second);
        assert_eq!(report.written.len(), 2);
        assert!(!String::from_utf8(second).unwrap().contains("id=\"sprite\""));
    }

    #[test]
    fn writes_preview_page() {
        let (_temp, config) = setup();

        SpriteBuilder.run(&config).unwrap();

        let html = fs::read_to_string(config.in_app("images/stack/sprite.stack.html")).unwrap();
        assert!(html.contains(r#"src="../sprite.svg#user""#));
        assert!(html.contains(r#"src="../sprite.svg#cart-icon""#));
    }

    #[test]
    fn no_icons_writes_nothing() {
        let temp = tempdir().unwrap();
        let config = PipelineConfig::with_dirs(temp.path().join("app"), temp.path().join("dist"));

        let report = SpriteBuilder.run(&config).unwrap();

        assert!(report.written.is_empty());
        assert!(!config.in_app("images/sprite.svg").exists());
    }

    #[test]
    fn computes_relative_hrefs() {
        assert_eq!(
            relative_href(Path::new("stack/sprite.stack.html"), Path::new("sprite.svg")),
            "../sprite.svg"
        );
        assert_eq!(
            relative_href(Path::new("preview.html"), Path::new("sprite.svg")),
            "sprite.svg"
        );
        assert_eq!(
            relative_href(Path::new("out/a.html"), Path::new("out/icons.svg")),
            "icons.svg"
        );
    }

    #[test]
    fn sanitizes_icon_ids() {
        assert_eq!(icon_id(Path::new("arrow left.svg")), "arrow-left");
        assert_eq!(icon_id(Path::new("a_b-c.svg")), "a_b-c");
    }
}
