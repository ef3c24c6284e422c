//! SVG handling shared by the image and sprite stages.

use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};

/// An icon ready to be stacked into a sprite.
#[derive(Debug, Clone, PartialEq)]
pub struct Icon {
    /// Fragment identifier, derived from the file name
    pub id: String,

    pub view_box: Option<String>,

    pub preserve_aspect_ratio: Option<String>,

    /// Serialized children of the root element
    pub body: String,
}

/// Parse an icon file, keeping the root's geometry and its serialized children.
pub fn parse_icon(id: &str, source: &str) -> Result<Icon, String> {
    let mut reader = Reader::from_str(source);
    reader.config_mut().trim_text(true);

    let mut writer = Writer::new(Vec::new());
    let mut depth = 0usize;
    let mut root: Option<RootAttributes> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("XML error at {}: {}", reader.buffer_position(), e))?;

        match event {
            Event::Eof => break,
            Event::Comment(_) | Event::DocType(_) | Event::PI(_) | Event::Decl(_) => {}
            Event::Start(e) if root.is_none() => {
                root = Some(RootAttributes::read(&e)?);
                depth = 1;
            }
            Event::Empty(e) if root.is_none() => {
                root = Some(RootAttributes::read(&e)?);
                break;
            }
            _ if root.is_none() => {}
            Event::Start(e) => {
                depth += 1;
                write(&mut writer, Event::Start(e))?;
            }
            Event::End(e) => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    break;
                }
                write(&mut writer, Event::End(e))?;
            }
            other => write(&mut writer, other)?,
        }
    }

    let Some(root) = root else {
        return Err("no <svg> root element".to_string());
    };

    let view_box = root.view_box.or_else(|| {
        let width = parse_length(root.width.as_deref()?)?;
        let height = parse_length(root.height.as_deref()?)?;
        Some(format!("0 0 {} {}", width, height))
    });

    let body = String::from_utf8(writer.into_inner()).map_err(|e| e.to_string())?;

    Ok(Icon {
        id: id.to_string(),
        view_box,
        preserve_aspect_ratio: root.preserve_aspect_ratio,
        body,
    })
}

/// Minify an SVG document: drop comments, doctype, processing instructions and
/// whitespace-only text.
pub fn minify(source: &str) -> Result<String, String> {
    let mut reader = Reader::from_str(source);
    reader.config_mut().trim_text(true);
    let mut writer = Writer::new(Vec::new());

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("XML error at {}: {}", reader.buffer_position(), e))?;

        match event {
            Event::Eof => break,
            Event::Comment(_) | Event::DocType(_) | Event::PI(_) => {}
            other => write(&mut writer, other)?,
        }
    }

    String::from_utf8(writer.into_inner()).map_err(|e| e.to_string())
}

#[derive(Default)]
struct RootAttributes {
    view_box: Option<String>,
    preserve_aspect_ratio: Option<String>,
    width: Option<String>,
    height: Option<String>,
}

impl RootAttributes {
    fn read(e: &BytesStart<'_>) -> Result<Self, String> {
        if e.local_name().as_ref() != b"svg" {
            return Err("root element is not <svg>".to_string());
        }

        let mut root = Self::default();
        for attr in e.attributes().flatten() {
            let value = String::from_utf8_lossy(&attr.value).into_owned();
            match attr.key.as_ref() {
                b"viewBox" => root.view_box = Some(value),
                b"preserveAspectRatio" => root.preserve_aspect_ratio = Some(value),
                b"width" => root.width = Some(value),
                b"height" => root.height = Some(value),
                _ => {}
            }
        }
        Ok(root)
    }
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), String> {
    writer.write_event(event).map_err(|e| e.to_string())
}

/// Numeric part of a length such as `24`, `24px` or `1.5`.
fn parse_length(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_end_matches("px");
    trimmed.parse::<f64>().ok().map(|_| trimmed.to_string())
}
