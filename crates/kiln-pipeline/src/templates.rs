//! Template for the sprite preview page.

use minijinja::{context, Environment};

/// One icon entry on the preview page.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PreviewIcon {
    /// Fragment identifier inside the sprite
    pub id: String,
    /// Sprite URL with the fragment, relative to the preview page
    pub href: String,
}

/// Render the sprite preview page.
pub fn render_sprite_preview(
    sprite_name: &str,
    icons: &[PreviewIcon],
) -> Result<String, minijinja::Error> {
    // Ids and hrefs are sanitized already; no auto-escaping.
    let mut env = Environment::new();
    env.add_template("sprite_preview", PREVIEW_TEMPLATE)?;

    env.get_template("sprite_preview")?.render(context! {
        sprite => sprite_name,
        icons => icons,
        count => icons.len(),
    })
}

const PREVIEW_TEMPLATE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>{{ sprite }}: {{ count }} icons</title>
  <style>
    body { font-family: sans-serif; margin: 2rem; }
    ul { display: flex; flex-wrap: wrap; gap: 1rem; list-style: none; padding: 0; }
    li { width: 8rem; text-align: center; }
    img { width: 3rem; height: 3rem; display: block; margin: 0 auto .5rem; }
    code { font-size: .75rem; }
  </style>
</head>
<body>
  <h1>{{ sprite }}</h1>
  <ul>
  {% for icon in icons %}
    <li>
      <img src="{{ icon.href }}" alt="{{ icon.id }}">
      <code>#{{ icon.id }}</code>
    </li>
  {% endfor %}
  </ul>
</body>
</html>
"##;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_every_icon() {
        let icons = vec![
            PreviewIcon {
                id: "cart".to_string(),
                href: "../sprite.svg#cart".to_string(),
            },
            PreviewIcon {
                id: "user".to_string(),
                href: "../sprite.svg#user".to_string(),
            },
        ];

        let html = render_sprite_preview("sprite.svg", &icons).unwrap();

        assert!(html.contains("<title>sprite.svg: 2 icons</title>"));
        assert!(html.contains(r#"<img src="../sprite.svg#cart" alt="cart">"#));
        assert!(html.contains("#user"));
    }
}
