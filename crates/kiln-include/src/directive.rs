//! Include directive scanning.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

/// How a directive treats files already spliced into the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    /// Splice the target every time
    Include,
    /// Splice the target at most once per page
    Require,
}

impl DirectiveKind {
    fn from_keyword(keyword: &str) -> Self {
        match keyword {
            "require" => Self::Require,
            _ => Self::Include,
        }
    }
}

/// A directive found in a source file.
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    /// Include or require
    pub kind: DirectiveKind,

    /// Target path or glob, quotes removed
    pub target: String,

    /// Whitespace preceding the comment opener
    pub indent: String,

    /// Byte range of the directive line, indentation included and line
    /// terminator excluded
    pub span: Range<usize>,

    /// 1-based line number
    pub line: usize,
}

// Comment openers: `//`, `/*`, `#`, `<!--`.
static DIRECTIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^([ \t]*)(?://|/\*|#|<!--)[ \t]*=[ \t]*(include|require)[ \t]+(.+?)[ \t]*(?:\*/|-->)?[ \t]*\r?$",
    )
    .expect("directive pattern is valid")
});

/// Scan a source file for include directives, in document order.
pub fn scan(source: &str) -> Vec<Directive> {
    DIRECTIVE_RE
        .captures_iter(source)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let mut end = whole.end();
            if source[..end].ends_with('\r') {
                end -= 1;
            }

            let target = unquote(caps.get(3)?.as_str());
            if target.is_empty() {
                return None;
            }

            Some(Directive {
                kind: DirectiveKind::from_keyword(caps.get(2)?.as_str()),
                target: target.to_string(),
                indent: caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default(),
                span: whole.start()..end,
                line: source[..whole.start()].matches('\n').count() + 1,
            })
        })
        .collect()
}

fn unquote(raw: &str) -> &str {
    let trimmed = raw.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = trimmed
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner.trim();
        }
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_html_comment_directive() {
        let source = "<body>\n<!--=include header.html -->\n</body>\n";

        let found = scan(source);

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, DirectiveKind::Include);
        assert_eq!(found[0].target, "header.html");
        assert_eq!(found[0].line, 2);
        assert_eq!(&source[found[0].span.clone()], "<!--=include header.html -->");
    }

    #[test]
    fn accepts_every_comment_style() {
        let source = "//=include a.html\n/* = require b.html */\n# =include c.html\n<!-- = include d.html-->\n";

        let targets: Vec<_> = scan(source).into_iter().map(|d| d.target).collect();

        assert_eq!(targets, vec!["a.html", "b.html", "c.html", "d.html"]);
    }

    #[test]
    fn strips_quotes_and_keeps_indent() {
        let source = "  <main>\n    //= require \"parts/nav.html\"\n  </main>";

        let found = scan(source);

        assert_eq!(found[0].kind, DirectiveKind::Require);
        assert_eq!(found[0].target, "parts/nav.html");
        assert_eq!(found[0].indent, "    ");
    }

    #[test]
    fn excludes_carriage_return_from_span() {
        let source = "<!--=include a.html -->\r\nrest";

        let found = scan(source);

        assert_eq!(&source[found[0].span.clone()], "<!--=include a.html -->");
    }

    #[test]
    fn ignores_ordinary_comments() {
        let source = "<!-- include header.html -->\n// include nothing\n";

        assert!(scan(source).is_empty());
    }
}
