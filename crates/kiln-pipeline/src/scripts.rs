//! Script bundling: ordered concatenation followed by minification.

use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::span::SourceType;

use crate::config::PipelineConfig;
use crate::stage::{read_text, write_output, Reload, Stage, StageError, StageKind, StageReport};

/// Concatenates the configured entries into one minified script.
pub struct ScriptBundler;

impl Stage for ScriptBundler {
    fn kind(&self) -> StageKind {
        StageKind::Scripts
    }

    fn run(&self, config: &PipelineConfig) -> Result<StageReport, StageError> {
        let scripts = &config.scripts;

        let mut sources = Vec::with_capacity(scripts.entries.len());
        for entry in &scripts.entries {
            let path = config.in_app(entry);
            if !path.is_file() {
                return Err(StageError::MissingInput(path));
            }
            sources.push(read_text(&path)?);
        }

        let bundle = concat(&sources);
        let bundle = if scripts.minify {
            minify_js(&bundle).map_err(StageError::Script)?
        } else {
            bundle
        };

        let output = config.in_app(&scripts.output);
        write_output(&output, bundle)?;

        let mut report = StageReport::new(StageKind::Scripts).with_reload(Reload::Page);
        report.written.push(output);
        Ok(report)
    }
}

/// Join sources in order, one newline between files.
pub fn concat(sources: &[String]) -> String {
    sources.join("\n")
}

/// Minify a classic (non-module) script.
///
/// Parsed with script semantics, so top-level declarations are globals that
/// the compressor keeps and the mangler leaves unrenamed.
pub fn minify_js(source: &str) -> Result<String, String> {
    let allocator = Allocator::default();
    let source_type = SourceType::script();
    let ret = Parser::new(&allocator, source, source_type).parse();
    if let Some(error) = ret.errors.first() {
        return Err(format!("Parse error: {}", error));
    }

    let mut program = ret.program;
    let options = MinifierOptions {
        mangle: Some(MangleOptions {
            top_level: Some(false),
            ..MangleOptions::default()
        }),
        compress: Some(CompressOptions::smallest()),
    };
    let ret = Minifier::new(options).minify(&allocator, &mut program);
    let code = Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            comments: CommentOptions::disabled(),
            ..CodegenOptions::default()
        })
        .with_scoping(ret.scoping)
        .build(&program)
        .code;
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn keeps_listed_order() {
        let bundle = concat(&[
            "console.log(\"first\");".to_string(),
            "console.log(\"second\");".to_string(),
        ]);

        let minified = minify_js(&bundle).unwrap();

        let first = minified.find("first").unwrap();
        let second = minified.find("second").unwrap();
        assert!(first < second);
    }

    #[test]
    fn strips_comments_and_whitespace() {
        let minified = minify_js("// greeting\nconsole.log(  'hello'  );\n").unwrap();

        assert!(!minified.contains("greeting"));
        assert!(minified.contains("hello"));
        assert!(minified.len() < 30);
    }

    #[test]
    fn keeps_top_level_globals() {
        let minified =
            minify_js("function openMenu() { return 1; }\nvar config = { a: 1 };\n").unwrap();

        assert!(minified.contains("function openMenu("));
        assert!(minified.contains("config"));
    }

    #[test]
    fn keeps_global_names_across_files() {
        let bundle = concat(&[
            "function helper() { return 42; }".to_string(),
            "window.x = helper();".to_string(),
        ]);

        let minified = minify_js(&bundle).unwrap();

        assert!(minified.contains("function helper("));
        assert!(minified.contains("helper()"));
    }

    #[test]
    fn rejects_invalid_syntax() {
        assert!(minify_js("function (").is_err());
    }

    #[test]
    fn bundles_entries_into_output() {
        let temp = tempdir().unwrap();
        let mut config =
            PipelineConfig::with_dirs(temp.path().join("app"), temp.path().join("dist"));
        config.scripts.entries = vec!["js/a.js".into(), "js/b.js".into()];
        fs::create_dir_all(config.in_app("js")).unwrap();
        fs::write(config.in_app("js/a.js"), "window.order = ['a'];").unwrap();
        fs::write(config.in_app("js/b.js"), "window.order.push('b');").unwrap();

        let report = ScriptBundler.run(&config).unwrap();

        let out = fs::read_to_string(config.in_app("js/main.min.js")).unwrap();
        let assign = out.find("order=").unwrap();
        let push = out.find("push").unwrap();
        assert!(assign < push);
        assert_eq!(report.reload, Reload::Page);
    }

    #[test]
    fn missing_entry_is_an_error() {
        let temp = tempdir().unwrap();
        let config = PipelineConfig::with_dirs(temp.path().join("app"), temp.path().join("dist"));

        let err = ScriptBundler.run(&config).unwrap_err();

        assert!(matches!(err, StageError::MissingInput(_)));
    }
}
