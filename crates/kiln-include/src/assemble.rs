//! Recursive page assembly.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::directive::{scan, DirectiveKind};

/// Errors that can occur while assembling a page.
#[derive(Debug, thiserror::Error)]
pub enum IncludeError {
    #[error("Include not found: {target} (referenced from {}:{line})", from.display())]
    NotFound {
        target: String,
        from: PathBuf,
        line: usize,
    },

    #[error("Include cycle through {}", .0.display())]
    Cycle(PathBuf),

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid include pattern {pattern}: {message}")]
    Pattern { pattern: String, message: String },
}

/// Per-page bookkeeping.
#[derive(Default)]
struct Session {
    /// Files currently being expanded, outermost first
    stack: Vec<PathBuf>,

    /// Every file spliced so far
    included: HashSet<PathBuf>,
}

/// Splices include targets into page templates.
#[derive(Debug, Clone, Default)]
pub struct Assembler {
    include_paths: Vec<PathBuf>,
}

impl Assembler {
    /// Create an assembler that falls back to `include_paths`, in order, when
    /// a target is not found next to the including file.
    pub fn new(include_paths: Vec<PathBuf>) -> Self {
        Self { include_paths }
    }

    /// Assemble the page at `path`.
    pub fn assemble_file(&self, path: &Path) -> Result<String, IncludeError> {
        let source = fs::read_to_string(path).map_err(|source| IncludeError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut session = Session::default();
        session.stack.push(canonical(path));

        self.expand(&source, path, &mut session)
    }

    /// Assemble an in-memory template as if it lived at `origin`.
    pub fn assemble_str(&self, source: &str, origin: &Path) -> Result<String, IncludeError> {
        self.expand(source, origin, &mut Session::default())
    }

    fn expand(
        &self,
        source: &str,
        origin: &Path,
        session: &mut Session,
    ) -> Result<String, IncludeError> {
        let directives = scan(source);
        if directives.is_empty() {
            return Ok(source.to_string());
        }

        let base_dir = origin.parent().unwrap_or(Path::new("."));
        let mut out = String::with_capacity(source.len());
        let mut cursor = 0;

        for directive in directives {
            out.push_str(&source[cursor..directive.span.start]);
            cursor = directive.span.end;

            let files = self.resolve(&directive.target, base_dir)?;
            if files.is_empty() {
                return Err(IncludeError::NotFound {
                    target: directive.target,
                    from: origin.to_path_buf(),
                    line: directive.line,
                });
            }

            let mut parts = Vec::with_capacity(files.len());
            for file in files {
                let key = canonical(&file);
                if directive.kind == DirectiveKind::Require && session.included.contains(&key) {
                    continue;
                }
                if session.stack.contains(&key) {
                    return Err(IncludeError::Cycle(file));
                }

                let text = fs::read_to_string(&file).map_err(|source| IncludeError::Read {
                    path: file.clone(),
                    source,
                })?;

                session.stack.push(key.clone());
                session.included.insert(key);
                let expanded = self.expand(&text, &file, session)?;
                session.stack.pop();

                parts.push(expanded);
            }

            out.push_str(&indent_block(&parts.join("\n"), &directive.indent));
        }

        out.push_str(&source[cursor..]);
        Ok(out)
    }

    /// Resolve a target against `base_dir`, then each include path.
    ///
    /// The first directory yielding a match wins. An empty result means the
    /// target was not found anywhere.
    fn resolve(&self, target: &str, base_dir: &Path) -> Result<Vec<PathBuf>, IncludeError> {
        let dirs = std::iter::once(base_dir).chain(self.include_paths.iter().map(PathBuf::as_path));

        if !is_glob(target) {
            return Ok(dirs
                .map(|dir| dir.join(target))
                .find(|candidate| candidate.is_file())
                .into_iter()
                .collect());
        }

        for dir in dirs {
            let literal_dir = glob::Pattern::escape(&dir.to_string_lossy());
            let pattern = Path::new(&literal_dir)
                .join(target)
                .to_string_lossy()
                .into_owned();
            let entries = glob::glob(&pattern).map_err(|e| IncludeError::Pattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;

            let mut matches: Vec<PathBuf> = entries
                .filter_map(Result::ok)
                .filter(|p| p.is_file())
                .collect();
            if !matches.is_empty() {
                matches.sort();
                return Ok(matches);
            }
        }

        Ok(Vec::new())
    }
}

fn is_glob(target: &str) -> bool {
    target.contains(['*', '?', '['])
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Drop one trailing newline and indent every line after the first.
fn indent_block(content: &str, indent: &str) -> String {
    let content = content
        .strip_suffix("\r\n")
        .or_else(|| content.strip_suffix('\n'))
        .unwrap_or(content);

    if content.is_empty() {
        return String::new();
    }

    let mut out = String::with_capacity(content.len() + indent.len());
    out.push_str(indent);
    out.push_str(&content.replace('\n', &format!("\n{indent}")));
    out
}
