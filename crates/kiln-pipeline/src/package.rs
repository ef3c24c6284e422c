//! Production packaging: copy allow-listed artifacts into the distribution
//! directory, preserving their paths relative to the app directory.

use std::fs;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::config::PipelineConfig;
use crate::stage::{Stage, StageError, StageKind, StageReport};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug)]
struct Rule {
    pattern: Pattern,
    allow: bool,
}

/// Ordered allow/deny globs. The last rule matching a path decides.
#[derive(Debug)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Parse rules; a leading `!` turns a rule into a deny rule.
    pub fn parse(rules: &[String]) -> Result<Self, StageError> {
        let rules = rules
            .iter()
            .map(|raw| {
                let (allow, glob) = match raw.strip_prefix('!') {
                    Some(rest) => (false, rest),
                    None => (true, raw.as_str()),
                };
                let pattern = Pattern::new(glob).map_err(|e| StageError::Rule {
                    rule: raw.clone(),
                    message: e.to_string(),
                })?;
                Ok(Rule { pattern, allow })
            })
            .collect::<Result<Vec<_>, StageError>>()?;

        Ok(Self { rules })
    }

    /// Whether `relative` (with `/` separators) is selected.
    pub fn matches(&self, relative: &str) -> bool {
        self.rules
            .iter()
            .rev()
            .find(|rule| rule.pattern.matches_with(relative, MATCH_OPTIONS))
            .is_some_and(|rule| rule.allow)
    }
}

/// Copies the selected artifacts from the app directory into the distribution directory.
pub struct Packager;

impl Stage for Packager {
    fn kind(&self) -> StageKind {
        StageKind::Package
    }

    fn run(&self, config: &PipelineConfig) -> Result<StageReport, StageError> {
        let app = config.app_dir();
        let dist = config.dist_dir();
        if !app.is_dir() {
            return Err(StageError::MissingInput(app.to_path_buf()));
        }

        let rules = RuleSet::parse(&config.package.rules)?;
        let selected = select(app, dist, &rules);

        let written = selected
            .par_iter()
            .map(|relative| {
                let from = app.join(relative);
                let to = dist.join(relative);
                if let Some(parent) = to.parent() {
                    fs::create_dir_all(parent).map_err(|source| StageError::Write {
                        path: parent.to_path_buf(),
                        source,
                    })?;
                }
                fs::copy(&from, &to).map_err(|source| StageError::Write {
                    path: to.clone(),
                    source,
                })?;
                Ok(to)
            })
            .collect::<Result<Vec<_>, StageError>>()?;

        let mut report = StageReport::new(StageKind::Package);
        report.written = written;
        Ok(report)
    }
}

/// Relative paths of files under `app` selected by `rules`, sorted.
///
/// The distribution directory is never walked, even when it lives inside `app`.
fn select(app: &Path, dist: &Path, rules: &RuleSet) -> Vec<PathBuf> {
    let mut selected: Vec<PathBuf> = WalkDir::new(app)
        .into_iter()
        .filter_entry(|entry| entry.path() != dist)
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.path().strip_prefix(app).ok().map(Path::to_path_buf))
        .filter(|relative| rules.matches(&slash_path(relative)))
        .collect();

    selected.sort();
    selected
}

fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
