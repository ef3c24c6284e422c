//! Mapping from changed files to the work they trigger.

use std::path::Path;

use glob::{MatchOptions, Pattern, PatternError};
use kiln_pipeline::{PipelineConfig, StageKind};

use crate::watcher::WatchEvent;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// What to do when a watched file changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchAction {
    /// Re-run a pipeline stage
    Run(StageKind),

    /// Tell browsers to reload without rebuilding anything
    Reload,
}

#[derive(Debug)]
struct Route {
    pattern: Pattern,
    action: WatchAction,
    modify_only: bool,
}

/// Watch routes, matched against paths relative to the app directory.
#[derive(Debug)]
pub struct WatchRoutes {
    routes: Vec<Route>,
}

impl WatchRoutes {
    /// Routes for the dev loop:
    ///
    /// | pattern                         | action         |
    /// |---------------------------------|----------------|
    /// | `styles.watch`                  | styles         |
    /// | `<images.source>/**/*`          | images         |
    /// | each script entry               | scripts        |
    /// | `<components>/**/*`, `<pages>/**/*` | pages      |
    /// | `*.html` (modified only)        | reload         |
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PatternError> {
        let mut routes = Vec::new();
        let mut add = |pattern: &str, action: WatchAction, modify_only: bool| {
            Pattern::new(pattern).map(|pattern| {
                routes.push(Route {
                    pattern,
                    action,
                    modify_only,
                })
            })
        };

        add(&config.styles.watch, WatchAction::Run(StageKind::Styles), false)?;
        add(
            &tree(&config.images.source),
            WatchAction::Run(StageKind::Images),
            false,
        )?;
        for entry in &config.scripts.entries {
            add(
                &Pattern::escape(&slash_path(entry)),
                WatchAction::Run(StageKind::Scripts),
                false,
            )?;
        }
        for dir in &config.pages.components {
            add(&tree(dir), WatchAction::Run(StageKind::Pages), false)?;
        }
        add(
            &tree(&config.pages.source),
            WatchAction::Run(StageKind::Pages),
            false,
        )?;
        add("*.html", WatchAction::Reload, true)?;

        Ok(Self { routes })
    }

    /// Actions triggered by `event` on `relative`, in route order, without duplicates.
    pub fn route(&self, relative: &Path, event: &WatchEvent) -> Vec<WatchAction> {
        let path = slash_path(relative);
        let modified = matches!(event, WatchEvent::Modified(_));

        let mut actions = Vec::new();
        for route in &self.routes {
            if route.modify_only && !modified {
                continue;
            }
            if route.pattern.matches_with(&path, MATCH_OPTIONS) && !actions.contains(&route.action)
            {
                actions.push(route.action);
            }
        }
        actions
    }
}

/// Pattern matching every file below `dir`.
fn tree(dir: &Path) -> String {
    format!("{}/**/*", Pattern::escape(&slash_path(dir)))
}

fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
