//! Stage trait, registry and the pipeline runner.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;

use kiln_include::IncludeError;

use crate::clean::Cleaner;
use crate::config::PipelineConfig;
use crate::fonts::{FontConverter, FontError};
use crate::images::ImagePipeline;
use crate::package::Packager;
use crate::pages::PageAssembler;
use crate::scripts::ScriptBundler;
use crate::sprite::SpriteBuilder;
use crate::styles::StyleBundler;

/// Identifies a pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Styles,
    Scripts,
    Images,
    Fonts,
    Pages,
    Sprite,
    Clean,
    Package,
}

impl StageKind {
    pub const ALL: [StageKind; 8] = [
        Self::Styles,
        Self::Scripts,
        Self::Images,
        Self::Fonts,
        Self::Pages,
        Self::Sprite,
        Self::Clean,
        Self::Package,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Styles => "styles",
            Self::Scripts => "scripts",
            Self::Images => "images",
            Self::Fonts => "fonts",
            Self::Pages => "pages",
            Self::Sprite => "sprite",
            Self::Clean => "clean",
            Self::Package => "package",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StageKind {
    type Err = StageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| StageError::UnknownStage(s.to_string()))
    }
}

/// What a connected browser should do after a stage completes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Reload {
    #[default]
    None,

    /// Reload the whole page
    Page,

    /// Swap the stylesheet served at this URL path
    Stylesheet(String),
}

/// Receives reload notifications from completed stages.
pub trait ReloadSink: Send + Sync {
    fn notify(&self, reload: &Reload);
}

/// Sink for one-shot runs with no browser attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReload;

impl ReloadSink for NoReload {
    fn notify(&self, _reload: &Reload) {}
}

/// Outcome of a single stage run.
#[derive(Debug, Clone)]
pub struct StageReport {
    pub stage: StageKind,

    /// Files written by this run
    pub written: Vec<PathBuf>,

    /// Inputs skipped as already up to date
    pub skipped: usize,

    pub reload: Reload,

    pub duration_ms: u64,
}

impl StageReport {
    pub fn new(stage: StageKind) -> Self {
        Self {
            stage,
            written: Vec::new(),
            skipped: 0,
            reload: Reload::None,
            duration_ms: 0,
        }
    }

    pub fn with_reload(mut self, reload: Reload) -> Self {
        self.reload = reload;
        self
    }
}

/// Errors that can occur while running a stage.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("Unknown stage: {0}")]
    UnknownStage(String),

    #[error("No stage registered for {0}")]
    NotRegistered(StageKind),

    #[error("Missing input: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Style error in {}: {message}", path.display())]
    Style { path: PathBuf, message: String },

    #[error("Script error: {0}")]
    Script(String),

    #[error("Image conversion failed for {}: {message}", path.display())]
    Image { path: PathBuf, message: String },

    #[error("Font conversion failed for {}: {source}", path.display())]
    Font {
        path: PathBuf,
        #[source]
        source: FontError,
    },

    #[error("SVG error in {}: {message}", path.display())]
    Svg { path: PathBuf, message: String },

    #[error(transparent)]
    Include(#[from] IncludeError),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Failed to clean {}: {source}", path.display())]
    Clean {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid package rule {rule}: {message}")]
    Rule { rule: String, message: String },
}

/// A single build stage.
pub trait Stage: Send + Sync {
    fn kind(&self) -> StageKind;

    /// Run the stage once against `config`.
    fn run(&self, config: &PipelineConfig) -> Result<StageReport, StageError>;
}

/// Stages by kind.
pub struct StageRegistry {
    stages: HashMap<StageKind, Box<dyn Stage>>,
}

impl StageRegistry {
    /// An empty registry.
    pub fn empty() -> Self {
        Self {
            stages: HashMap::new(),
        }
    }

    /// Register a stage, replacing any stage of the same kind.
    pub fn register(&mut self, stage: Box<dyn Stage>) {
        self.stages.insert(stage.kind(), stage);
    }

    pub fn get(&self, kind: StageKind) -> Option<&dyn Stage> {
        self.stages.get(&kind).map(|s| s.as_ref())
    }
}

impl Default for StageRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(StyleBundler));
        registry.register(Box::new(ScriptBundler));
        registry.register(Box::new(ImagePipeline));
        registry.register(Box::new(FontConverter));
        registry.register(Box::new(PageAssembler));
        registry.register(Box::new(SpriteBuilder));
        registry.register(Box::new(Cleaner));
        registry.register(Box::new(Packager));
        registry
    }
}

/// Configuration plus the stages that act on it.
pub struct Pipeline {
    config: PipelineConfig,
    registry: StageRegistry,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_registry(config, StageRegistry::default())
    }

    pub fn with_registry(config: PipelineConfig, registry: StageRegistry) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run one stage and forward its reload hint to `sink`.
    pub fn run(&self, kind: StageKind, sink: &dyn ReloadSink) -> Result<StageReport, StageError> {
        let stage = self
            .registry
            .get(kind)
            .ok_or(StageError::NotRegistered(kind))?;

        let start = Instant::now();
        tracing::debug!("Starting {}", kind);

        let mut report = stage.run(&self.config)?;
        report.duration_ms = start.elapsed().as_millis() as u64;

        tracing::info!(
            "{}: wrote {} files, skipped {} in {}ms",
            kind,
            report.written.len(),
            report.skipped,
            report.duration_ms
        );

        sink.notify(&report.reload);
        Ok(report)
    }

    /// Production build: empty the distribution directory, then package.
    ///
    /// A cleaning failure aborts before anything is copied.
    pub fn build(&self) -> Result<Vec<StageReport>, StageError> {
        let cleaned = self.run(StageKind::Clean, &NoReload)?;
        let packaged = self.run(StageKind::Package, &NoReload)?;
        Ok(vec![cleaned, packaged])
    }
}

pub(crate) fn read_input(path: &Path) -> Result<Vec<u8>, StageError> {
    fs::read(path).map_err(|source| StageError::Read {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn read_text(path: &Path) -> Result<String, StageError> {
    fs::read_to_string(path).map_err(|source| StageError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Write `bytes` to `path`, creating parent directories.
pub(crate) fn write_output(path: &Path, bytes: impl AsRef<[u8]>) -> Result<(), StageError> {
    let wrap = |source| StageError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(wrap)?;
    }
    fs::write(path, bytes).map_err(wrap)
}

/// Files directly inside `dir` (no recursion), sorted by path.
///
/// A missing directory yields an empty list.
pub(crate) fn list_files(dir: &Path) -> Result<Vec<PathBuf>, StageError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let entries = fs::read_dir(dir).map_err(|source| StageError::Read {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    Ok(files)
}

/// Lowercased file extension, empty when absent.
pub(crate) fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use tempfile::tempdir;
    use walkdir::WalkDir;

    struct Recorder(Mutex<Vec<Reload>>);

    impl ReloadSink for Recorder {
        fn notify(&self, reload: &Reload) {
            self.0.lock().unwrap().push(reload.clone());
        }
    }

    struct FakeStage;

    impl Stage for FakeStage {
        fn kind(&self) -> StageKind {
            StageKind::Pages
        }

        fn run(&self, _config: &PipelineConfig) -> Result<StageReport, StageError> {
            Ok(StageReport::new(StageKind::Pages).with_reload(Reload::Page))
        }
    }

    #[test]
    fn parses_stage_names() {
        assert_eq!("sprite".parse::<StageKind>().unwrap(), StageKind::Sprite);
        assert!("sass".parse::<StageKind>().is_err());
    }

    #[test]
    fn forwards_reload_hint_to_sink() {
        let mut registry = StageRegistry::empty();
        registry.register(Box::new(FakeStage));
        let pipeline = Pipeline::with_registry(PipelineConfig::default(), registry);
        let sink = Recorder(Mutex::new(Vec::new()));

        pipeline.run(StageKind::Pages, &sink).unwrap();

        assert_eq!(*sink.0.lock().unwrap(), vec![Reload::Page]);
    }

    #[test]
    fn unregistered_stage_is_an_error() {
        let pipeline = Pipeline::with_registry(PipelineConfig::default(), StageRegistry::empty());

        let err = pipeline.run(StageKind::Fonts, &NoReload).unwrap_err();

        assert!(matches!(err, StageError::NotRegistered(StageKind::Fonts)));
    }

    #[test]
    fn default_registry_covers_every_stage() {
        let registry = StageRegistry::default();

        for kind in StageKind::ALL {
            assert_eq!(registry.get(kind).map(|s| s.kind()), Some(kind));
        }
    }

    fn populated_app(root: &Path) -> PipelineConfig {
        let config = PipelineConfig::with_dirs(root.join("app"), root.join("dist"));
        for file in [
            "css/style.min.css",
            "scss/style.scss",
            "js/main.min.js",
            "images/hero.avif",
            "images/src/hero.png",
            "index.html",
        ] {
            let path = config.in_app(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, file).unwrap();
        }
        config
    }

    fn dist_files(dist: &Path) -> Vec<String> {
        let mut files: Vec<String> = WalkDir::new(dist)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                e.path()
                    .strip_prefix(dist)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        files.sort();
        files
    }

    #[test]
    fn build_into_missing_dist() {
        let temp = tempdir().unwrap();
        let config = populated_app(temp.path());
        let dist = config.dist_dir().to_path_buf();

        let reports = Pipeline::new(config).build().unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(
            dist_files(&dist),
            vec![
                "css/style.min.css",
                "images/hero.avif",
                "index.html",
                "js/main.min.js",
            ]
        );
    }

    #[test]
    fn build_replaces_stale_dist() {
        let temp = tempdir().unwrap();
        let config = populated_app(temp.path());
        let dist = config.dist_dir().to_path_buf();
        fs::create_dir_all(dist.join("old")).unwrap();
        fs::write(dist.join("old/removed.html"), "stale").unwrap();
        fs::write(dist.join("index.html"), "stale").unwrap();

        Pipeline::new(config).build().unwrap();

        assert_eq!(
            dist_files(&dist),
            vec![
                "css/style.min.css",
                "images/hero.avif",
                "index.html",
                "js/main.min.js",
            ]
        );
        assert_eq!(fs::read_to_string(dist.join("index.html")).unwrap(), "index.html");
    }

    #[test]
    fn clean_failure_stops_before_packaging() {
        let temp = tempdir().unwrap();
        let config = populated_app(temp.path());
        fs::write(config.dist_dir(), "not a directory").unwrap();

        let err = Pipeline::new(config.clone()).build().unwrap_err();

        assert!(matches!(err, StageError::Clean { .. }));
        assert_eq!(
            fs::read_to_string(config.dist_dir()).unwrap(),
            "not a directory"
        );
    }
}
