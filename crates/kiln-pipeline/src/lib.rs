//! Asset build stages for kiln.
//!
//! Every stage reads a fixed set of sources under the app directory and writes
//! its artifacts back into it. The production build then copies an allow-listed
//! subset of those artifacts into the distribution directory.

pub mod clean;
pub mod config;
pub mod fonts;
pub mod freshness;
pub mod images;
pub mod package;
pub mod pages;
pub mod scripts;
pub mod sprite;
pub mod stage;
pub mod styles;
pub mod svg;
pub mod templates;

pub use config::{ConfigError, PipelineConfig};
pub use stage::{
    NoReload, Pipeline, Reload, ReloadSink, Stage, StageError, StageKind, StageRegistry,
    StageReport,
};
