//! Kiln CLI - front-end asset pipeline.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use kiln_pipeline::StageKind;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Front-end asset pipeline: Sass, scripts, images, fonts, pages and sprites")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to kiln.toml config file
    #[arg(short, long, default_value = "kiln.toml", global = true)]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile Sass into the prefixed, minified stylesheet
    Styles,

    /// Concatenate and minify scripts
    Scripts,

    /// Convert images to AVIF and WebP and recompress originals
    Images,

    /// Convert fonts to WOFF, TTF and WOFF2
    Fonts,

    /// Assemble pages from components
    Pages,

    /// Stack SVG icons into a sprite sheet
    Sprite,

    /// Copy allow-listed artifacts into the distribution directory
    Package,

    /// Empty the distribution directory
    Clean,

    /// Serve the app directory and rebuild on change
    Watch {
        /// Port to listen on (defaults to config or 3000)
        #[arg(short, long)]
        port: Option<u16>,

        /// Do not open browser
        #[arg(long)]
        no_open: bool,
    },

    /// Build styles, images, scripts and pages, then watch (default)
    Dev {
        /// Port to listen on (defaults to config or 3000)
        #[arg(short, long)]
        port: Option<u16>,

        /// Do not open browser
        #[arg(long)]
        no_open: bool,
    },

    /// Clean, then package for production
    Build,

    /// Scaffold kiln.toml and the source layout
    Init {
        /// Overwrite existing files
        #[arg(short, long)]
        yes: bool,
    },

    /// Preview the distribution directory
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "4000")]
        port: u16,

        /// Directory to serve (defaults to the configured dist directory)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    let command = cli.command.unwrap_or(Commands::Dev {
        port: None,
        no_open: false,
    });

    match command {
        Commands::Init { yes } => {
            commands::init::run(&cli.config, yes).await?;
        }
        Commands::Styles => commands::task::run(&cli.config, StageKind::Styles).await?,
        Commands::Scripts => commands::task::run(&cli.config, StageKind::Scripts).await?,
        Commands::Images => commands::task::run(&cli.config, StageKind::Images).await?,
        Commands::Fonts => commands::task::run(&cli.config, StageKind::Fonts).await?,
        Commands::Pages => commands::task::run(&cli.config, StageKind::Pages).await?,
        Commands::Sprite => commands::task::run(&cli.config, StageKind::Sprite).await?,
        Commands::Package => commands::task::run(&cli.config, StageKind::Package).await?,
        Commands::Clean => commands::task::run(&cli.config, StageKind::Clean).await?,
        Commands::Watch { port, no_open } => {
            commands::dev::watch(&cli.config, port, !no_open).await?;
        }
        Commands::Dev { port, no_open } => {
            commands::dev::run(&cli.config, port, !no_open).await?;
        }
        Commands::Build => {
            commands::build::run(&cli.config).await?;
        }
        Commands::Serve { port, dir } => {
            commands::serve::run(&cli.config, port, dir).await?;
        }
    }

    Ok(())
}
