//! # MayMay CLI
//!
//! Command-line front end for the MayMay compositor.
//!
//! ## Usage
//!
//! ```bash
//! maymay templates --query drake
//! maymay compose --template-id 3 --top "one does not simply" --bottom "write a meme in rust"
//! maymay compose --base ./cat.png --text "hi" --overlay ./hat.png --out-dir ./out
//! ```
//!
//! ## Architecture
//!
//! - `CliArgs` - Command-line arguments parsed with clap
//! - `CliConfig` - Resolved configuration (catalogue URL, output directory, fonts)
//! - [`templates::TemplateClient`] - Catalogue client with placeholder fallback
//! - [`compose`] - Scene building and the resolve/render/export pipeline

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]

pub mod compose;
pub mod templates;

pub use compose::{ComposeError, BASE_IMAGE_HINT};
pub use templates::{TemplateClient, TemplateError, DEFAULT_API_URL};

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use maymay_renderer::CompositorConfig;

/// Command-line arguments for maymay.
#[derive(Debug, Clone, Parser)]
#[command(name = "maymay")]
#[command(about = "Compose memes from templates, captions and overlays")]
#[command(version)]
pub struct CliArgs {
    /// Template catalogue base URL
    #[arg(long, env = "MAYMAY_API_URL", default_value = DEFAULT_API_URL, global = true)]
    pub api_url: String,

    /// Directory exports are written to
    #[arg(long, env = "MAYMAY_OUT_DIR", default_value = ".", global = true)]
    pub out_dir: PathBuf,

    /// Extra directory to load caption fonts from (repeatable)
    #[arg(long = "font-dir", global = true)]
    pub font_dirs: Vec<PathBuf>,

    /// Do not load the fonts installed on this machine
    #[arg(long, global = true)]
    pub no_system_fonts: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "MAYMAY_LOG_JSON", global = true)]
    pub log_json: bool,

    /// What to do.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List templates from the catalogue (placeholders when it is unreachable)
    Templates {
        /// Case-insensitive name filter
        #[arg(long, short, default_value = "")]
        query: String,
    },
    /// Build a meme and export it as PNG
    Compose(ComposeArgs),
}

/// Arguments of the `compose` subcommand.
#[derive(Debug, Clone, Default, Args)]
pub struct ComposeArgs {
    /// Scene JSON file to start from
    #[arg(long, conflicts_with_all = ["base", "template_id"])]
    pub scene: Option<PathBuf>,

    /// Base image URL, data URI or path
    #[arg(long, conflicts_with = "template_id")]
    pub base: Option<String>,

    /// Catalogue template to use as base
    #[arg(long)]
    pub template_id: Option<i64>,

    /// Top caption
    #[arg(long)]
    pub top: Option<String>,

    /// Bottom caption
    #[arg(long)]
    pub bottom: Option<String>,

    /// Additional caption (repeatable)
    #[arg(long = "text")]
    pub texts: Vec<String>,

    /// Image file to overlay (repeatable)
    #[arg(long = "overlay")]
    pub overlays: Vec<PathBuf>,
}

/// Resolved configuration.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Template catalogue base URL.
    pub api_url: String,
    /// Directory exports are written to.
    pub out_dir: PathBuf,
    /// Compositor settings.
    pub compositor: CompositorConfig,
    /// Whether logs are written as JSON.
    pub log_json: bool,
    /// Command to run.
    pub command: Command,
}

impl From<CliArgs> for CliConfig {
    fn from(args: CliArgs) -> Self {
        Self {
            api_url: args.api_url,
            out_dir: args.out_dir,
            compositor: CompositorConfig {
                load_system_fonts: !args.no_system_fonts,
                font_dirs: args.font_dirs,
                ..CompositorConfig::default()
            },
            log_json: args.log_json,
            command: args.command,
        }
    }
}
