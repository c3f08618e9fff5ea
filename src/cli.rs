use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Leaf analysis client: thermal recolor, detection overlay and health estimates.
#[derive(Parser, Debug)]
#[command(name = "leafscope", version, about)]
pub struct Cli {
    /// Settings file to use instead of the default location
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Detection backend base URL, overrides the settings file
    #[arg(long, global = true)]
    pub backend: Option<String>,

    /// Write the buffered log lines to debug.log before exiting
    #[arg(long, global = true)]
    pub export_logs: bool,

    /// Log debug output even in release builds
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload an image to the backend and write the annotated thermal visualization
    Analyze(AnalyzeArgs),

    /// Render a visualization from a saved /detect response without contacting the backend
    Render(RenderArgs),

    /// Check whether the backend is reachable and healthy
    Health,

    /// Manage the settings file
    #[command(subcommand)]
    Settings(SettingsCommand),

    /// Print detailed build information
    Version,
}

#[derive(Args, Debug, Clone)]
pub struct OutputArgs {
    /// Output PNG path (default: <image stem><output_suffix>.png next to the input)
    #[arg(long, short)]
    pub out: Option<PathBuf>,

    /// Also write a JSON report of detections and metrics
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Seed for the metric jitter, for reproducible numbers
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// Leaf image to analyze
    pub image: PathBuf,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args, Debug, Clone)]
pub struct RenderArgs {
    /// Leaf image the detections belong to
    pub image: PathBuf,

    /// JSON file holding a /detect response body
    #[arg(long)]
    pub detections: PathBuf,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommand {
    /// Write a commented settings file with the defaults
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective settings
    Show,
    /// Print the settings file location
    Path,
}
