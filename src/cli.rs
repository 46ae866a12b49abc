//! Command-line interface definitions using clap.

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use parmin::config::{MinifyOptions, Toggle};
use parmin::logging::LogFormat;
use std::path::PathBuf;

/// Minify JavaScript files in parallel across a pool of worker processes.
#[derive(Parser, Debug)]
#[command(name = "parmin")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Enable verbose output (-v for info, -vv for debug).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors.
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    pub quiet: bool,

    /// Disable colored output.
    #[arg(long, env = "NO_COLOR", global = true)]
    pub no_color: bool,

    /// Log format: pretty, compact or json.
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,

    /// Also write logs to this file.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Run as a worker subprocess (internal use).
    #[arg(long = "internal-worker", hide = true)]
    pub internal_worker: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Minify JavaScript files.
    Minify(MinifyArgs),

    /// Generate shell completions.
    Completions(CompletionsArgs),
}

/// Arguments for the minify command.
#[derive(Parser, Debug)]
pub struct MinifyArgs {
    /// Input files. Each becomes one asset named after its file name.
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Directory the minified files are written to.
    #[arg(short, long, default_value = "dist")]
    pub out_dir: PathBuf,

    /// JSON options file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Maximum number of worker processes.
    #[arg(short = 'j', long, env = "PARMIN_WORKERS")]
    pub workers: Option<usize>,

    /// Do not read or write source maps.
    #[arg(long)]
    pub no_source_map: bool,

    /// Skip the compression pass.
    #[arg(long)]
    pub no_compress: bool,

    /// Keep local identifiers as written.
    #[arg(long)]
    pub no_mangle: bool,

    /// Pretty-print the output.
    #[arg(long)]
    pub beautify: bool,

    /// Base directory for the file names shown in warnings.
    #[arg(long)]
    pub context: Option<PathBuf>,

    /// Minify the inputs this many times with the same coordinator.
    #[arg(long, default_value_t = 1, hide = true)]
    pub watch_rounds: usize,
}

impl MinifyArgs {
    /// Layer the command-line flags over options loaded from a file.
    pub fn apply(&self, options: &mut MinifyOptions) {
        if let Some(workers) = self.workers {
            options.workers = workers;
        }
        if self.no_source_map {
            options.transform.source_map = false;
        }
        if self.no_compress {
            options.transform.compress = Toggle::Enabled(false);
        }
        if self.no_mangle {
            options.transform.mangle = Toggle::Enabled(false);
        }
        if self.beautify {
            options.transform.beautify = true;
        }
    }
}

/// Arguments for shell completions.
#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for.
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    pub fn generate(&self) {
        clap_complete::generate(
            self.shell,
            &mut Cli::command(),
            "parmin",
            &mut std::io::stdout(),
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Quiet,
    Normal,
    Info,
    Debug,
}

impl From<u8> for Verbosity {
    fn from(count: u8) -> Self {
        match count {
            0 => Verbosity::Normal,
            1 => Verbosity::Info,
            _ => Verbosity::Debug,
        }
    }
}

impl Cli {
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            Verbosity::from(self.verbose)
        }
    }
}
