//! parmin - parallel JavaScript minifier

mod cli;
mod theme;

use anyhow::{Context, Result, bail};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::{OwoColorize, Stream::Stderr};
use std::cell::Cell;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;
use tracing::Level;

use cli::{Cli, Commands, MinifyArgs, Verbosity};
use parmin::config::MinifyOptions;
use parmin::coordinator::Coordinator;
use parmin::host::{Asset, Compilation, RequestShortener};
use parmin::logging::{self, LogConfig, Role};
use parmin::worker::{ProcessSpawner, run_worker_main};
use theme::Themed;

/// Chunk every input file is registered under.
const CHUNK_NAME: &str = "main";

fn main() {
    let cli = Cli::parse();

    if cli.internal_worker {
        // never returns
        run_worker_main();
    }

    if cli.no_color {
        theme::disable_colors();
    }

    init_logging(&cli);

    let result = match &cli.command {
        Some(Commands::Minify(args)) => cmd_minify(&cli, args),
        Some(Commands::Completions(args)) => {
            args.generate();
            Ok(())
        }
        None => Ok(()),
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "error".error_label(), e);
        for cause in e.chain().skip(1) {
            eprintln!(
                "  {}: {}",
                "caused by".if_supports_color(Stderr, |text| text.yellow()),
                cause
            );
        }
        std::process::exit(1);
    }
}

/// Level requested on the command line, if any.
fn log_level(cli: &Cli) -> Option<Level> {
    match cli.verbosity() {
        Verbosity::Quiet => Some(Level::ERROR),
        Verbosity::Normal => None,
        Verbosity::Info => Some(Level::INFO),
        Verbosity::Debug => Some(Level::DEBUG),
    }
}

fn init_logging(cli: &Cli) {
    let mut config = LogConfig::new(Role::Coordinator);
    if let Some(level) = log_level(cli) {
        config = config.with_level(level);
    }
    if let Some(format) = cli.log_format {
        config = config.with_format(format);
    }
    if let Some(path) = &cli.log_file {
        config = config.with_file(path.clone());
    }
    if cli.no_color {
        config = config.with_ansi(false);
    }
    logging::init(config.with_env_overrides());
}

/// Minify the input files, writing each result into the output directory.
fn cmd_minify(cli: &Cli, args: &MinifyArgs) -> Result<()> {
    let mut options = match &args.config {
        Some(path) => MinifyOptions::load(path)
            .with_context(|| format!("failed to load options from {}", path.display()))?,
        None => MinifyOptions::default(),
    };
    args.apply(&mut options);
    options.validate()?;
    let source_maps = options.source_map();

    let context = match &args.context {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("failed to read the working directory")?,
    };
    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("failed to create {}", args.out_dir.display()))?;

    let mut spawner = ProcessSpawner::current_exe()?;
    // workers pick these up through their own environment overrides
    if let Some(format) = cli.log_format {
        spawner = spawner.env("PARMIN_LOG_FORMAT", format.to_string());
    }
    if let Some(level) = log_level(cli) {
        spawner = spawner.env("PARMIN_LOG_LEVEL", level.to_string());
    }
    let mut coordinator = Coordinator::new(options, spawner, RequestShortener::new(context));

    for round in 1..=args.watch_rounds.max(1) {
        let mut compilation = load_inputs(&args.inputs, source_maps)?;

        let finished = Rc::new(Cell::new(false));
        let done = {
            let finished = Rc::clone(&finished);
            Box::new(move |_: &mut Compilation| finished.set(true))
        };
        coordinator.optimize_chunk_assets(&mut compilation, done)?;

        let total = coordinator.outstanding();
        let progress = progress_bar(total, cli.quiet);
        while !finished.get() {
            coordinator.poll(&mut compilation, Duration::from_millis(100));
            progress.set_position(total.saturating_sub(coordinator.outstanding()) as u64);
        }
        progress.finish_and_clear();

        if !cli.quiet {
            for warning in &compilation.warnings {
                eprintln!("{}: {}", "warning".warning_label(), warning);
            }
        }
        for error in &compilation.errors {
            eprintln!("{}: {}", "error".error_label(), error);
        }
        if compilation.has_errors() {
            bail!(
                "minification failed with {} error(s)",
                compilation.errors.len()
            );
        }

        let written = write_outputs(&compilation, &args.out_dir, source_maps)?;

        if !cli.quiet {
            let stats = coordinator.last_stats().unwrap_or_default();
            let summary = format!("Minified {} file(s) into {}", written, args.out_dir.display());
            let details = format!(
                "({} dispatched, {} cached)",
                stats.dispatched, stats.cache_hits
            );
            if args.watch_rounds > 1 {
                eprintln!("[{}] {} {}", round, summary.success(), details.muted());
            } else {
                eprintln!("{} {}", summary.success(), details.muted());
            }
        }
    }

    Ok(())
}

/// Read every input into a fresh compilation, one asset per file.
///
/// A sibling `<input>.map` is attached as the input source map when maps
/// are enabled.
fn load_inputs(inputs: &[PathBuf], source_maps: bool) -> Result<Compilation> {
    let mut compilation = Compilation::new();
    let mut names = HashSet::new();

    for input in inputs {
        let name = input
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("invalid input path: {}", input.display()))?
            .to_string();
        if !names.insert(name.clone()) {
            bail!("two inputs share the file name {}", name);
        }

        let source = fs::read_to_string(input)
            .with_context(|| format!("failed to read {}", input.display()))?;
        let map_path = map_path_for(input);
        let asset = if source_maps && map_path.is_file() {
            let map = fs::read_to_string(&map_path)
                .with_context(|| format!("failed to read {}", map_path.display()))?;
            Asset::with_map(source, map)
        } else {
            Asset::raw(source)
        };
        compilation.emit(CHUNK_NAME, name, asset);
    }

    Ok(compilation)
}

/// Write the compilation's assets, with `.map` files next to them.
fn write_outputs(compilation: &Compilation, out_dir: &Path, source_maps: bool) -> Result<usize> {
    for (name, asset) in &compilation.assets {
        let path = out_dir.join(name);
        let mut source = asset.source.clone();
        if source_maps && let Some(map) = &asset.map {
            let map_name = format!("{}.map", name);
            fs::write(out_dir.join(&map_name), map)
                .with_context(|| format!("failed to write {}", map_name))?;
            source.push_str(&format!("\n//# sourceMappingURL={}\n", map_name));
        }
        fs::write(&path, source).with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(compilation.assets.len())
}

fn map_path_for(input: &Path) -> PathBuf {
    let mut path = input.as_os_str().to_owned();
    path.push(".map");
    PathBuf::from(path)
}

fn progress_bar(total: usize, quiet: bool) -> ProgressBar {
    if quiet || total == 0 {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("  [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
    {
        pb.set_style(style.progress_chars("█▓▒░  "));
    }
    pb.set_message("minifying");
    pb
}
