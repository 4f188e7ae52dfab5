//! wsi-recolor - Whole-slide container color correction CLI
//!
//! Rewrites the JPEG tiles of an SVS/TIFF slide through the scanner's
//! embedded ICC profile, in place within the original byte layout.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};
use wsi_pipeline::StrategyKind;

mod commands;

#[derive(Parser)]
#[command(name = "wsi-recolor")]
#[command(author, version, about = "Whole-slide container color correction")]
#[command(long_about = "
Applies the scanner's embedded color profile to every tile of a whole-slide
container. The output keeps the input's byte layout: tiles are re-encoded
into the space they already occupy.

Examples:
  wsi-recolor info slide.svs                   # List directories and tile runs
  wsi-recolor recolor slide.svs                # Writes slide_recolored.svs
  wsi-recolor recolor slide.svs -q 80 -w 8
  wsi-recolor recolor slide.svs -s 3           # Recolor every 4th tile only
  wsi-recolor -v recolor slide.tif --annotate --log-file run.log
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Number of threads for the correction-table build (0 = auto)
    #[arg(short = 'j', long, global = true, default_value = "0")]
    threads: usize,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Recolor all tiles through the embedded profile
    #[command(visible_alias = "r")]
    Recolor(RecolorArgs),

    /// Display container structure
    #[command(visible_alias = "i")]
    Info(InfoArgs),
}

#[derive(Args)]
struct RecolorArgs {
    /// Input container (.svs, .tif, .tiff)
    input: PathBuf,

    /// Output path (default: <input stem>_recolored.<ext>)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Parallel tile workers
    #[arg(short, long, default_value = "4", value_parser = clap::value_parser!(u16).range(1..))]
    workers: u16,

    /// JPEG quality (0-100)
    #[arg(short, long, default_value = "87", value_parser = clap::value_parser!(u8).range(0..=100))]
    quality: u8,

    /// Tiles copied verbatim after each recolored tile
    #[arg(short, long, default_value = "0")]
    skip: usize,

    /// Tile codec strategy
    #[arg(long, value_enum, default_value = "auto")]
    strategy: StrategyArg,

    /// Re-encode shared-table tiles at --quality instead of the slide's own
    /// quantization (tiles grow by their tables)
    #[arg(long)]
    requantize: bool,

    /// Draw tile indices and corner markers (debugging)
    #[arg(long)]
    annotate: bool,

    /// Byte store chunk size in MiB
    #[arg(long, default_value = "64", value_parser = clap::value_parser!(u32).range(1..))]
    chunk_mb: u32,
}

#[derive(Args)]
struct InfoArgs {
    /// Input container(s)
    #[arg(required = true)]
    input: Vec<PathBuf>,

    /// List every tile run
    #[arg(short, long)]
    runs: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    /// Shared tables when the directory has JPEGTables
    Auto,
    /// Independent JPEG tiles
    SelfContained,
    /// Abbreviated tiles with shared JPEGTables
    SharedTables,
}

impl From<StrategyArg> for StrategyKind {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Auto => StrategyKind::Auto,
            StrategyArg::SelfContained => StrategyKind::SelfContained,
            StrategyArg::SharedTables => StrategyKind::SharedTables,
        }
    }
}

/// Installs the stderr subscriber and, if requested, a non-blocking file
/// layer. The returned guard must live until exit to flush the file.
fn init_logging(verbose: u8, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let stderr = fmt::layer().with_writer(std::io::stderr).with_target(verbose > 1);

    let Some(path) = log_file else {
        tracing_subscriber::registry().with(filter).with(stderr).init();
        return Ok(None);
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let name = path
        .file_name()
        .with_context(|| format!("Invalid log file path: {}", path.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .init();
    Ok(Some(guard))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging(cli.verbose, cli.log_file.as_deref())?;

    // Configure thread pool
    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .context("Failed to configure thread pool")?;
    }

    let result = match cli.command {
        Commands::Recolor(args) => commands::recolor::run(args).map(|_| ()),
        Commands::Info(args) => commands::info::run(args),
    };
    if let Err(err) = &result {
        tracing::error!("{:#}", err);
    }
    result
}
