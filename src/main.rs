//! tunescan - incremental music library scanner.
//!
//! Usage:
//!   tunescan scan [ROOTS]...   Scan roots into the library
//!   tunescan stats             Show library statistics
//!   tunescan forget            Forget saved directory mtimes
//!   tunescan --help            Show help

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, bail};
use humansize::{DECIMAL, format_size};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use tunescan_core::{RetryPolicy, ScanConfig, ScanSummary, SourceId};
use tunescan_scan::{ScanCoordinator, ScanEvent};
use tunescan_store::JsonLibraryStore;

#[derive(Parser)]
#[command(
    name = "tunescan",
    version,
    about = "Incremental music library scanner",
    long_about = "tunescan keeps a music library in sync with the files on disk.\n\n\
                  Only directories whose modification time changed since the \
                  previous scan are read again."
)]
struct Cli {
    /// Settings file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Library file (defaults to the user data directory)
    #[arg(short, long, global = true)]
    library: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan directories into the library
    Scan(ScanArgs),

    /// Show library statistics
    Stats {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Forget saved directory mtimes so the next scan reads everything
    Forget,
}

#[derive(Args)]
struct ScanArgs {
    /// Directories to scan (defaults to the roots in the settings file)
    roots: Vec<PathBuf>,

    /// Records per committed batch (0 = commit once at the end)
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Treat every directory below the roots as recursive
    #[arg(short, long)]
    recursive: bool,

    /// Compute BLAKE3 content hashes
    #[arg(long)]
    hash: bool,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Settings read from `config.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Settings {
    library: Option<PathBuf>,
    roots: Vec<PathBuf>,
    batch_size: Option<usize>,
    recursive: bool,
    compute_hashes: bool,
    include_hidden: bool,
    extensions: Option<BTreeSet<String>>,
    ignore_patterns: Vec<String>,
    retry: Option<RetryPolicy>,
}

impl Settings {
    /// Get the default settings file path.
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("tunescan").join("config.toml"))
    }

    /// Load settings from `explicit`, or from the default path if it exists.
    fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match Self::config_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Cannot read settings {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid settings {}", path.display()))
    }

    fn library_path(&self, cli: Option<PathBuf>) -> PathBuf {
        cli.or_else(|| self.library.clone())
            .or_else(|| dirs::data_dir().map(|d| d.join("tunescan").join("library.json")))
            .unwrap_or_else(|| PathBuf::from("library.json"))
    }

    /// Build the scan configuration, command-line flags taking precedence.
    fn scan_config(&self, args: &ScanArgs) -> Result<ScanConfig> {
        let roots = if args.roots.is_empty() {
            self.roots.clone()
        } else {
            args.roots.clone()
        };
        if roots.is_empty() {
            bail!("No directories to scan; pass them as arguments or set `roots` in the settings file");
        }

        let mut builder = ScanConfig::builder();
        builder
            .roots(roots)
            .batch_size(args.batch_size.or(self.batch_size).unwrap_or(0))
            .recursive(args.recursive || self.recursive)
            .compute_hashes(args.hash || self.compute_hashes)
            .include_hidden(self.include_hidden)
            .ignore_patterns(self.ignore_patterns.clone());
        if let Some(extensions) = &self.extensions {
            builder.extensions(extensions.clone());
        }
        if let Some(retry) = self.retry {
            builder.retry(retry);
        }

        builder.build().context("Invalid scan configuration")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = Settings::load(cli.config.as_deref())?;
    let library = settings.library_path(cli.library);

    match cli.command {
        Command::Scan(args) => run_scan(&settings, &library, &args).await?,
        Command::Stats { format } => run_stats(&library, format).await?,
        Command::Forget => run_forget(&library).await?,
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "tunescan=info",
        1 => "tunescan=debug",
        _ => "tunescan=trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn open_library(path: &Path) -> Result<Arc<JsonLibraryStore>> {
    let store = JsonLibraryStore::open(path)
        .await
        .with_context(|| format!("Cannot open library {}", path.display()))?;
    Ok(Arc::new(store))
}

/// Run one incremental scan and print its summary.
async fn run_scan(settings: &Settings, library: &Path, args: &ScanArgs) -> Result<()> {
    let config = settings.scan_config(args)?;
    let store = open_library(library).await?;
    let scanner = ScanCoordinator::new(config, store, SourceId::local())?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, stopping scan");
                cancel.cancel();
            }
        }
    });

    let mut events = scanner.subscribe();
    let progress = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ScanEvent::Progress(progress)) => {
                    eprint!(
                        "\r Scanned {} tracks ({:.0}/s), skipped {} files...",
                        progress.scanned,
                        progress.tracks_per_second(),
                        progress.skipped
                    );
                }
                Ok(ScanEvent::Finished(_)) => break,
                Ok(_) | Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    for root in &scanner.config().roots {
        eprintln!("Scanning {}...", root.display());
    }
    let result = scanner.scan_until_cancelled(cancel).await;
    progress.abort();
    eprintln!();

    let summary = result.context("Scan failed")?;
    match args.format {
        OutputFormat::Text => print_summary(&summary, library),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
    }

    if !summary.fully_persisted() {
        warn!(
            failed = summary.failed_submissions,
            "library was not fully updated, the next scan retries"
        );
    }
    Ok(())
}

fn print_summary(summary: &ScanSummary, library: &Path) {
    println!();
    println!("{}", "─".repeat(60));
    println!(" Library {}", library.display());
    println!(
        " {} tracks scanned ({}), {} files skipped",
        summary.scanned,
        format_size(summary.bytes_scanned, DECIMAL),
        summary.skipped
    );
    println!(
        " {} directories ({} rescanned, {} unchanged, {} removed)",
        summary.walk.dirs_visited,
        summary.walk.dirs_rescanned,
        summary.walk.dirs_unchanged,
        summary.stale_dirs.len()
    );
    println!(" Scanned in {:.2}s", summary.duration.as_secs_f64());
    println!("{}", "─".repeat(60));

    if !summary.skipped_files.is_empty() {
        println!();
        println!(" Skipped files:");
        for skipped in &summary.skipped_files {
            println!("   {} ({})", skipped.path.display(), skipped.reason);
        }
    }
    println!();
}

async fn run_stats(library: &Path, format: OutputFormat) -> Result<()> {
    let store = open_library(library).await?;
    let stats = store.stats().await;

    match format {
        OutputFormat::Text => {
            println!(" Library {}", library.display());
            println!(
                " {} tracks, {} directories, {}",
                stats.tracks,
                stats.directories,
                format_size(stats.total_bytes, DECIMAL)
            );
            println!(" {:.1} hours of audio", stats.total_duration as f64 / 3600.0);
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
    }
    Ok(())
}

async fn run_forget(library: &Path) -> Result<()> {
    let store = open_library(library).await?;
    store
        .clear_baseline()
        .await
        .with_context(|| format!("Cannot update library {}", library.display()))?;

    info!(library = %library.display(), "forgot saved directory mtimes");
    eprintln!("The next scan reads every directory again.");
    Ok(())
}
