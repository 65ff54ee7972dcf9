//! iiifgrab CLI - download IIIF tiled images at full resolution.

mod download;
mod error;
mod progress;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Download full-resolution images from IIIF image servers.
///
/// Accepts viewer page URLs (manifests are discovered from the embedded
/// OpenSeadragon configuration) or, with --manifest, direct info.json
/// URLs. Each image is reassembled from its tile grid and written as a
/// PNG to the output directory.
#[derive(Debug, Parser)]
#[command(name = "iiifgrab", version, about)]
struct Cli {
    /// Viewer page URLs, or info.json URLs with --manifest.
    #[arg(required = true)]
    urls: Vec<String>,

    /// Treat the given URLs as info.json manifests, skipping page scraping.
    #[arg(long)]
    manifest: bool,

    /// Directory to write composited images to (overrides config file).
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Maximum concurrent tile downloads (overrides config file).
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Path to an alternate config file.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match download::run(&cli) {
        Ok(summary) => {
            tracing::info!(
                saved = summary.saved,
                failed = summary.failed,
                "Batch complete"
            );
            if summary.saved == 0 {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initialise tracing output to stderr.
///
/// `RUST_LOG` takes precedence; otherwise `-v` selects debug level.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
