//! Batch download command: scrape, resolve, composite, save.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info, warn};

use iiifgrab::config::ConfigFile;
use iiifgrab::engine::{CompositeEngine, EngineConfig};
use iiifgrab::http::{HttpClient, ReqwestClient};
use iiifgrab::{manifest, plan, scrape};

use crate::error::CliError;
use crate::progress::BarProgress;
use crate::Cli;

/// Aggregate outcome of one CLI invocation.
pub struct BatchSummary {
    /// Images successfully written to disk.
    pub saved: usize,
    /// Images that failed (manifest, full-image or save errors).
    pub failed: usize,
}

/// Run the batch described by the CLI arguments.
///
/// Per-image failures are reported and the batch continues; only
/// configuration-level problems (unloadable config, unwritable output
/// directory, no manifests at all) abort the run.
pub fn run(cli: &Cli) -> Result<BatchSummary, CliError> {
    let config = match &cli.config {
        Some(path) => ConfigFile::load_from(path)?,
        None => ConfigFile::load()?,
    };

    let mut engine_config = EngineConfig::from(&config);
    if let Some(concurrency) = cli.concurrency {
        engine_config = engine_config.with_concurrency(concurrency);
    }

    let output_dir = cli
        .output_dir
        .clone()
        .unwrap_or_else(|| config.output.directory.clone());
    std::fs::create_dir_all(&output_dir).map_err(CliError::OutputDir)?;

    // Metadata and page fetches share the short tile timeout.
    let metadata_client: Arc<dyn HttpClient> = Arc::new(
        ReqwestClient::with_timeout(engine_config.tile_timeout)
            .map_err(|e| CliError::Client(e.to_string()))?,
    );
    let engine = CompositeEngine::with_default_clients(engine_config)
        .map_err(|e| CliError::Client(e.to_string()))?;

    let manifests = collect_manifests(cli, metadata_client.as_ref());
    if manifests.is_empty() {
        return Err(CliError::NoManifests);
    }

    let total = manifests.len();
    let mut summary = BatchSummary { saved: 0, failed: 0 };

    for (index, info_url) in manifests.iter().enumerate() {
        info!(image = index + 1, total, url = %info_url, "Processing image");

        let path = output_dir.join(output_filename(index + 1));
        match process_image(metadata_client.as_ref(), &engine, info_url, &path) {
            Ok(()) => summary.saved += 1,
            Err(e) => {
                error!(url = %info_url, error = %e, "Image failed");
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}

/// Gather manifest URLs from the CLI inputs.
///
/// With `--manifest` the inputs are used as-is; otherwise each input is
/// treated as a viewer page and scraped. A page that cannot be fetched
/// is logged and skipped.
fn collect_manifests(cli: &Cli, client: &dyn HttpClient) -> Vec<String> {
    if cli.manifest {
        return cli.urls.clone();
    }

    let mut manifests = Vec::new();
    for url in &cli.urls {
        match scrape::fetch_page(client, url) {
            Ok(html) => manifests.extend(scrape::extract_tile_sources(&html)),
            Err(e) => warn!(url = %url, error = %e, "Failed to fetch page, skipping"),
        }
    }
    manifests
}

/// Resolve, download, composite and save a single image.
fn process_image(
    metadata_client: &dyn HttpClient,
    engine: &CompositeEngine,
    info_url: &str,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let descriptor = manifest::resolve(metadata_client, info_url)?;
    let base = manifest::base_url(info_url);
    let fetch_plan = plan::plan(&descriptor, &base);

    let bar = BarProgress::new();
    let composite = engine.execute_with_progress(&fetch_plan, &descriptor, &bar);
    bar.finish();
    let composite = composite?;

    if composite.failed > 0 {
        warn!(
            succeeded = composite.succeeded,
            failed = composite.failed,
            "Some tiles failed; their regions are blank"
        );
    }

    composite.canvas.save(path)?;
    info!(
        path = %path.display(),
        tiles = composite.succeeded,
        failed = composite.failed,
        "Saved image"
    );
    Ok(())
}

/// Output filename for the nth image of a batch (1-based).
fn output_filename(index: usize) -> PathBuf {
    PathBuf::from(format!("image_{:03}.png", index))
}
