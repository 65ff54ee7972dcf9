//! Tile fetch-and-composite engine.
//!
//! Executes a [`FetchPlan`] with bounded parallelism and assembles the
//! results into a single RGB canvas.
//!
//! Workers are plain OS threads performing blocking fetch + decode; they
//! feed a completion channel consumed by the thread that owns the canvas,
//! so all canvas writes happen on one thread regardless of arrival order.
//! Per-tile failures never propagate past this module: a failed tile
//! leaves its rectangle at the background fill and bumps the failure
//! count.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use image::{imageops, Rgb, RgbImage};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::http::{HttpClient, HttpError, ReqwestClient};
use crate::manifest::ImageDescriptor;
use crate::plan::{FetchPlan, TileRequest};

/// Background fill for regions no tile was written to.
const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// Default number of concurrent in-flight tile fetches.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Default per-request timeout for tile fetches.
pub const DEFAULT_TILE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default per-request timeout for single full-image fetches.
pub const DEFAULT_FULL_IMAGE_TIMEOUT: Duration = Duration::from_secs(120);

/// Configuration for the composite engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum number of concurrent tile fetches.
    pub concurrency: usize,
    /// Per-request timeout for tile and manifest fetches.
    pub tile_timeout: Duration,
    /// Per-request timeout for full-image fetches.
    pub full_image_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            tile_timeout: DEFAULT_TILE_TIMEOUT,
            full_image_timeout: DEFAULT_FULL_IMAGE_TIMEOUT,
        }
    }
}

impl EngineConfig {
    /// Set the maximum number of concurrent tile fetches.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the per-request tile timeout.
    pub fn with_tile_timeout(mut self, timeout: Duration) -> Self {
        self.tile_timeout = timeout;
        self
    }

    /// Set the per-request full-image timeout.
    pub fn with_full_image_timeout(mut self, timeout: Duration) -> Self {
        self.full_image_timeout = timeout;
        self
    }
}

/// Fatal engine errors.
///
/// Only the full-image path can fail as a whole: there is exactly one
/// request and no tile fallback. Tiled plans always produce a canvas.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Failed to create an HTTP client.
    #[error("Failed to create HTTP client: {0}")]
    Client(HttpError),

    /// The single full-image fetch failed.
    #[error("Full image fetch failed: {0}")]
    FullImageFetch(HttpError),

    /// The full-image payload could not be decoded.
    #[error("Full image decode failed: {0}")]
    FullImageDecode(String),
}

/// Per-tile failure reasons, converted to outcomes at the worker boundary.
#[derive(Debug, Error)]
enum TileError {
    #[error("fetch failed: {0}")]
    Fetch(HttpError),

    #[error("decode failed: {0}")]
    Decode(String),
}

/// One completed tile attempt flowing back to the canvas owner.
struct TileOutcome {
    request: TileRequest,
    result: Result<RgbImage, TileError>,
}

/// Observer for per-tile completion, used for progress rendering.
///
/// Called from the canvas-owning thread after each outcome is applied,
/// so implementations see monotonically increasing `completed` values.
pub trait ProgressObserver: Send + Sync {
    /// Called after each request has produced an outcome.
    fn on_tile(&self, completed: usize, total: usize);
}

/// Observer that ignores all progress events.
pub struct NoOpProgress;

impl ProgressObserver for NoOpProgress {
    fn on_tile(&self, _completed: usize, _total: usize) {}
}

/// A finished composite: the canvas plus aggregate outcome counts.
///
/// The canvas always has exactly the descriptor's dimensions. Failed
/// tiles leave their rectangles at the white background fill; the counts
/// tell the caller how much of the image is real.
pub struct Composite {
    /// Assembled RGB raster, `width x height`.
    pub canvas: RgbImage,
    /// Number of requests that fetched and decoded successfully.
    pub succeeded: usize,
    /// Number of requests that failed; their regions stay background.
    pub failed: usize,
}

/// Downloads a fetch plan and composites the results onto one canvas.
///
/// Holds two HTTP clients so tile and full-image requests can carry
/// different timeouts; both are shared read-only across workers.
pub struct CompositeEngine {
    tile_client: Arc<dyn HttpClient>,
    full_image_client: Arc<dyn HttpClient>,
    config: EngineConfig,
}

impl CompositeEngine {
    /// Create an engine from explicit clients.
    ///
    /// # Arguments
    ///
    /// * `tile_client` - Client used for tile requests
    /// * `full_image_client` - Client used for single full-image requests
    /// * `config` - Concurrency and timeout settings
    pub fn new(
        tile_client: Arc<dyn HttpClient>,
        full_image_client: Arc<dyn HttpClient>,
        config: EngineConfig,
    ) -> Self {
        Self {
            tile_client,
            full_image_client,
            config,
        }
    }

    /// Create an engine with reqwest clients built from the config's
    /// timeouts.
    pub fn with_default_clients(config: EngineConfig) -> Result<Self, EngineError> {
        let tile_client = ReqwestClient::with_timeout(config.tile_timeout)
            .map_err(EngineError::Client)?;
        let full_image_client = ReqwestClient::with_timeout(config.full_image_timeout)
            .map_err(EngineError::Client)?;

        Ok(Self::new(
            Arc::new(tile_client),
            Arc::new(full_image_client),
            config,
        ))
    }

    /// Execute a plan without progress reporting.
    pub fn execute(
        &self,
        plan: &FetchPlan,
        descriptor: &ImageDescriptor,
    ) -> Result<Composite, EngineError> {
        self.execute_with_progress(plan, descriptor, &NoOpProgress)
    }

    /// Execute a plan, reporting each completed request to `progress`.
    ///
    /// Blocks until every request in the plan has produced an outcome.
    ///
    /// # Errors
    ///
    /// Only a [`FetchPlan::FullImage`] plan can fail: its single request
    /// has no fallback. Tiled plans always return a composite, possibly
    /// with every region still background-filled.
    pub fn execute_with_progress(
        &self,
        plan: &FetchPlan,
        descriptor: &ImageDescriptor,
        progress: &dyn ProgressObserver,
    ) -> Result<Composite, EngineError> {
        match plan {
            FetchPlan::FullImage { url } => self.execute_full_image(url, descriptor, progress),
            FetchPlan::Tiled { tiles } => Ok(self.execute_tiled(tiles, descriptor, progress)),
        }
    }

    /// Fetch the whole image in one request.
    fn execute_full_image(
        &self,
        url: &str,
        descriptor: &ImageDescriptor,
        progress: &dyn ProgressObserver,
    ) -> Result<Composite, EngineError> {
        info!(
            width = descriptor.width(),
            height = descriptor.height(),
            "Downloading full image"
        );

        let bytes = self
            .full_image_client
            .get(url)
            .map_err(EngineError::FullImageFetch)?;

        let decoded = image::load_from_memory(&bytes)
            .map_err(|e| EngineError::FullImageDecode(e.to_string()))?
            .to_rgb8();

        progress.on_tile(1, 1);

        let canvas = conform_to_canvas(decoded, descriptor.width(), descriptor.height());

        Ok(Composite {
            canvas,
            succeeded: 1,
            failed: 0,
        })
    }

    /// Fetch a tile grid with a bounded worker pool and composite the
    /// outcomes on this thread.
    fn execute_tiled(
        &self,
        tiles: &[TileRequest],
        descriptor: &ImageDescriptor,
        progress: &dyn ProgressObserver,
    ) -> Composite {
        let total = tiles.len();
        let mut canvas =
            RgbImage::from_pixel(descriptor.width(), descriptor.height(), BACKGROUND);

        if total == 0 {
            return Composite {
                canvas,
                succeeded: 0,
                failed: 0,
            };
        }

        let workers = self.config.concurrency.clamp(1, total);
        info!(
            tiles = total,
            workers,
            width = descriptor.width(),
            height = descriptor.height(),
            tile_size = descriptor.tile_size(),
            "Downloading tiled image"
        );

        // Work queue feeding the pool; a single shared receiver bounds the
        // number of in-flight fetches to the worker count.
        let (work_tx, work_rx) = mpsc::channel::<TileRequest>();
        for tile in tiles {
            // Receiver outlives the senders; send cannot fail here.
            let _ = work_tx.send(tile.clone());
        }
        drop(work_tx);
        let work_rx = Arc::new(Mutex::new(work_rx));

        let (outcome_tx, outcome_rx) = mpsc::channel::<TileOutcome>();

        let mut succeeded = 0;
        let mut failed = 0;

        thread::scope(|scope| {
            for i in 0..workers {
                let client = Arc::clone(&self.tile_client);
                let work_rx = Arc::clone(&work_rx);
                let outcome_tx = outcome_tx.clone();

                thread::Builder::new()
                    .name(format!("tile-worker-{}", i))
                    .spawn_scoped(scope, move || {
                        worker_loop(client, work_rx, outcome_tx);
                    })
                    .expect("Failed to spawn tile worker thread");
            }
            // Workers hold the remaining senders; dropping ours lets the
            // outcome loop end once every worker has finished.
            drop(outcome_tx);

            for (completed, outcome) in outcome_rx.iter().enumerate() {
                match outcome.result {
                    Ok(tile_image) => {
                        place_tile(&mut canvas, &tile_image, &outcome.request);
                        succeeded += 1;
                    }
                    Err(e) => {
                        warn!(
                            url = outcome.request.url,
                            x = outcome.request.x,
                            y = outcome.request.y,
                            error = %e,
                            "Tile failed, leaving region blank"
                        );
                        failed += 1;
                    }
                }
                progress.on_tile(completed + 1, total);
            }
        });

        if failed > 0 {
            warn!(succeeded, failed, "Tile download finished with failures");
        } else {
            info!(succeeded, "Tile download finished");
        }

        Composite {
            canvas,
            succeeded,
            failed,
        }
    }
}

/// Worker thread body: pull requests until the queue drains, report every
/// outcome. Errors are converted here and never escape the worker.
fn worker_loop(
    client: Arc<dyn HttpClient>,
    work_rx: Arc<Mutex<Receiver<TileRequest>>>,
    outcome_tx: Sender<TileOutcome>,
) {
    loop {
        let request = {
            let receiver = match work_rx.lock() {
                Ok(receiver) => receiver,
                Err(_) => return,
            };
            match receiver.recv() {
                Ok(request) => request,
                Err(_) => return, // queue drained
            }
        };

        debug!(url = request.url, "Fetching tile");
        let result = fetch_and_decode(client.as_ref(), &request);

        if outcome_tx.send(TileOutcome { request, result }).is_err() {
            return;
        }
    }
}

/// Fetch one tile and decode it to RGB.
fn fetch_and_decode(
    client: &dyn HttpClient,
    request: &TileRequest,
) -> Result<RgbImage, TileError> {
    let bytes = client.get(&request.url).map_err(TileError::Fetch)?;

    let decoded = image::load_from_memory(&bytes)
        .map_err(|e| TileError::Decode(e.to_string()))?
        .to_rgb8();

    Ok(decoded)
}

/// Write a decoded tile into its planned rectangle.
///
/// Servers occasionally return a different size than the requested
/// region. That is a warning, not an error: the tile is clipped to its
/// planned rectangle so it can never spill into a neighbour, and a
/// smaller tile covers only its own top-left portion.
fn place_tile(canvas: &mut RgbImage, tile: &RgbImage, request: &TileRequest) {
    if tile.width() != request.width || tile.height() != request.height {
        warn!(
            url = request.url,
            expected_width = request.width,
            expected_height = request.height,
            actual_width = tile.width(),
            actual_height = tile.height(),
            "Tile size differs from requested region, clipping"
        );
    }

    if tile.width() > request.width || tile.height() > request.height {
        let clipped = imageops::crop_imm(tile, 0, 0, request.width, request.height).to_image();
        imageops::replace(canvas, &clipped, request.x.into(), request.y.into());
    } else {
        imageops::replace(canvas, tile, request.x.into(), request.y.into());
    }
}

/// Force a decoded full image to exactly the declared dimensions.
///
/// An exact match is passed through untouched. Oversized responses are
/// cropped; undersized ones are pasted onto a background-filled canvas.
/// Either mismatch is logged at warn level.
fn conform_to_canvas(decoded: RgbImage, width: u32, height: u32) -> RgbImage {
    if decoded.width() == width && decoded.height() == height {
        return decoded;
    }

    warn!(
        expected_width = width,
        expected_height = height,
        actual_width = decoded.width(),
        actual_height = decoded.height(),
        "Full image size differs from manifest, conforming"
    );

    let mut canvas = RgbImage::from_pixel(width, height, BACKGROUND);
    let clipped = imageops::crop_imm(
        &decoded,
        0,
        0,
        width.min(decoded.width()),
        height.min(decoded.height()),
    )
    .to_image();
    imageops::replace(&mut canvas, &clipped, 0, 0);
    canvas
}
