//! Fetch planning.
//!
//! Pure, deterministic translation of an [`ImageDescriptor`] into the
//! requests needed to download the image at full resolution. No I/O
//! happens here; the same descriptor and base URL always yield the same
//! plan.
//!
//! Small images, and images whose manifest declares no tile
//! configuration, are fetched with a single full-region request. Larger
//! tiled images get a non-overlapping grid of region requests that
//! exactly partitions the canvas, with edge tiles clipped to the image
//! bounds.

use crate::manifest::ImageDescriptor;

/// Largest dimension still downloaded as a single full-image request.
///
/// Images at or below this size in both dimensions are cheaper to fetch
/// in one request than as a tile grid.
pub const FULL_IMAGE_MAX_DIM: u32 = 2000;

/// One planned tile fetch: the request URL plus the canvas rectangle the
/// decoded pixels land in.
///
/// The planner guarantees that the rectangles of all requests in a plan
/// tile `[0,width) x [0,height)` exactly, with no overlap and no gap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileRequest {
    /// IIIF region request URL for this tile.
    pub url: String,
    /// Horizontal offset of the tile's top-left corner on the canvas.
    pub x: u32,
    /// Vertical offset of the tile's top-left corner on the canvas.
    pub y: u32,
    /// Region width; equal to the tile size except in a clipped last column.
    pub width: u32,
    /// Region height; equal to the tile size except in a clipped last row.
    pub height: u32,
}

/// Download strategy for one image, chosen once and final.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchPlan {
    /// Single request for the whole image at native resolution.
    FullImage {
        /// Full-region, full-size request URL.
        url: String,
    },
    /// Grid of region requests, enumerated row-major.
    Tiled {
        /// One request per grid cell.
        tiles: Vec<TileRequest>,
    },
}

impl FetchPlan {
    /// Number of HTTP requests this plan will issue.
    pub fn request_count(&self) -> usize {
        match self {
            FetchPlan::FullImage { .. } => 1,
            FetchPlan::Tiled { tiles } => tiles.len(),
        }
    }
}

/// Build the fetch plan for an image.
///
/// # Arguments
///
/// * `descriptor` - Validated manifest metadata
/// * `base_url` - The image's base URL (manifest URL minus `/info.json`)
///
/// # Strategy
///
/// `FullImage` when the manifest declares no tile configuration, or when
/// both dimensions are at most [`FULL_IMAGE_MAX_DIM`]; `Tiled` otherwise.
pub fn plan(descriptor: &ImageDescriptor, base_url: &str) -> FetchPlan {
    let width = descriptor.width();
    let height = descriptor.height();

    if !descriptor.is_tiled() || (width <= FULL_IMAGE_MAX_DIM && height <= FULL_IMAGE_MAX_DIM) {
        return FetchPlan::FullImage {
            url: full_image_url(base_url),
        };
    }

    let tile_size = descriptor.tile_size();
    let nx = width.div_ceil(tile_size);
    let ny = height.div_ceil(tile_size);

    let mut tiles = Vec::with_capacity((nx * ny) as usize);
    for ty in 0..ny {
        for tx in 0..nx {
            let x = tx * tile_size;
            let y = ty * tile_size;
            let region_width = tile_size.min(width - x);
            let region_height = tile_size.min(height - y);

            tiles.push(TileRequest {
                url: tile_url(base_url, x, y, region_width, region_height),
                x,
                y,
                width: region_width,
                height: region_height,
            });
        }
    }

    FetchPlan::Tiled { tiles }
}

/// IIIF URL for the whole image at native resolution.
///
/// Format: `{base}/{region}/{size}/{rotation}/{quality}.{format}` with
/// `full` region, `full` size, no rotation, default quality, PNG output.
fn full_image_url(base_url: &str) -> String {
    format!("{}/full/full/0/default.png", base_url)
}

/// IIIF URL for one pixel-rectangle region at native resolution.
///
/// Tiles are requested as JPEG, the format IIIF servers deliver cheapest.
fn tile_url(base_url: &str, x: u32, y: u32, width: u32, height: u32) -> String {
    format!(
        "{}/{},{},{},{}/full/0/default.jpg",
        base_url, x, y, width, height
    )
}
