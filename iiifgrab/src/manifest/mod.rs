//! IIIF manifest resolution.
//!
//! Fetches an image's `info.json` from the well-known metadata endpoint
//! and validates it into an [`ImageDescriptor`]. Parsing is a structured
//! serde decode with explicit optional fields rather than ad-hoc key
//! lookups, so every downstream consumer sees validated data.

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::http::{HttpClient, HttpError};

/// Tile size assumed when the manifest declares no tile configuration.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Errors that can occur while resolving a manifest.
///
/// A manifest failure aborts processing of that single image only;
/// callers processing a batch continue with the next manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Network or HTTP failure fetching `info.json`.
    #[error("Failed to fetch manifest: {0}")]
    Fetch(#[from] HttpError),

    /// The response body was not a valid manifest document.
    #[error("Failed to parse manifest: {0}")]
    Parse(String),

    /// Required dimensions were absent, non-positive or out of range.
    #[error("Invalid manifest dimensions: {width}x{height}")]
    InvalidDimensions { width: i64, height: i64 },
}

/// Raw `info.json` document as served by IIIF image servers.
///
/// Only the fields the planner needs; everything else is ignored.
#[derive(Debug, Deserialize)]
struct InfoJson {
    width: i64,
    height: i64,
    #[serde(default)]
    tiles: Vec<TileSpec>,
}

/// One entry of the manifest's `tiles` array.
#[derive(Debug, Deserialize)]
struct TileSpec {
    width: i64,
}

/// Validated image metadata from a IIIF manifest.
///
/// Width and height describe the full-resolution image, not any
/// particular tile level. Immutable once resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDescriptor {
    width: u32,
    height: u32,
    tile_size: Option<u32>,
}

impl ImageDescriptor {
    /// Create a descriptor directly, for planning without a manifest fetch.
    ///
    /// Dimensions must be positive; `tile_size` of `None` means the
    /// manifest declared no tile configuration.
    pub fn new(width: u32, height: u32, tile_size: Option<u32>) -> Self {
        Self {
            width,
            height,
            tile_size,
        }
    }

    /// Full-resolution image width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Full-resolution image height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Tile size to use for grid planning.
    ///
    /// Defaults to [`DEFAULT_TILE_SIZE`] when the manifest declared no
    /// tile configuration.
    pub fn tile_size(&self) -> u32 {
        self.tile_size.unwrap_or(DEFAULT_TILE_SIZE)
    }

    /// Whether the manifest declared an explicit tile configuration.
    pub fn is_tiled(&self) -> bool {
        self.tile_size.is_some()
    }
}

/// Fetch and validate an image manifest.
///
/// # Arguments
///
/// * `client` - HTTP client used for the single metadata request
/// * `info_url` - URL of the image's `info.json`
///
/// # Errors
///
/// Returns [`ManifestError::Fetch`] on network/HTTP failure,
/// [`ManifestError::Parse`] when the body is not a manifest document and
/// [`ManifestError::InvalidDimensions`] when `width` or `height` is
/// missing, non-positive or does not fit in `u32`. No retries happen at
/// this layer.
pub fn resolve(client: &dyn HttpClient, info_url: &str) -> Result<ImageDescriptor, ManifestError> {
    debug!(url = info_url, "Fetching IIIF manifest");

    let body = client.get(info_url)?;
    let info: InfoJson =
        serde_json::from_slice(&body).map_err(|e| ManifestError::Parse(e.to_string()))?;

    let invalid = || ManifestError::InvalidDimensions {
        width: info.width,
        height: info.height,
    };
    if info.width <= 0 || info.height <= 0 {
        return Err(invalid());
    }
    let width = u32::try_from(info.width).map_err(|_| invalid())?;
    let height = u32::try_from(info.height).map_err(|_| invalid())?;

    // First tiles entry's width is the tile size; further entries describe
    // additional scale factors we don't need for full-resolution download.
    let tile_size = info
        .tiles
        .first()
        .filter(|t| t.width > 0)
        .and_then(|t| u32::try_from(t.width).ok());

    Ok(ImageDescriptor {
        width,
        height,
        tile_size,
    })
}

/// Derive the image's base URL from its manifest URL.
///
/// IIIF serves metadata at `{base}/info.json`; every tile and full-image
/// request is addressed relative to `{base}`.
pub fn base_url(info_url: &str) -> String {
    info_url
        .strip_suffix("/info.json")
        .unwrap_or(info_url)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::tests::MockHttpClient;

    fn mock_with_body(body: &str) -> MockHttpClient {
        MockHttpClient {
            response: Ok(body.as_bytes().to_vec()),
        }
    }

    #[test]
    fn test_resolve_tiled_manifest() {
        let client = mock_with_body(
            r#"{
                "@context": "http://iiif.io/api/image/2/context.json",
                "@id": "https://example.org/iiif/page1",
                "width": 5000,
                "height": 3000,
                "tiles": [{"width": 1000, "scaleFactors": [1, 2, 4]}]
            }"#,
        );

        let descriptor = resolve(&client, "https://example.org/iiif/page1/info.json").unwrap();
        assert_eq!(descriptor.width(), 5000);
        assert_eq!(descriptor.height(), 3000);
        assert_eq!(descriptor.tile_size(), 1000);
        assert!(descriptor.is_tiled());
    }

    #[test]
    fn test_resolve_untiled_manifest() {
        let client = mock_with_body(r#"{"width": 1000, "height": 800}"#);

        let descriptor = resolve(&client, "https://example.org/iiif/x/info.json").unwrap();
        assert_eq!(descriptor.width(), 1000);
        assert_eq!(descriptor.height(), 800);
        assert!(!descriptor.is_tiled());
        assert_eq!(descriptor.tile_size(), DEFAULT_TILE_SIZE);
    }

    #[test]
    fn test_resolve_empty_tiles_array_means_untiled() {
        let client = mock_with_body(r#"{"width": 4000, "height": 4000, "tiles": []}"#);

        let descriptor = resolve(&client, "url").unwrap();
        assert!(!descriptor.is_tiled());
        assert_eq!(descriptor.tile_size(), 256);
    }

    #[test]
    fn test_resolve_non_positive_tile_width_ignored() {
        let client = mock_with_body(r#"{"width": 4000, "height": 4000, "tiles": [{"width": 0}]}"#);

        let descriptor = resolve(&client, "url").unwrap();
        assert!(!descriptor.is_tiled());
    }

    #[test]
    fn test_resolve_missing_width_is_parse_error() {
        let client = mock_with_body(r#"{"height": 800}"#);

        let result = resolve(&client, "url");
        assert!(matches!(result, Err(ManifestError::Parse(_))));
    }

    #[test]
    fn test_resolve_non_positive_dimensions_rejected() {
        let client = mock_with_body(r#"{"width": 0, "height": 800}"#);

        let result = resolve(&client, "url");
        assert!(matches!(
            result,
            Err(ManifestError::InvalidDimensions {
                width: 0,
                height: 800
            })
        ));
    }

    #[test]
    fn test_resolve_negative_dimensions_rejected() {
        let client = mock_with_body(r#"{"width": 100, "height": -5}"#);

        let result = resolve(&client, "url");
        assert!(matches!(
            result,
            Err(ManifestError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_resolve_dimensions_exceeding_u32_rejected() {
        let client = mock_with_body(r#"{"width": 4294967297, "height": 800}"#);

        let result = resolve(&client, "url");
        assert!(matches!(
            result,
            Err(ManifestError::InvalidDimensions {
                width: 4294967297,
                height: 800
            })
        ));
    }

    #[test]
    fn test_resolve_not_json_is_parse_error() {
        let client = mock_with_body("<html>not a manifest</html>");

        let result = resolve(&client, "url");
        assert!(matches!(result, Err(ManifestError::Parse(_))));
    }

    #[test]
    fn test_resolve_http_failure() {
        let client = MockHttpClient {
            response: Err(HttpError::Status {
                status: 500,
                url: "url".to_string(),
            }),
        };

        let result = resolve(&client, "url");
        assert!(matches!(result, Err(ManifestError::Fetch(_))));
    }

    #[test]
    fn test_base_url_strips_suffix() {
        assert_eq!(
            base_url("https://example.org/iiif/page1/info.json"),
            "https://example.org/iiif/page1"
        );
    }

    #[test]
    fn test_base_url_without_suffix_unchanged() {
        assert_eq!(
            base_url("https://example.org/iiif/page1"),
            "https://example.org/iiif/page1"
        );
    }

    #[test]
    fn test_descriptor_accessors() {
        let descriptor = ImageDescriptor::new(5300, 3000, Some(1000));
        assert_eq!(descriptor.width(), 5300);
        assert_eq!(descriptor.height(), 3000);
        assert_eq!(descriptor.tile_size(), 1000);
        assert!(descriptor.is_tiled());
    }
}
