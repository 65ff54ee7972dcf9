//! OpenSeadragon manifest discovery.
//!
//! Viewer pages embed their IIIF sources in an OpenSeadragon
//! configuration object; this module pulls the `tileSources` array out of
//! the page's scripts and keeps the entries that point at `info.json`
//! manifests. The result is just a list of manifest URLs feeding the
//! resolve/plan/execute pipeline.

use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info};

use crate::http::{HttpClient, HttpError};

/// Matches one `<script>` element, capturing its contents.
fn script_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)<script[^>]*>(.*?)</script>").unwrap())
}

/// Matches a `tileSources: [...]` array, capturing its contents.
fn sources_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)tileSources\s*:\s*\[(.*?)\]").unwrap())
}

/// Matches a single- or double-quoted string, capturing its contents.
fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"["']([^"']+)["']"#).unwrap())
}

/// Fetch a viewer page and return its HTML.
///
/// The body is decoded as UTF-8, replacing invalid sequences; manifest
/// URLs are plain ASCII so lossy decoding cannot corrupt them.
pub fn fetch_page(client: &dyn HttpClient, url: &str) -> Result<String, HttpError> {
    info!(url, "Fetching viewer page");
    let bytes = client.get(url)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Extract IIIF manifest URLs from OpenSeadragon configuration in HTML.
///
/// Scans `<script>` contents mentioning OpenSeadragon for a
/// `tileSources: [...]` array and collects every quoted string inside it
/// that contains `info.json`. Order of first appearance is preserved and
/// duplicates are dropped.
pub fn extract_tile_sources(html: &str) -> Vec<String> {
    let mut manifests = Vec::new();

    for script in script_pattern().captures_iter(html) {
        let content = &script[1];
        if !content.contains("OpenSeadragon") {
            continue;
        }

        let Some(sources) = sources_pattern().captures(content) else {
            continue;
        };

        for capture in url_pattern().captures_iter(&sources[1]) {
            let url = &capture[1];
            if url.contains("info.json") && !manifests.iter().any(|m| m == url) {
                debug!(url, "Found IIIF manifest");
                manifests.push(url.to_string());
            }
        }
    }

    info!(count = manifests.len(), "Extracted IIIF manifests");
    manifests
}
