//! iiifgrab - IIIF tiled-image downloader
//!
//! This library downloads images exposed through the IIIF Image API
//! (region/size/rotation/quality addressing over HTTP) and reassembles
//! them into single full-resolution rasters.
//!
//! The pipeline runs per image, one direction only:
//!
//! 1. [`manifest`] resolves an `info.json` manifest into a validated
//!    [`manifest::ImageDescriptor`].
//! 2. [`plan`] turns the descriptor into a [`plan::FetchPlan`]: either a
//!    single full-image request or a clipped tile grid.
//! 3. [`engine`] executes the plan with a bounded worker pool and writes
//!    every successfully fetched tile into a shared canvas.
//!
//! Manifest discovery from OpenSeadragon viewer pages lives in [`scrape`];
//! user configuration in [`config`]; the HTTP seam in [`http`].

pub mod config;
pub mod engine;
pub mod http;
pub mod manifest;
pub mod plan;
pub mod scrape;

pub use engine::{Composite, CompositeEngine, EngineConfig, EngineError};
pub use http::{HttpClient, HttpError, ReqwestClient};
pub use manifest::{ImageDescriptor, ManifestError};
pub use plan::{FetchPlan, TileRequest};
