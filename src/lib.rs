//! # spatialscene
//!
//! Turns a single photograph into a dense depth map and a disocclusion-aware
//! inpainted photo/depth pair, served over HTTP together with a small
//! file-backed gallery of saved scenes.
//!
//! The pipeline runs a monocular depth network, derives a mask from depth
//! discontinuities (Canny edges grown by dilation), fills the masked photo
//! with a learned inpainting network, and fills the masked depth map with
//! classical diffusion.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use spatialscene::config::ModelConfig;
//! use spatialscene::model::{Device, ModelCache, SessionFactory};
//! use spatialscene::pipeline::{Config, Pipeline};
//!
//! # fn main() -> spatialscene::Result<()> {
//! let cache = ModelCache::new(&ModelConfig::default())?;
//! let factory = Arc::new(SessionFactory::new(cache, Device::Auto)?);
//! let pipeline = Pipeline::with_onnx(Config::default(), factory)?;
//!
//! let bytes = std::fs::read("photo.jpg")?;
//! let processed = pipeline.process(&bytes, true)?;
//! println!("{}x{}", processed.width, processed.height);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod gallery;
pub mod image;
pub mod model;
pub mod pipeline;
pub mod server;

use std::sync::Arc;

use tracing::instrument;

pub use error::{Error, Result};
pub use pipeline::{Config, Pipeline};

/// Build every component from `config` and serve until shutdown.
///
/// # Errors
///
/// Returns an error if any component fails to initialize or the server fails.
#[instrument(skip_all)]
pub async fn run(config: config::AppConfig) -> Result<()> {
    config.validate()?;

    let cache = model::ModelCache::new(&config.models)?;
    let factory = Arc::new(model::SessionFactory::new(cache, config.models.device)?);
    let pipeline = Pipeline::with_onnx(config.pipeline.clone(), factory)?;
    let gallery = gallery::GalleryStore::open(&config.gallery).await?;

    let state = server::AppState::new(pipeline, gallery);
    server::serve(state, &config.server).await
}
