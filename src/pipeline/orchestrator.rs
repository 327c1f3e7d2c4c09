//! Pipeline sequencing depth estimation, masking, inpainting, and encoding.

use std::sync::Arc;
use std::time::Instant;

use ::image::{DynamicImage, GrayImage, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::Result;
use crate::image::{decode_image, encode_data_uri};
use crate::model::SessionFactory;

use super::depth::{DepthEstimator, DepthModel, OnnxDepthModel};
use super::inpaint::{InpaintConfig, InpaintMode, InpaintModel, Inpainter, OnnxLamaModel};
use super::mask::{build_mask, MaskConfig};

/// Configuration for the image pipeline.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub mask: MaskConfig,
    pub inpaint: InpaintConfig,
}

impl Config {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        self.mask.validate()?;
        self.inpaint.validate()
    }
}

/// Images produced by one pipeline run, all at the source resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutput {
    pub original: RgbImage,
    /// Depth straight from the estimator.
    pub depth: GrayImage,
    /// Disocclusion mask, present when mask-driven inpainting ran.
    pub mask: Option<GrayImage>,
    pub inpainted_image: RgbImage,
    pub inpainted_depth: GrayImage,
}

/// Encoded response for one processed upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedImage {
    pub original_image: String,
    pub depth_map: String,
    pub inpainted_image: String,
    pub width: u32,
    pub height: u32,
}

/// Depth + inpainting pipeline.
#[derive(Clone)]
pub struct Pipeline {
    config: Config,
    depth: DepthEstimator,
    inpainter: Inpainter,
}

impl Pipeline {
    /// Create a pipeline from explicit models.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(
        config: Config,
        depth_model: Arc<dyn DepthModel>,
        inpaint_model: Arc<dyn InpaintModel>,
    ) -> Result<Self> {
        config.validate()?;

        let inpainter = Inpainter::new(inpaint_model, config.inpaint.radius);
        Ok(Self {
            depth: DepthEstimator::new(depth_model),
            inpainter,
            config,
        })
    }

    /// Create a pipeline backed by the ONNX depth and inpainting networks.
    ///
    /// Weights are not touched until the first request needs them.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_onnx(config: Config, factory: Arc<SessionFactory>) -> Result<Self> {
        tracing::info!("Initializing pipeline with config: {config:?}");
        let depth = Arc::new(OnnxDepthModel::new(Arc::clone(&factory)));
        let inpaint = Arc::new(OnnxLamaModel::new(factory, config.inpaint.output_scale));
        Self::new(config, depth, inpaint)
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Run every stage on a decoded image.
    ///
    /// With `inpaint == false` the inpainted outputs are copies of the
    /// original image and the estimated depth.
    ///
    /// # Errors
    ///
    /// Returns an error if any stage fails.
    #[instrument(skip_all, fields(width = image.width(), height = image.height(), inpaint = inpaint))]
    pub fn run(&self, image: &DynamicImage, inpaint: bool) -> Result<PipelineOutput> {
        let original = image.to_rgb8();

        let started = Instant::now();
        let depth = self.depth.estimate(image)?;
        tracing::debug!("Depth estimated in {:?}", started.elapsed());

        if !inpaint {
            return Ok(PipelineOutput {
                inpainted_image: original.clone(),
                inpainted_depth: depth.clone(),
                original,
                depth,
                mask: None,
            });
        }

        let started = Instant::now();
        let output = match self.config.inpaint.mode {
            InpaintMode::Whole => PipelineOutput {
                inpainted_image: self.inpainter.inpaint_whole(&original)?,
                inpainted_depth: depth.clone(),
                original,
                depth,
                mask: None,
            },
            InpaintMode::Mask => {
                let mask = build_mask(&depth, &self.config.mask);
                let pair = self.inpainter.inpaint_masked(&original, &depth, &mask)?;
                PipelineOutput {
                    inpainted_image: pair.image,
                    inpainted_depth: pair.depth,
                    original,
                    depth,
                    mask: Some(mask),
                }
            }
        };
        tracing::debug!("Inpainting finished in {:?}", started.elapsed());

        Ok(output)
    }

    /// Decode an upload, run the pipeline, and embed the results as PNG data URIs.
    ///
    /// The returned depth map is the inpainted one when inpainting ran.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding, any stage, or encoding fails.
    #[instrument(skip_all, fields(bytes = bytes.len(), inpaint = inpaint))]
    pub fn process(&self, bytes: &[u8], inpaint: bool) -> Result<ProcessedImage> {
        let image = decode_image(bytes)?;
        tracing::info!("Processing {}x{} image", image.width(), image.height());

        let output = self.run(&image, inpaint)?;
        let (width, height) = output.original.dimensions();

        Ok(ProcessedImage {
            original_image: encode_data_uri(&DynamicImage::ImageRgb8(output.original))?,
            depth_map: encode_data_uri(&DynamicImage::ImageLuma8(output.inpainted_depth))?,
            inpainted_image: encode_data_uri(&DynamicImage::ImageRgb8(output.inpainted_image))?,
            width,
            height,
        })
    }
}
