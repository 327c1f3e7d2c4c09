//! Disocclusion mask construction from depth discontinuities.

use ::image::GrayImage;
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::morphology::dilate;
use serde::Deserialize;
use tracing::instrument;

use crate::error::{Error, Result};

/// Value of pixels that must be inpainted.
pub const MASK_ON: u8 = 255;

/// Edge detection and dilation settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct MaskConfig {
    /// Canny low hysteresis threshold.
    pub low_threshold: f32,
    /// Canny high hysteresis threshold.
    pub high_threshold: f32,
    /// Side of the square structuring element used to grow edges. Must be odd.
    pub dilation_kernel: u32,
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            low_threshold: 50.0,
            high_threshold: 150.0,
            dilation_kernel: 15,
        }
    }
}

impl MaskConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        if !(self.low_threshold >= 0.0 && self.high_threshold >= 0.0) {
            return Err(Error::invalid(
                "mask.low_threshold",
                "thresholds must be non-negative",
            ));
        }
        if self.low_threshold > self.high_threshold {
            return Err(Error::invalid(
                "mask.low_threshold",
                "must not exceed mask.high_threshold",
            ));
        }
        if self.dilation_kernel == 0 || self.dilation_kernel % 2 == 0 {
            return Err(Error::invalid("mask.dilation_kernel", "must be odd"));
        }
        if self.dilation_radius().is_none() {
            return Err(Error::invalid(
                "mask.dilation_kernel",
                "must be at most 511",
            ));
        }
        Ok(())
    }

    /// L-infinity radius of the structuring element.
    fn dilation_radius(&self) -> Option<u8> {
        u8::try_from(self.dilation_kernel / 2).ok()
    }
}

/// Build a binary mask covering the band around depth discontinuities.
///
/// Canny edges are grown with a square structuring element. The result holds
/// only 0 and [`MASK_ON`] and has the depth map's size.
///
/// `imageproc`'s Canny smooths with a Gaussian (sigma 1.4) and thresholds the
/// L2 gradient magnitude, so at equal thresholds it marks fewer, thinner edges
/// than an unsmoothed L1 detector. Lower the thresholds to widen the band.
#[instrument(skip_all, fields(width = depth.width(), height = depth.height()))]
pub fn build_mask(depth: &GrayImage, config: &MaskConfig) -> GrayImage {
    let edges = canny(depth, config.low_threshold, config.high_threshold);
    let radius = config.dilation_radius().unwrap_or(u8::MAX);
    let mask = dilate(&edges, Norm::LInf, radius);

    tracing::debug!(
        "Mask covers {} of {} pixels",
        coverage(&mask),
        mask.width() * mask.height()
    );
    mask
}

/// Number of pixels marked for inpainting.
#[must_use]
pub fn coverage(mask: &GrayImage) -> u32 {
    let count = mask.pixels().filter(|p| p[0] != 0).count();
    u32::try_from(count).unwrap_or(u32::MAX)
}
