//! Monocular depth estimation.

use std::sync::Arc;

use ::image::imageops::{self, FilterType};
use ::image::{DynamicImage, GrayImage, ImageBuffer, Luma, RgbImage};
use ndarray::Array2;
use ort::value::Tensor;
use tracing::instrument;

use crate::error::{Error, Result};
use crate::image::{ensure_same_size, image_to_tensor, Normalization};
use crate::model::{LazySession, ModelType, SessionFactory};

use super::tensor::{extract, missing_output};

/// Single-channel floating point image used between prediction and quantization.
pub type DepthBuffer = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Short side the depth network is fed at.
pub const DEPTH_INPUT_SIZE: u32 = 518;

/// Patch size of the depth network's ViT backbone; input sides must be multiples of it.
pub const DEPTH_PATCH_SIZE: u32 = 14;

/// A network predicting relative depth for an RGB image.
///
/// The prediction may be at any resolution; larger values mean nearer.
pub trait DepthModel: Send + Sync {
    /// Predict raw depth as a `(rows, cols)` array.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails.
    fn predict(&self, rgb: &RgbImage) -> Result<Array2<f32>>;
}

/// Depth-Anything-V2 exported to ONNX.
#[derive(Debug)]
pub struct OnnxDepthModel {
    session: LazySession,
}

impl OnnxDepthModel {
    /// Create a handle; weights are fetched and loaded on first prediction.
    #[must_use]
    pub fn new(factory: Arc<SessionFactory>) -> Self {
        Self {
            session: LazySession::new(ModelType::Depth, factory),
        }
    }
}

impl DepthModel for OnnxDepthModel {
    fn predict(&self, rgb: &RgbImage) -> Result<Array2<f32>> {
        let (width, height) = network_input_size(
            rgb.width(),
            rgb.height(),
            DEPTH_INPUT_SIZE,
            DEPTH_PATCH_SIZE,
        );
        let resized = imageops::resize(rgb, width, height, FilterType::CatmullRom);
        let input = image_to_tensor(&resized, Normalization::IMAGENET);

        let output = self.session.with_session(|session| {
            let input_value =
                Tensor::from_array(input).map_err(|source| Error::Inference { source })?;
            let outputs = session
                .run(ort::inputs![input_value])
                .map_err(|source| Error::Inference { source })?;
            let output = outputs
                .values()
                .next()
                .ok_or_else(|| missing_output("predicted_depth"))?;
            extract(&output)
        })?;

        let (rows, cols) = output.spatial_dims()?;
        if rows * cols != output.data.len() {
            return Err(Error::ShapeMismatch {
                expected: "single depth plane".to_string(),
                actual: format!("{:?}", output.dims),
            });
        }
        Array2::from_shape_vec((rows, cols), output.data).map_err(|_| Error::ShapeMismatch {
            expected: format!("({rows}, {cols})"),
            actual: "reshape failed".to_string(),
        })
    }
}

/// Compute the network input size for an image.
///
/// Both sides are scaled by whichever of `target / width` and `target / height`
/// is closer to 1 (so the short side lands on `target` for photos), then
/// rounded to the nearest multiple of `multiple`.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn network_input_size(width: u32, height: u32, target: u32, multiple: u32) -> (u32, u32) {
    let scale_w = f64::from(target) / f64::from(width.max(1));
    let scale_h = f64::from(target) / f64::from(height.max(1));
    let scale = if (1.0 - scale_w).abs() < (1.0 - scale_h).abs() {
        scale_w
    } else {
        scale_h
    };

    let multiple = multiple.max(1);
    let fit = |side: u32| {
        let steps = (f64::from(side) * scale / f64::from(multiple)).round() as u32;
        steps.max(1) * multiple
    };
    (fit(width), fit(height))
}

/// Estimates an 8-bit depth map at the input's resolution.
#[derive(Clone)]
pub struct DepthEstimator {
    model: Arc<dyn DepthModel>,
}

impl DepthEstimator {
    #[must_use]
    pub fn new(model: Arc<dyn DepthModel>) -> Self {
        Self { model }
    }

    /// Estimate depth for `image`.
    ///
    /// The prediction is resampled bicubically to the input size and
    /// normalized so its minimum maps to 0 and its maximum to 255.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails or returns an empty prediction.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn estimate(&self, image: &DynamicImage) -> Result<GrayImage> {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();

        let raw = self.model.predict(&rgb)?;
        tracing::debug!("Raw depth prediction: {:?}", raw.dim());

        let resampled = resample(&raw, width, height)?;
        let depth = normalize_depth(&resampled);
        ensure_same_size("depth estimation", (width, height), depth.dimensions())?;
        Ok(depth)
    }
}

/// Resample a raw prediction to `width x height` with bicubic filtering.
///
/// Values are rescaled into `[0, 1]` first: the resampler clamps floating
/// point samples to that range.
///
/// # Errors
///
/// Returns an error if the prediction is empty.
#[allow(clippy::cast_possible_truncation)]
pub fn resample(raw: &Array2<f32>, width: u32, height: u32) -> Result<DepthBuffer> {
    let (rows, cols) = raw.dim();
    let (min, max) = finite_range(raw.iter().copied());
    let range = max - min;
    let unit: Vec<f32> = raw
        .iter()
        .map(|&v| {
            if v.is_finite() && range.is_finite() && range > f32::EPSILON {
                (v - min) / range
            } else {
                0.0
            }
        })
        .collect();

    let buffer = DepthBuffer::from_raw(cols as u32, rows as u32, unit)
        .filter(|_| rows > 0 && cols > 0)
        .ok_or_else(|| Error::ShapeMismatch {
            expected: "non-empty depth prediction".to_string(),
            actual: format!("({rows}, {cols})"),
        })?;

    if buffer.dimensions() == (width, height) {
        return Ok(buffer);
    }
    Ok(imageops::resize(&buffer, width, height, FilterType::CatmullRom))
}

/// Linearly map depth to `[0, 255]`, minimum to 0 and maximum to 255.
///
/// A flat (or entirely non-finite) prediction maps to all zeros. Non-finite
/// samples are treated as the minimum.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn normalize_depth(depth: &DepthBuffer) -> GrayImage {
    let (min, max) = finite_range(depth.pixels().map(|p| p[0]));
    let range = max - min;
    if !range.is_finite() || range <= f32::EPSILON {
        return GrayImage::new(depth.width(), depth.height());
    }

    GrayImage::from_fn(depth.width(), depth.height(), |x, y| {
        let value = depth.get_pixel(x, y)[0];
        if !value.is_finite() {
            return Luma([0]);
        }
        // Safe: clamped to [0, 255] before casting
        let scaled = ((value - min) / range * 255.0).round().clamp(0.0, 255.0);
        Luma([scaled as u8])
    })
}

/// Minimum and maximum over the finite values; `(inf, -inf)` when there are none.
fn finite_range(values: impl Iterator<Item = f32>) -> (f32, f32) {
    values
        .filter(|v| v.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landscape_short_side_hits_target() {
        assert_eq!(network_input_size(1000, 500, 518, 14), (1036, 518));
    }

    #[test]
    fn test_input_size_is_patch_aligned() {
        let (w, h) = network_input_size(4032, 3024, 518, 14);
        assert_eq!(w % 14, 0);
        assert_eq!(h % 14, 0);
        assert_eq!(h, 518);
    }

    #[test]
    fn test_tiny_images_get_at_least_one_patch() {
        let (w, h) = network_input_size(1, 1, 518, 14);
        assert!(w >= 14 && h >= 14);
    }

    #[test]
    fn test_normalization_spans_full_range() {
        let depth = DepthBuffer::from_fn(8, 4, |x, y| Luma([(x + y) as f32 * 0.3 + 2.0]));
        let gray = normalize_depth(&depth);

        let min = gray.pixels().map(|p| p[0]).min().unwrap();
        let max = gray.pixels().map(|p| p[0]).max().unwrap();
        assert_eq!((min, max), (0, 255));
        assert_eq!(gray.get_pixel(0, 0)[0], 0);
        assert_eq!(gray.get_pixel(7, 3)[0], 255);
    }

    #[test]
    fn test_flat_depth_is_zero() {
        let depth = DepthBuffer::from_pixel(5, 5, Luma([3.5]));
        assert!(normalize_depth(&depth).pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn test_non_finite_samples_do_not_poison_range() {
        let mut depth = DepthBuffer::from_fn(4, 1, |x, _| Luma([x as f32]));
        depth.put_pixel(1, 0, Luma([f32::NAN]));
        let gray = normalize_depth(&depth);

        assert_eq!(gray.get_pixel(1, 0)[0], 0);
        assert_eq!(gray.get_pixel(3, 0)[0], 255);
    }

    #[test]
    fn test_resample_restores_requested_size() {
        let raw = Array2::from_shape_fn((3, 5), |(r, c)| (r * 5 + c) as f32);
        let resampled = resample(&raw, 17, 9).unwrap();
        assert_eq!(resampled.dimensions(), (17, 9));
    }

    #[test]
    fn test_resample_rejects_empty_prediction() {
        let raw = Array2::<f32>::zeros((0, 4));
        assert!(resample(&raw, 4, 4).is_err());
    }
}
