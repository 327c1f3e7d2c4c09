//! Learned color inpainting combined with classical depth inpainting.

use std::sync::Arc;

use ::image::imageops::{self, FilterType};
use ::image::{GrayImage, Luma, Rgb, RgbImage};
use ndarray::Array4;
use ort::value::Tensor;
use serde::Deserialize;
use tracing::instrument;

use crate::error::{Error, Result};
use crate::image::{ensure_same_size, image_to_tensor, Normalization};
use crate::model::{LazySession, ModelType, SessionFactory};

use super::diffusion;
use super::mask::MASK_ON;
use super::tensor::{extract, missing_output};

/// Fixed square input size of the exported LaMa graph.
pub const LAMA_INPUT_SIZE: u32 = 512;

/// Which inpainting behavior runs when inpainting is requested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InpaintMode {
    /// Fill depth-edge disocclusions in both the photo and the depth map.
    #[default]
    Mask,
    /// Regenerate the whole photo with an all-on mask; depth is left as is.
    Whole,
}

/// Value range of the inpainting network's output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputScale {
    /// Pixels in `[0, 255]`.
    #[default]
    Byte,
    /// Pixels in `[0, 1]`.
    Unit,
}

impl OutputScale {
    const fn factor(self) -> f32 {
        match self {
            Self::Byte => 1.0,
            Self::Unit => 255.0,
        }
    }
}

/// Inpainting settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InpaintConfig {
    pub mode: InpaintMode,
    /// Neighbourhood radius for depth-map diffusion.
    pub radius: u32,
    pub output_scale: OutputScale,
}

impl Default for InpaintConfig {
    fn default() -> Self {
        Self {
            mode: InpaintMode::Mask,
            radius: 10,
            output_scale: OutputScale::Byte,
        }
    }
}

impl InpaintConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        if !(1..=64).contains(&self.radius) {
            return Err(Error::invalid("inpaint.radius", "must be between 1 and 64"));
        }
        Ok(())
    }
}

/// A network synthesizing color content for masked pixels.
pub trait InpaintModel: Send + Sync {
    /// Predict a full frame the size of `rgb`; non-zero `mask` pixels are holes.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails.
    fn fill(&self, rgb: &RgbImage, mask: &GrayImage) -> Result<RgbImage>;
}

/// Big-LaMa exported to ONNX.
#[derive(Debug)]
pub struct OnnxLamaModel {
    session: LazySession,
    output_scale: OutputScale,
}

impl OnnxLamaModel {
    /// Create a handle; weights are fetched and loaded on first use.
    #[must_use]
    pub fn new(factory: Arc<SessionFactory>, output_scale: OutputScale) -> Self {
        Self {
            session: LazySession::new(ModelType::Inpaint, factory),
            output_scale,
        }
    }
}

impl InpaintModel for OnnxLamaModel {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn fill(&self, rgb: &RgbImage, mask: &GrayImage) -> Result<RgbImage> {
        ensure_same_size("color inpainting", rgb.dimensions(), mask.dimensions())?;
        let size = LAMA_INPUT_SIZE;

        let image = imageops::resize(rgb, size, size, FilterType::CatmullRom);
        let holes = imageops::resize(mask, size, size, FilterType::Nearest);
        let image_tensor = image_to_tensor(&image, Normalization::UNIT);
        let mut mask_tensor = Array4::<f32>::zeros((1, 1, size as usize, size as usize));
        for (x, y, pixel) in holes.enumerate_pixels() {
            if pixel[0] != 0 {
                mask_tensor[[0, 0, y as usize, x as usize]] = 1.0;
            }
        }

        let output = self.session.with_session(|session| {
            let image_value =
                Tensor::from_array(image_tensor).map_err(|source| Error::Inference { source })?;
            let mask_value =
                Tensor::from_array(mask_tensor).map_err(|source| Error::Inference { source })?;
            let outputs = session
                .run(ort::inputs![image_value, mask_value])
                .map_err(|source| Error::Inference { source })?;
            let output = outputs
                .values()
                .next()
                .ok_or_else(|| missing_output("inpainted image"))?;
            extract(&output)
        })?;

        let (rows, cols) = output.spatial_dims()?;
        if output.data.len() != 3 * rows * cols {
            return Err(Error::ShapeMismatch {
                expected: "3-channel image".to_string(),
                actual: format!("{:?}", output.dims),
            });
        }

        let plane = rows * cols;
        let factor = self.output_scale.factor();
        let predicted = RgbImage::from_fn(cols as u32, rows as u32, |x, y| {
            let index = y as usize * cols + x as usize;
            // Safe: clamped to [0, 255] before casting
            let channel = |c: usize| (output.data[c * plane + index] * factor).clamp(0.0, 255.0) as u8;
            Rgb([channel(0), channel(1), channel(2)])
        });

        Ok(imageops::resize(
            &predicted,
            rgb.width(),
            rgb.height(),
            FilterType::CatmullRom,
        ))
    }
}

/// Result of mask-driven inpainting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InpaintedPair {
    pub image: RgbImage,
    pub depth: GrayImage,
}

/// Runs the learned model on color and diffusion on depth.
#[derive(Clone)]
pub struct Inpainter {
    model: Arc<dyn InpaintModel>,
    radius: u32,
}

impl Inpainter {
    #[must_use]
    pub fn new(model: Arc<dyn InpaintModel>, radius: u32) -> Self {
        Self { model, radius }
    }

    /// Regenerate the whole image with an all-on mask.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails or the model changes the image size.
    #[instrument(skip_all, fields(width = rgb.width(), height = rgb.height()))]
    pub fn inpaint_whole(&self, rgb: &RgbImage) -> Result<RgbImage> {
        let mask = GrayImage::from_pixel(rgb.width(), rgb.height(), Luma([MASK_ON]));
        let filled = self.model.fill(rgb, &mask)?;
        ensure_same_size("whole-image inpainting", rgb.dimensions(), filled.dimensions())?;
        Ok(filled)
    }

    /// Fill masked pixels of the photo (learned) and the depth map (diffusion).
    ///
    /// Pixels outside the mask are returned unchanged in both outputs.
    ///
    /// # Errors
    ///
    /// Returns an error if sizes disagree or inference fails.
    #[instrument(skip_all, fields(width = rgb.width(), height = rgb.height()))]
    pub fn inpaint_masked(
        &self,
        rgb: &RgbImage,
        depth: &GrayImage,
        mask: &GrayImage,
    ) -> Result<InpaintedPair> {
        ensure_same_size("dual inpainting", rgb.dimensions(), depth.dimensions())?;
        ensure_same_size("dual inpainting", rgb.dimensions(), mask.dimensions())?;

        if mask.pixels().all(|p| p[0] == 0) {
            tracing::debug!("Empty mask, skipping inpainting");
            return Ok(InpaintedPair {
                image: rgb.clone(),
                depth: depth.clone(),
            });
        }

        tracing::info!("Inpainting color image...");
        let predicted = self.model.fill(rgb, mask)?;
        ensure_same_size("color inpainting", rgb.dimensions(), predicted.dimensions())?;
        let image = composite(rgb, &predicted, mask);

        tracing::info!("Inpainting depth map...");
        let depth = diffusion::inpaint(depth, mask, self.radius)?;

        Ok(InpaintedPair { image, depth })
    }
}

/// Take `fill` where `mask` is on and `base` elsewhere.
fn composite(base: &RgbImage, fill: &RgbImage, mask: &GrayImage) -> RgbImage {
    RgbImage::from_fn(base.width(), base.height(), |x, y| {
        if mask.get_pixel(x, y)[0] == 0 {
            *base.get_pixel(x, y)
        } else {
            *fill.get_pixel(x, y)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Paint(Rgb<u8>);

    impl InpaintModel for Paint {
        fn fill(&self, rgb: &RgbImage, _mask: &GrayImage) -> Result<RgbImage> {
            Ok(RgbImage::from_pixel(rgb.width(), rgb.height(), self.0))
        }
    }

    struct Shrink;

    impl InpaintModel for Shrink {
        fn fill(&self, rgb: &RgbImage, _mask: &GrayImage) -> Result<RgbImage> {
            Ok(RgbImage::new(rgb.width() / 2, rgb.height()))
        }
    }

    fn left_half_mask(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, _| Luma([if x < width / 2 { 255 } else { 0 }]))
    }

    #[test]
    fn test_only_masked_color_pixels_change() {
        let inpainter = Inpainter::new(Arc::new(Paint(Rgb([1, 2, 3]))), 10);
        let rgb = RgbImage::from_pixel(8, 4, Rgb([200, 200, 200]));
        let depth = GrayImage::from_pixel(8, 4, Luma([40]));
        let pair = inpainter
            .inpaint_masked(&rgb, &depth, &left_half_mask(8, 4))
            .unwrap();

        assert_eq!(pair.image.get_pixel(0, 0), &Rgb([1, 2, 3]));
        assert_eq!(pair.image.get_pixel(7, 3), &Rgb([200, 200, 200]));
        assert!(pair.depth.pixels().all(|p| p[0] == 40));
    }

    #[test]
    fn test_empty_mask_passes_through() {
        let inpainter = Inpainter::new(Arc::new(Paint(Rgb([1, 2, 3]))), 10);
        let rgb = RgbImage::from_pixel(6, 6, Rgb([9, 9, 9]));
        let depth = GrayImage::from_fn(6, 6, |x, _| Luma([x as u8 * 10]));
        let pair = inpainter
            .inpaint_masked(&rgb, &depth, &GrayImage::new(6, 6))
            .unwrap();

        assert_eq!(pair.image, rgb);
        assert_eq!(pair.depth, depth);
    }

    #[test]
    fn test_whole_mode_replaces_everything() {
        let inpainter = Inpainter::new(Arc::new(Paint(Rgb([5, 5, 5]))), 10);
        let rgb = RgbImage::from_pixel(3, 7, Rgb([100, 0, 0]));
        let filled = inpainter.inpaint_whole(&rgb).unwrap();

        assert_eq!(filled.dimensions(), (3, 7));
        assert!(filled.pixels().all(|p| *p == Rgb([5, 5, 5])));
    }

    #[test]
    fn test_model_changing_size_is_rejected() {
        let inpainter = Inpainter::new(Arc::new(Shrink), 10);
        let rgb = RgbImage::new(8, 4);
        let err = inpainter
            .inpaint_masked(&rgb, &GrayImage::new(8, 4), &left_half_mask(8, 4))
            .unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
    }

    #[test]
    fn test_mismatched_mask_is_rejected() {
        let inpainter = Inpainter::new(Arc::new(Paint(Rgb([0, 0, 0]))), 10);
        let rgb = RgbImage::new(8, 4);
        assert!(inpainter
            .inpaint_masked(&rgb, &GrayImage::new(8, 4), &GrayImage::new(4, 4))
            .is_err());
    }

    #[test]
    fn test_radius_bounds() {
        let mut config = InpaintConfig::default();
        assert!(config.validate().is_ok());
        config.radius = 0;
        assert!(config.validate().is_err());
    }
}
