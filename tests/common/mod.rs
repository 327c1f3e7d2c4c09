#![allow(dead_code)]

use std::sync::Arc;

use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use ndarray::Array2;

use spatialscene::image::encode_png;
use spatialscene::pipeline::{Config, DepthModel, InpaintModel, Pipeline};

/// Predicts a diagonal ramp at half resolution.
pub struct RampDepth;

impl DepthModel for RampDepth {
    fn predict(&self, rgb: &RgbImage) -> spatialscene::Result<Array2<f32>> {
        let rows = (rgb.height() as usize / 2).max(1);
        let cols = (rgb.width() as usize / 2).max(1);
        Ok(Array2::from_shape_fn((rows, cols), |(r, c)| {
            0.5 + (r + c) as f32 * 0.25
        }))
    }
}

/// Predicts a near/far step halfway across the frame.
pub struct StepDepth;

impl DepthModel for StepDepth {
    fn predict(&self, rgb: &RgbImage) -> spatialscene::Result<Array2<f32>> {
        let (rows, cols) = (rgb.height() as usize, rgb.width() as usize);
        Ok(Array2::from_shape_fn((rows, cols), |(_, c)| {
            if c < cols / 2 {
                1.0
            } else {
                9.0
            }
        }))
    }
}

/// Fills every hole with one color.
pub struct Paint(pub Rgb<u8>);

impl InpaintModel for Paint {
    fn fill(&self, rgb: &RgbImage, _mask: &GrayImage) -> spatialscene::Result<RgbImage> {
        Ok(RgbImage::from_pixel(rgb.width(), rgb.height(), self.0))
    }
}

pub const PAINT: Rgb<u8> = Rgb([255, 0, 255]);

pub fn pipeline_with(config: Config, depth: impl DepthModel + 'static) -> Pipeline {
    Pipeline::new(config, Arc::new(depth), Arc::new(Paint(PAINT))).unwrap()
}

pub fn ramp_pipeline() -> Pipeline {
    pipeline_with(Config::default(), RampDepth)
}

pub fn step_pipeline() -> Pipeline {
    pipeline_with(Config::default(), StepDepth)
}

pub fn photo(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 3 % 256) as u8, (y * 5 % 256) as u8, 90])
    })
}

pub fn photo_png(width: u32, height: u32) -> Vec<u8> {
    encode_png(&DynamicImage::ImageRgb8(photo(width, height))).unwrap()
}
