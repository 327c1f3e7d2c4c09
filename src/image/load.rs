//! Image decoding utilities.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use image::{DynamicImage, RgbImage};
use ndarray::Array4;

use crate::error::{Error, Result};

use super::{ImageTensor, Normalization, RGB_CHANNELS};

/// Decode an uploaded image of any supported format.
///
/// # Errors
///
/// Returns an error if the bytes are not a recognizable image.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes).map_err(|source| Error::ImageDecode { source })
}

/// Decode a `data:<mime>;base64,<payload>` URI (or a bare base64 string).
///
/// # Errors
///
/// Returns an error if the payload is not valid base64 or not an image.
pub fn decode_data_uri(uri: &str) -> Result<DynamicImage> {
    let payload = uri
        .split_once(";base64,")
        .map_or(uri, |(_, payload)| payload)
        .trim();
    let bytes = B64
        .decode(payload.as_bytes())
        .map_err(|source| Error::Base64 { source })?;
    decode_image(&bytes)
}

/// Convert an RGB image into an NCHW tensor with the given normalization.
///
/// The image is used at its current size; callers resize beforehand.
#[allow(clippy::cast_possible_truncation)]
pub fn image_to_tensor(rgb: &RgbImage, norm: Normalization) -> ImageTensor {
    let (width, height) = (rgb.width() as usize, rgb.height() as usize);
    let mut tensor = Array4::<f32>::zeros((1, RGB_CHANNELS, height, width));

    for (x, y, pixel) in rgb.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for c in 0..RGB_CHANNELS {
            let value = f32::from(pixel[c]) / 255.0;
            tensor[[0, c, y, x]] = (value - norm.mean[c]) / norm.std[c];
        }
    }

    tensor
}
