//! PNG encoding and data-URI embedding.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use image::{DynamicImage, ImageFormat};

use crate::error::{Error, Result};

use super::PNG_DATA_URI_PREFIX;

/// Encode an image as PNG bytes.
///
/// # Errors
///
/// Returns an error if the encoder rejects the pixel layout.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|source| Error::ImageEncode { source })?;
    Ok(bytes)
}

/// Encode an image as a `data:image/png;base64,...` URI.
///
/// # Errors
///
/// Returns an error if PNG encoding fails.
pub fn encode_data_uri(image: &DynamicImage) -> Result<String> {
    let bytes = encode_png(image)?;
    Ok(format!("{PNG_DATA_URI_PREFIX}{}", B64.encode(bytes)))
}

/// Build a PNG data URI no larger than `max_side` on either axis.
///
/// Images already within bounds are re-encoded without resizing.
///
/// # Errors
///
/// Returns an error if PNG encoding fails.
pub fn thumbnail_data_uri(image: &DynamicImage, max_side: u32) -> Result<String> {
    if image.width() <= max_side && image.height() <= max_side {
        return encode_data_uri(image);
    }
    encode_data_uri(&image.thumbnail(max_side, max_side))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::decode_data_uri;
    use image::GrayImage;

    #[test]
    fn test_data_uri_prefix() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(3, 3));
        let uri = encode_data_uri(&img).unwrap();
        assert!(uri.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_thumbnail_keeps_aspect_ratio() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(400, 100));
        let uri = thumbnail_data_uri(&img, 200).unwrap();
        let thumb = decode_data_uri(&uri).unwrap();

        assert_eq!(thumb.width(), 200);
        assert_eq!(thumb.height(), 50);
    }

    #[test]
    fn test_small_thumbnail_is_not_upscaled() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(20, 10));
        let thumb = decode_data_uri(&thumbnail_data_uri(&img, 200).unwrap()).unwrap();
        assert_eq!((thumb.width(), thumb.height()), (20, 10));
    }
}
