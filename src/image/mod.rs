//! Image decoding, tensor conversion, and PNG/data-URI encoding.

mod load;
mod save;

pub use load::{decode_data_uri, decode_image, image_to_tensor};
pub use save::{encode_data_uri, encode_png, thumbnail_data_uri};

use ndarray::Array4;

/// Image tensor in NCHW format (batch, channels, height, width).
pub type ImageTensor = Array4<f32>;

/// Number of channels in RGB images.
pub const RGB_CHANNELS: usize = 3;

/// Prefix of every PNG data URI produced by this crate.
pub const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// Per-channel normalization applied before handing pixels to a network.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Normalization {
    /// ImageNet statistics, expected by DINOv2-based depth networks.
    pub const IMAGENET: Self = Self {
        mean: [0.485, 0.456, 0.406],
        std: [0.229, 0.224, 0.225],
    };

    /// Plain `[0, 1]` scaling.
    pub const UNIT: Self = Self {
        mean: [0.0, 0.0, 0.0],
        std: [1.0, 1.0, 1.0],
    };
}

/// Returns an error when `actual` does not match `expected`.
///
/// # Errors
///
/// Returns [`crate::Error::DimensionMismatch`] naming `stage`.
pub fn ensure_same_size(
    stage: &'static str,
    expected: (u32, u32),
    actual: (u32, u32),
) -> crate::Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(crate::Error::DimensionMismatch {
            stage,
            expected,
            actual,
        })
    }
}
