//! Helpers for moving data out of ONNX outputs.

use crate::error::{Error, Result};

/// Owned copy of an `f32` output tensor.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct OutputTensor {
    pub dims: Vec<usize>,
    pub data: Vec<f32>,
}

impl OutputTensor {
    /// The trailing `(height, width)` pair of the shape.
    pub fn spatial_dims(&self) -> Result<(usize, usize)> {
        match self.dims.as_slice() {
            [.., h, w] => Ok((*h, *w)),
            _ => Err(Error::ShapeMismatch {
                expected: "tensor with at least 2 dimensions".to_string(),
                actual: format!("{:?}", self.dims),
            }),
        }
    }
}

/// Error for a session that produced no outputs.
pub(crate) fn missing_output(what: &str) -> Error {
    Error::ShapeMismatch {
        expected: format!("{what} output"),
        actual: "no output".to_string(),
    }
}

/// Copy an `f32` tensor out of an ONNX value.
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
pub(crate) fn extract(value: &ort::value::ValueRef<'_>) -> Result<OutputTensor> {
    let (shape_info, data) = value
        .try_extract_tensor::<f32>()
        .map_err(|source| Error::Inference { source })?;

    // Safe: tensor dimensions are always non-negative
    let dims: Vec<usize> = shape_info.iter().map(|&x| x as usize).collect();
    let expected: usize = dims.iter().product();
    if expected != data.len() {
        return Err(Error::ShapeMismatch {
            expected: format!("{expected} elements for {dims:?}"),
            actual: format!("{} elements", data.len()),
        });
    }

    Ok(OutputTensor {
        dims,
        data: data.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spatial_dims_use_trailing_axes() {
        let tensor = OutputTensor {
            dims: vec![1, 1, 4, 6],
            data: vec![0.0; 24],
        };
        assert_eq!(tensor.spatial_dims().unwrap(), (4, 6));
    }

    #[test]
    fn test_spatial_dims_reject_vectors() {
        let tensor = OutputTensor {
            dims: vec![5],
            data: vec![0.0; 5],
        };
        assert!(tensor.spatial_dims().is_err());
    }
}
