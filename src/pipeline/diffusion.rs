//! Classical diffusion-based inpainting for single-channel images.
//!
//! Masked pixels are first seeded from the boundary inwards (nearest known
//! neighbours first) and then relaxed towards a harmonic fill. Pixels outside
//! the mask are never modified.

use std::collections::VecDeque;

use ::image::{GrayImage, Luma};
use tracing::instrument;

use crate::error::Result;
use crate::image::ensure_same_size;

/// Gauss-Seidel relaxation sweeps after seeding.
const RELAXATION_SWEEPS: usize = 32;

/// Value used when the whole image is masked and nothing is known.
const UNKNOWN_FILL: u8 = 128;

/// Fill the masked pixels of `image` by diffusing surrounding values.
///
/// `radius` bounds the neighbourhood each masked pixel is seeded from.
///
/// # Errors
///
/// Returns an error if `image` and `mask` differ in size.
#[instrument(skip_all, fields(width = image.width(), height = image.height(), radius = radius))]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn inpaint(image: &GrayImage, mask: &GrayImage, radius: u32) -> Result<GrayImage> {
    ensure_same_size("depth inpainting", image.dimensions(), mask.dimensions())?;

    let (width, height) = (image.width() as usize, image.height() as usize);
    let mut known: Vec<bool> = mask.pixels().map(|p| p[0] == 0).collect();
    let unknown = known.iter().filter(|k| !**k).count();

    if unknown == 0 {
        return Ok(image.clone());
    }
    if unknown == known.len() {
        return Ok(GrayImage::from_pixel(
            image.width(),
            image.height(),
            Luma([UNKNOWN_FILL]),
        ));
    }

    let mut values: Vec<f32> = image.pixels().map(|p| f32::from(p[0])).collect();
    let order = fill_order(&known, width, height);
    let radius = radius.max(1) as usize;

    for &index in &order {
        values[index] = seed_value(&values, &known, width, height, index, radius);
        known[index] = true;
    }

    let masked: Vec<bool> = mask.pixels().map(|p| p[0] != 0).collect();
    for _ in 0..RELAXATION_SWEEPS {
        relax(&mut values, &masked, width, height, &order);
    }

    Ok(GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let index = y as usize * width + x as usize;
        if masked[index] {
            // Safe: clamped to [0, 255] before casting
            Luma([values[index].round().clamp(0.0, 255.0) as u8])
        } else {
            *image.get_pixel(x, y)
        }
    }))
}

/// Breadth-first order of unknown pixels starting from those touching known ones.
fn fill_order(known: &[bool], width: usize, height: usize) -> Vec<usize> {
    let mut queued = known.to_vec();
    let mut queue = VecDeque::new();

    for index in 0..known.len() {
        if !known[index] && neighbours(index, width, height).any(|n| known[n]) {
            queued[index] = true;
            queue.push_back(index);
        }
    }

    let mut order = Vec::with_capacity(known.iter().filter(|k| !**k).count());
    while let Some(index) = queue.pop_front() {
        order.push(index);
        for n in neighbours(index, width, height) {
            if !queued[n] {
                queued[n] = true;
                queue.push_back(n);
            }
        }
    }
    order
}

/// Inverse-square-distance weighted mean of known pixels within `radius`.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
fn seed_value(
    values: &[f32],
    known: &[bool],
    width: usize,
    height: usize,
    index: usize,
    radius: usize,
) -> f32 {
    let (cx, cy) = ((index % width) as isize, (index / width) as isize);
    let r = radius as isize;
    let limit = (r * r) as f32;

    let mut sum = 0.0f32;
    let mut weight = 0.0f32;
    for dy in -r..=r {
        let y = cy + dy;
        if y < 0 || y >= height as isize {
            continue;
        }
        for dx in -r..=r {
            let x = cx + dx;
            if x < 0 || x >= width as isize || (dx == 0 && dy == 0) {
                continue;
            }
            let dist2 = (dx * dx + dy * dy) as f32;
            if dist2 > limit {
                continue;
            }
            let neighbour = y as usize * width + x as usize;
            if known[neighbour] {
                let w = 1.0 / dist2;
                sum += values[neighbour] * w;
                weight += w;
            }
        }
    }

    if weight > 0.0 {
        sum / weight
    } else {
        f32::from(UNKNOWN_FILL)
    }
}

/// One in-place Laplace smoothing sweep over the masked pixels.
#[allow(clippy::cast_precision_loss)]
fn relax(values: &mut [f32], masked: &[bool], width: usize, height: usize, order: &[usize]) {
    for &index in order {
        debug_assert!(masked[index]);
        let (sum, count) = neighbours(index, width, height)
            .fold((0.0f32, 0u32), |(sum, count), n| (sum + values[n], count + 1));
        if count > 0 {
            values[index] = sum / count as f32;
        }
    }
}

/// 4-connected neighbours inside the image.
fn neighbours(index: usize, width: usize, height: usize) -> impl Iterator<Item = usize> {
    let (x, y) = (index % width, index / width);
    let left = (x > 0).then(|| index - 1);
    let right = (x + 1 < width).then(|| index + 1);
    let up = (y > 0).then(|| index - width);
    let down = (y + 1 < height).then(|| index + width);
    [left, right, up, down].into_iter().flatten()
}
