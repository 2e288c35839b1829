use std::path::Path;

use anyhow::{Context, Result};
use image::{DynamicImage, GrayImage, imageops::FilterType};
use ndarray::Array2;

use crate::config::ResizeFilter;

/// BT.601 luma weights in 14-bit fixed point (R, G, B).
const LUMA_WEIGHTS: [u32; 3] = [4_899, 9_617, 1_868];
const LUMA_SHIFT: u32 = 14;

/// Load an image from disk into memory.
///
/// # Arguments
///
/// * `path` - The path to the image file.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
    let path_ref = path.as_ref();
    image::open(path_ref).with_context(|| format!("failed to open image {}", path_ref.display()))
}

/// Convert any decoded image into 8-bit grayscale using BT.601 luma weights.
///
/// Images that are already 8-bit luma are returned unchanged. Alpha channels are
/// ignored.
pub fn to_grayscale(image: &DynamicImage) -> GrayImage {
    if let DynamicImage::ImageLuma8(gray) = image {
        return gray.clone();
    }
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        image::Luma([luma(r, g, b)])
    })
}

#[inline]
fn luma(r: u8, g: u8, b: u8) -> u8 {
    let weighted = u32::from(r) * LUMA_WEIGHTS[0]
        + u32::from(g) * LUMA_WEIGHTS[1]
        + u32::from(b) * LUMA_WEIGHTS[2];
    ((weighted + (1 << (LUMA_SHIFT - 1))) >> LUMA_SHIFT).min(255) as u8
}

/// Resize a grayscale image to exactly `width` x `height`.
///
/// Aspect ratio is not preserved. Returns the input unchanged when it already
/// has the requested size.
pub fn resize_gray(image: &GrayImage, width: u32, height: u32, filter: ResizeFilter) -> GrayImage {
    if image.dimensions() == (width, height) {
        return image.clone();
    }
    match filter {
        ResizeFilter::Area => resize_area(image, width, height),
        ResizeFilter::Triangle => image::imageops::resize(image, width, height, FilterType::Triangle),
        ResizeFilter::Nearest => image::imageops::resize(image, width, height, FilterType::Nearest),
    }
}

/// Area-averaging resize.
///
/// When shrinking, every output pixel is the coverage-weighted mean of the
/// source pixels its footprint overlaps. Enlarging (on either axis) falls back
/// to bilinear sampling, which is what area interpolation degenerates to there.
pub fn resize_area(image: &GrayImage, width: u32, height: u32) -> GrayImage {
    let (src_w, src_h) = image.dimensions();
    if width == 0 || height == 0 || src_w == 0 || src_h == 0 {
        return GrayImage::new(width, height);
    }
    if width > src_w || height > src_h {
        return image::imageops::resize(image, width, height, FilterType::Triangle);
    }

    let x_weights = area_weights(src_w as usize, width as usize);
    let y_weights = area_weights(src_h as usize, height as usize);

    let mut rows = Array2::<f32>::zeros((src_h as usize, width as usize));
    for (y, row) in image.rows().enumerate() {
        let pixels: Vec<f32> = row.map(|p| f32::from(p.0[0])).collect();
        for (dx, taps) in x_weights.iter().enumerate() {
            rows[(y, dx)] = taps.iter().map(|&(sx, w)| pixels[sx] * w).sum();
        }
    }

    let mut out = GrayImage::new(width, height);
    for (dy, taps) in y_weights.iter().enumerate() {
        for dx in 0..width as usize {
            let value: f32 = taps.iter().map(|&(sy, w)| rows[(sy, dx)] * w).sum();
            out.put_pixel(
                dx as u32,
                dy as u32,
                image::Luma([value.round().clamp(0.0, 255.0) as u8]),
            );
        }
    }
    out
}

/// Per-output-index list of `(source_index, weight)` pairs for one axis.
fn area_weights(src_len: usize, dst_len: usize) -> Vec<Vec<(usize, f32)>> {
    let scale = src_len as f64 / dst_len as f64;
    (0..dst_len)
        .map(|d| {
            let start = d as f64 * scale;
            let end = ((d + 1) as f64 * scale).min(src_len as f64);
            let first = start.floor() as usize;
            let last = (end.ceil() as usize).min(src_len);
            (first..last)
                .filter_map(|s| {
                    let overlap = end.min((s + 1) as f64) - start.max(s as f64);
                    (overlap > 1e-9).then(|| (s, (overlap / scale) as f32))
                })
                .collect()
        })
        .collect()
}

/// Copy a grayscale image into an `H x W` float plane.
///
/// With `scale_to_unit` set, intensities are divided by 255.
pub fn gray_to_plane(image: &GrayImage, scale_to_unit: bool) -> Array2<f32> {
    let (width, height) = image.dimensions();
    let factor = if scale_to_unit { 1.0 / 255.0 } else { 1.0 };
    Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
        f32::from(image.get_pixel(x as u32, y as u32).0[0]) * factor
    })
}
