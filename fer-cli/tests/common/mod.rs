/// Shared helpers for CLI integration tests.
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageBuffer, Rgb};

pub fn find_model_path() -> Option<PathBuf> {
    let candidates = vec![
        "models/emotion-ferplus-8.onnx",
        "../models/emotion-ferplus-8.onnx",
    ];
    candidates
        .into_iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

/// Write a flat-colored RGB image to `dir/name`.
pub fn write_face(dir: &Path, name: &str, width: u32, height: u32, value: u8) -> PathBuf {
    let path = dir.join(name);
    let img = ImageBuffer::from_pixel(width, height, Rgb([value, value / 2, value / 3]));
    DynamicImage::ImageRgb8(img)
        .save(&path)
        .expect("save synthetic face");
    path
}

/// Skip the calling test when the emotion model is not available.
#[macro_export]
macro_rules! require_model {
    () => {
        match $crate::common::find_model_path() {
            Some(p) => p,
            None => {
                eprintln!("Skipping test: emotion-ferplus-8.onnx not found");
                return;
            }
        }
    };
}
