//! Shared test utilities for the simple-edit test suite.
//!
//! Synthetic images, so tests never depend on fixture files.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let source = sample_source(64, 48);
//! let tmp = tempfile::TempDir::new().unwrap();
//! let path = write_png(tmp.path(), "a.png", 8, 8);
//! ```

use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::types::SourceImage;

/// An opaque colour gradient, so resampling and filters have something to do.
pub fn gradient(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
            255,
        ])
    })
}

/// Encode an image in `format`. Panics on failure.
pub fn encode(img: &RgbaImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    let dynamic = image::DynamicImage::ImageRgba8(img.clone());
    let dynamic = if format == ImageFormat::Jpeg {
        image::DynamicImage::ImageRgb8(dynamic.to_rgb8())
    } else {
        dynamic
    };
    dynamic
        .write_to(&mut Cursor::new(&mut buf), format)
        .unwrap_or_else(|e| panic!("failed to encode {format:?}: {e}"));
    buf
}

/// PNG bytes of a [`gradient`].
pub fn gradient_png(width: u32, height: u32) -> Vec<u8> {
    encode(&gradient(width, height), ImageFormat::Png)
}

/// A PNG `SourceImage` named `sample.png`.
pub fn sample_source(width: u32, height: u32) -> SourceImage {
    SourceImage::new("sample.png", "image/png", gradient_png(width, height))
}

/// Write a gradient PNG into `dir` and return its path.
pub fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, gradient_png(width, height)).unwrap();
    path
}
