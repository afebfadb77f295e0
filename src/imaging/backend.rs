//! Raster backend trait and shared types.
//!
//! The [`RasterBackend`] trait is the set of host primitives the pipeline
//! needs: compress, decode, load a watermark, measure and draw text, draw a
//! scaled image, and encode. Nothing else in the crate touches a codec or a
//! font.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate and `imageproc` glyph rendering.

use super::params::{CompressParams, ImageDrawParams, Quality, TextDrawParams};
use super::surface::Surface;
use crate::types::{DataUriError, SourceImage, WatermarkSource};
use image::RgbaImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Encode failed: {0}")]
    Encode(String),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Font error: {0}")]
    Font(String),
    #[error("Invalid data URI: {0}")]
    DataUri(#[from] DataUriError),
    #[error("Scaled image would be {width}x{height} pixels, over the size limit")]
    Oversized { width: u32, height: u32 },
}

/// Pixel size of a decoded bitmap, as reported by the mock backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for raster backends.
///
/// Implementations must be `Sync`: independent invocations may share one
/// backend across rayon workers, so a backend holds no per-invocation state.
pub trait RasterBackend: Sync {
    /// Re-encode a source within the size ceilings, keeping its MIME type.
    fn compress(
        &self,
        source: &SourceImage,
        params: &CompressParams,
    ) -> Result<SourceImage, BackendError>;

    /// Decode a source file into an RGBA bitmap.
    fn decode(&self, source: &SourceImage) -> Result<RgbaImage, BackendError>;

    /// Load and decode a watermark image.
    fn load_watermark(&self, source: &WatermarkSource) -> Result<RgbaImage, BackendError>;

    /// Advance width of `text` at a font size of `font_px` pixels.
    fn measure_text(&self, text: &str, font_px: f32) -> f32;

    /// Stroke then fill `text` onto the surface.
    fn draw_text(&self, surface: &mut Surface, params: &TextDrawParams)
    -> Result<(), BackendError>;

    /// Draw `image` scaled into the rectangle described by `params`.
    fn draw_image(
        &self,
        surface: &mut Surface,
        image: &RgbaImage,
        params: &ImageDrawParams,
    ) -> Result<(), BackendError>;

    /// Encode the surface as `mime` at the given quality.
    fn encode(&self, surface: &Surface, mime: &str, quality: Quality)
    -> Result<Vec<u8>, BackendError>;
}
