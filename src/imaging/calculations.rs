//! Pure geometry for the pipeline stages.
//!
//! No pixels, no I/O: watermark sizing and anchor placement, and the
//! dimension math the compressor uses to respect its ceilings.

use super::params::{Align, Point, WatermarkPosition};

/// Fixed inset between a watermark and the surface edge, in pixels.
pub const WATERMARK_MARGIN: f32 = 20.0;

/// Font size for a text watermark: `floor(surface_width * size / 100)`.
pub fn text_font_size(surface_width: u32, size_percent: f32) -> f32 {
    (surface_width as f32 * size_percent / 100.0).floor()
}

/// Stroke line width for a text watermark outline.
pub fn text_stroke_width(font_size: f32) -> f32 {
    font_size / 20.0
}

/// Rendered size of an image watermark.
///
/// Width is `size` percent of the surface width; height keeps the
/// watermark's own aspect ratio.
pub fn image_watermark_size(surface_width: u32, size_percent: f32, source: (u32, u32)) -> (f32, f32) {
    let width = surface_width as f32 * size_percent / 100.0;
    let height = width / source.0 as f32 * source.1 as f32;
    (width, height)
}

fn horizontal_origin(align: Align, surface_width: f32, mark_width: f32) -> f32 {
    match align {
        Align::Start => WATERMARK_MARGIN,
        Align::Middle => (surface_width - mark_width) / 2.0,
        Align::End => surface_width - mark_width - WATERMARK_MARGIN,
    }
}

/// Draw origin for a text watermark. `y` is the baseline: the text sits above it.
pub fn text_origin(
    position: WatermarkPosition,
    surface: (u32, u32),
    text_width: f32,
    font_size: f32,
) -> Point {
    let (w, h) = (surface.0 as f32, surface.1 as f32);
    let x = horizontal_origin(position.horizontal(), w, text_width);
    let y = match position.vertical() {
        Align::Start => WATERMARK_MARGIN + font_size,
        Align::Middle => (h + font_size) / 2.0,
        Align::End => h - WATERMARK_MARGIN,
    };
    Point::new(x, y)
}

/// Draw origin (top-left corner) for an image watermark.
pub fn image_origin(position: WatermarkPosition, surface: (u32, u32), mark: (f32, f32)) -> Point {
    let (w, h) = (surface.0 as f32, surface.1 as f32);
    let x = horizontal_origin(position.horizontal(), w, mark.0);
    let y = match position.vertical() {
        Align::Start => WATERMARK_MARGIN,
        Align::Middle => (h - mark.1) / 2.0,
        Align::End => h - mark.1 - WATERMARK_MARGIN,
    };
    Point::new(x, y)
}

/// Scale dimensions down so neither side exceeds `max_dimension`.
///
/// Aspect ratio is preserved; images already within bounds are returned
/// unchanged (never upscaled). Sides never round down to zero.
pub fn fit_within(dims: (u32, u32), max_dimension: u32) -> (u32, u32) {
    let (w, h) = dims;
    let longest = w.max(h);
    if longest <= max_dimension || longest == 0 {
        return dims;
    }
    let ratio = max_dimension as f64 / longest as f64;
    let scale = |v: u32| ((v as f64 * ratio).round() as u32).max(1);
    if w >= h {
        (max_dimension, scale(h))
    } else {
        (scale(w), max_dimension)
    }
}

/// One shrink step of the compressor's size loop: 95% per side.
pub fn shrink_step(dims: (u32, u32)) -> (u32, u32) {
    let scale = |v: u32| ((v as f64 * 0.95).floor() as u32).max(1);
    (scale(dims.0), scale(dims.1))
}
