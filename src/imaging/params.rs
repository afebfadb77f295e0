//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the high-level [`operations`](super::operations) module
//! (which decides what each stage does) and the [`backend`](super::backend)
//! (which does the actual codec and glyph work). This separation allows
//! swapping backends (e.g. for testing with a mock) without changing stage
//! logic.
//!
//! ## Types
//!
//! - [`Quality`] — Encoding quality percentage (0–100). Clamped on construction.
//! - [`Alpha`] — Paint alpha for a single draw call (0.0–1.0).
//! - [`Adjustments`] — The six colour adjustment parameters.
//! - [`OutputFormat`] — Target format, or `original` to keep the source MIME type.
//! - [`WatermarkPosition`] — Anchor point for watermark placement.
//! - [`Watermark`] / [`Mark`] — A resolved watermark: text or image payload.
//! - [`CompressParams`], [`TextDrawParams`], [`ImageDrawParams`] — Backend call parameters.

use crate::types::WatermarkSource;
use serde::{Deserialize, Serialize};

/// Quality setting for encoding (0-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.min(100))
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// Quality as the `0.0..=1.0` fraction codecs are asked for.
    pub fn fraction(self) -> f32 {
        self.0 as f32 / 100.0
    }

    /// Build from a fraction, rounding to the nearest percent.
    pub fn from_fraction(fraction: f32) -> Self {
        Self::new((fraction.clamp(0.0, 1.0) * 100.0).round() as u32)
    }

    /// Value for codecs that take `1..=100` (JPEG, AVIF).
    pub fn codec_value(self) -> u8 {
        self.0.clamp(1, 100) as u8
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(92)
    }
}

/// Paint alpha applied to one draw call.
///
/// Alpha is always passed into a draw explicitly; a surface never carries a
/// "current alpha", so nothing can leak into later draws.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Alpha(f32);

impl Alpha {
    pub const OPAQUE: Alpha = Alpha(1.0);

    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            return Self::OPAQUE;
        }
        Self(value.clamp(0.0, 1.0))
    }

    pub fn from_percent(percent: f32) -> Self {
        Self::new(percent / 100.0)
    }

    pub fn value(self) -> f32 {
        self.0
    }
}

impl Default for Alpha {
    fn default() -> Self {
        Self::OPAQUE
    }
}

/// The colour adjustment parameters of one invocation.
///
/// Percentages where 100 is identity, except `hue` (degrees, 0 = identity)
/// and `vibrance` (signed percent, 0 = identity).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adjustments {
    pub opacity: f32,
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub hue: f32,
    pub vibrance: f32,
}

impl Default for Adjustments {
    fn default() -> Self {
        Self {
            opacity: 100.0,
            brightness: 100.0,
            contrast: 100.0,
            saturation: 100.0,
            hue: 0.0,
            vibrance: 0.0,
        }
    }
}

/// Output format. `Original` keeps the source file's own MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Original,
    Jpeg,
    Png,
    Webp,
    Gif,
    Bmp,
    Tiff,
    Avif,
}

impl OutputFormat {
    /// MIME type from the format table; `None` for `Original`.
    pub fn mime_type(self) -> Option<&'static str> {
        match self {
            OutputFormat::Original => None,
            OutputFormat::Jpeg => Some("image/jpeg"),
            OutputFormat::Png => Some("image/png"),
            OutputFormat::Webp => Some("image/webp"),
            OutputFormat::Gif => Some("image/gif"),
            OutputFormat::Bmp => Some("image/bmp"),
            OutputFormat::Tiff => Some("image/tiff"),
            OutputFormat::Avif => Some("image/avif"),
        }
    }

    /// The MIME type to encode with, given the source's MIME type.
    pub fn resolve_mime<'a>(self, source_mime: &'a str) -> &'a str {
        self.mime_type().unwrap_or(source_mime)
    }
}

/// Anchor point for watermark placement.
///
/// The four corners and `center` are the original placements; the edge
/// midpoints complete the nine-point grid using the same margin rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WatermarkPosition {
    TopLeft,
    TopCenter,
    TopRight,
    MiddleLeft,
    Center,
    MiddleRight,
    BottomLeft,
    BottomCenter,
    #[default]
    BottomRight,
}

/// Placement of a watermark along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Start,
    Middle,
    End,
}

impl WatermarkPosition {
    pub fn horizontal(self) -> Align {
        use WatermarkPosition::*;
        match self {
            TopLeft | MiddleLeft | BottomLeft => Align::Start,
            TopCenter | Center | BottomCenter => Align::Middle,
            TopRight | MiddleRight | BottomRight => Align::End,
        }
    }

    pub fn vertical(self) -> Align {
        use WatermarkPosition::*;
        match self {
            TopLeft | TopCenter | TopRight => Align::Start,
            MiddleLeft | Center | MiddleRight => Align::Middle,
            BottomLeft | BottomCenter | BottomRight => Align::End,
        }
    }
}

/// A watermark ready to composite.
#[derive(Debug, Clone, PartialEq)]
pub struct Watermark {
    pub mark: Mark,
    pub position: WatermarkPosition,
    /// Percent of the surface width (font size basis for text).
    pub size: f32,
    pub opacity: Alpha,
}

/// What gets drawn.
#[derive(Debug, Clone, PartialEq)]
pub enum Mark {
    Text { text: String },
    Image { source: WatermarkSource },
}

impl Mark {
    pub fn kind(&self) -> &'static str {
        match self {
            Mark::Text { .. } => "text",
            Mark::Image { .. } => "image",
        }
    }
}

/// A point on the surface in pixels (fractional, as computed).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Parameters for best-effort pre-compression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressParams {
    pub initial_quality: Quality,
    /// Neither side of the output may exceed this.
    pub max_dimension: u32,
    pub max_size_bytes: u64,
}

impl CompressParams {
    pub const MAX_DIMENSION: u32 = 4096;
    pub const MAX_SIZE_BYTES: u64 = 10 * 1024 * 1024;

    pub fn with_quality(initial_quality: Quality) -> Self {
        Self {
            initial_quality,
            max_dimension: Self::MAX_DIMENSION,
            max_size_bytes: Self::MAX_SIZE_BYTES,
        }
    }
}

/// Parameters for drawing outlined text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextDrawParams {
    pub text: String,
    pub font_px: f32,
    /// Left edge and baseline of the text.
    pub origin: Point,
    pub stroke_width: f32,
    pub alpha: Alpha,
}

/// Parameters for drawing a scaled image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageDrawParams {
    /// Top-left corner.
    pub origin: Point,
    pub width: f32,
    pub height: f32,
    pub alpha: Alpha,
}
