//! Statically linked raster backend.
//!
//! Everything is statically linked into the binary, including the default
//! watermark font.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF, BMP, TIFF, WebP) | `image::ImageReader` with content sniffing |
//! | Pre-compress | decode + `imageops::resize` (`Lanczos3`) + re-encode in the source format |
//! | Encode (JPEG, AVIF) | `JpegEncoder` / `AvifEncoder` with quality |
//! | Encode (WebP) | `webp::Encoder` (libwebp, lossy) with quality |
//! | Encode (PNG, GIF, BMP, TIFF) | `DynamicImage::write_to` (lossless, quality ignored) |
//! | Text metrics | `ab_glyph` advances + kerning |
//! | Text rasterization | `imageproc::drawing::draw_text_mut` |
//! | Text outline | `imageproc::morphology::grayscale_dilate` of the glyph mask |
//! | Watermark scaling | `imageops::resize` with `Lanczos3`, capped at [`MAX_SURFACE_PIXELS`] |
//!
//! AVIF is write-only: the `image` crate's `"avif"` feature only enables the
//! rav1e encoder, so AVIF sources fail to decode.

use super::backend::{BackendError, RasterBackend};
use super::calculations::{fit_within, shrink_step};
use super::params::{CompressParams, ImageDrawParams, Quality, TextDrawParams};
use super::surface::{MAX_SURFACE_PIXELS, Surface};
use crate::types::{SourceImage, WatermarkSource, decode_data_uri};
use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageFormat, ImageReader, Luma, Rgba, RgbaImage};
use imageproc::drawing::draw_text_mut;
use imageproc::morphology::{Mask, grayscale_dilate};
use std::io::Cursor;
use std::path::Path;
use std::sync::LazyLock;

static BUNDLED_FONT_BYTES: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

static BUNDLED_FONT: LazyLock<FontArc> = LazyLock::new(|| {
    FontArc::try_from_slice(BUNDLED_FONT_BYTES).expect("bundled font must parse")
});

/// Maximum shrink iterations while the compressed payload is over the size ceiling.
const MAX_COMPRESS_ITERATIONS: u32 = 10;

/// Backend built on the `image` crate ecosystem plus libwebp for lossy WebP.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend {
    font: FontArc,
}

impl RustBackend {
    /// Backend using the bundled DejaVu Sans for text watermarks.
    pub fn new() -> Self {
        Self {
            font: BUNDLED_FONT.clone(),
        }
    }

    /// Backend using a TrueType/OpenType font from disk.
    pub fn with_font_file(path: &Path) -> Result<Self, BackendError> {
        let bytes = std::fs::read(path)?;
        let font = FontArc::try_from_vec(bytes).map_err(|e| {
            BackendError::Font(format!("Failed to parse font {}: {}", path.display(), e))
        })?;
        Ok(Self { font })
    }

    /// Glyph scale for a CSS-style font size (the em box, in pixels).
    fn px_scale(&self, font_px: f32) -> PxScale {
        let units_per_em = self.font.units_per_em().unwrap_or(1000.0);
        PxScale::from(font_px * self.font.height_unscaled() / units_per_em)
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn image_format_for(mime: &str) -> Result<ImageFormat, BackendError> {
    ImageFormat::from_mime_type(mime)
        .filter(|f| f.writing_enabled())
        .ok_or_else(|| BackendError::UnsupportedFormat(mime.to_string()))
}

/// Decode bytes, trusting the content over any declared type.
fn decode_bytes(bytes: &[u8]) -> Result<DynamicImage, BackendError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(BackendError::Io)?
        .decode()
        .map_err(|e| BackendError::Decode(e.to_string()))
}

/// Composite onto opaque black and drop alpha, as a canvas does for JPEG.
fn flatten_onto_black(img: &DynamicImage) -> DynamicImage {
    let rgba = img.to_rgba8();
    let rgb = image::RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
        let scale = |c: u8| ((c as u16 * a as u16 + 127) / 255) as u8;
        image::Rgb([scale(r), scale(g), scale(b)])
    });
    DynamicImage::ImageRgb8(rgb)
}

/// Encode an image in `format`; quality only matters for lossy codecs.
fn encode_image(
    img: &DynamicImage,
    format: ImageFormat,
    quality: Quality,
) -> Result<Vec<u8>, BackendError> {
    let mut buf = Vec::new();
    let result = match format {
        ImageFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut buf, quality.codec_value());
            flatten_onto_black(img).write_with_encoder(encoder)
        }
        ImageFormat::Avif => {
            let encoder = AvifEncoder::new_with_speed_quality(&mut buf, 6, quality.codec_value());
            img.write_with_encoder(encoder)
        }
        ImageFormat::WebP => return encode_webp(img, quality),
        other => img.write_to(&mut Cursor::new(&mut buf), other),
    };
    result.map_err(|e| BackendError::Encode(format!("{} encode failed: {}", format.to_mime_type(), e)))?;
    Ok(buf)
}

/// Lossy WebP through libwebp; `image`'s own WebP encoder is lossless only.
fn encode_webp(img: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
    let rgba = img.to_rgba8();
    let (w, h) = rgba.dimensions();
    let mut config = webp::WebPConfig::new()
        .map_err(|_| BackendError::Encode("failed to create WebPConfig".into()))?;
    config.quality = quality.fraction() * 100.0;
    config.method = 4;
    let encoded = webp::Encoder::from_rgba(rgba.as_raw(), w, h)
        .encode_advanced(&config)
        .map_err(|e| BackendError::Encode(format!("image/webp encode failed: {e:?}")))?;
    Ok(encoded.to_vec())
}

fn resize_to(img: &DynamicImage, dims: (u32, u32)) -> DynamicImage {
    if (img.width(), img.height()) == dims {
        img.clone()
    } else {
        img.resize_exact(dims.0, dims.1, FilterType::Lanczos3)
    }
}

/// Outcome of the compressor's size loop.
#[derive(Debug)]
struct Shrunk {
    bytes: Vec<u8>,
    dims: (u32, u32),
}

/// Encode at `dims`/`quality`, then keep shrinking dimensions by 5 % and
/// quality by 0.05 (never below 0.05) while the payload is over `max_bytes`.
fn shrink_to_fit(
    mut dims: (u32, u32),
    mut quality: Quality,
    max_bytes: u64,
    mut encode: impl FnMut((u32, u32), Quality) -> Result<Vec<u8>, BackendError>,
) -> Result<Shrunk, BackendError> {
    let mut bytes = encode(dims, quality)?;
    let mut iterations = 0;
    while bytes.len() as u64 > max_bytes && iterations < MAX_COMPRESS_ITERATIONS {
        dims = shrink_step(dims);
        quality = Quality::from_fraction((quality.fraction() - 0.05).max(0.05));
        bytes = encode(dims, quality)?;
        iterations += 1;
    }
    Ok(Shrunk { bytes, dims })
}

/// A solid-colour layer whose alpha is the given coverage mask.
fn paint_layer(mask: &GrayImage, value: u8) -> RgbaImage {
    RgbaImage::from_fn(mask.width(), mask.height(), |x, y| {
        Rgba([value, value, value, mask.get_pixel(x, y)[0]])
    })
}

impl RasterBackend for RustBackend {
    fn compress(
        &self,
        source: &SourceImage,
        params: &CompressParams,
    ) -> Result<SourceImage, BackendError> {
        let format = image_format_for(&source.mime)?;
        let img = decode_bytes(&source.bytes)?;
        let original = (img.width(), img.height());

        let Shrunk { bytes, dims } = shrink_to_fit(
            fit_within(original, params.max_dimension),
            params.initial_quality,
            params.max_size_bytes,
            |dims, quality| encode_image(&resize_to(&img, dims), format, quality),
        )?;

        let exceeded_ceiling = dims != original
            || source.bytes.len() as u64 > params.max_size_bytes;
        if !exceeded_ceiling && bytes.len() >= source.bytes.len() {
            // Re-encoding would only grow the file.
            return Ok(source.clone());
        }

        Ok(SourceImage {
            name: source.name.clone(),
            mime: source.mime.clone(),
            bytes,
        })
    }

    fn decode(&self, source: &SourceImage) -> Result<RgbaImage, BackendError> {
        decode_bytes(&source.bytes)
            .map(|img| img.into_rgba8())
            .map_err(|e| match e {
                BackendError::Decode(msg) => {
                    BackendError::Decode(format!("Failed to decode {}: {}", source.name, msg))
                }
                other => other,
            })
    }

    fn load_watermark(&self, source: &WatermarkSource) -> Result<RgbaImage, BackendError> {
        let bytes = match source {
            WatermarkSource::Path(path) => std::fs::read(path)?,
            WatermarkSource::DataUri(uri) => decode_data_uri(uri)?.1,
        };
        Ok(decode_bytes(&bytes)?.into_rgba8())
    }

    fn measure_text(&self, text: &str, font_px: f32) -> f32 {
        let font = self.font.as_scaled(self.px_scale(font_px));
        let mut width = 0.0;
        let mut previous = None;
        for c in text.chars() {
            let id = font.glyph_id(c);
            if let Some(prev) = previous {
                width += font.kern(prev, id);
            }
            width += font.h_advance(id);
            previous = Some(id);
        }
        width
    }

    fn draw_text(
        &self,
        surface: &mut Surface,
        params: &TextDrawParams,
    ) -> Result<(), BackendError> {
        if params.text.is_empty() || params.font_px <= 0.0 {
            return Ok(());
        }
        let scale = self.px_scale(params.font_px);
        let scaled = self.font.as_scaled(scale);
        let radius = (params.stroke_width / 2.0).round().clamp(0.0, u8::MAX as f32) as u8;

        // Rasterize into a layer just around the text, padded for the outline.
        let pad = radius as i64 + (params.font_px * 0.1).ceil() as i64 + 1;
        let advance = self.measure_text(&params.text, params.font_px);
        let layer_w = (advance.ceil() as i64 + 2 * pad).max(1) as u32;
        let layer_h = ((scaled.ascent() - scaled.descent()).ceil() as i64 + 2 * pad).max(1) as u32;
        let left = params.origin.x.round() as i64 - pad;
        let top = (params.origin.y - scaled.ascent()).round() as i64 - pad;

        let mut fill = GrayImage::new(layer_w, layer_h);
        draw_text_mut(
            &mut fill,
            Luma([255u8]),
            pad as i32,
            pad as i32,
            scale,
            &self.font,
            &params.text,
        );
        let stroke = if radius == 0 {
            fill.clone()
        } else {
            grayscale_dilate(&fill, &Mask::disk(radius))
        };

        // Black stroke first, then white fill, each at the paint alpha.
        surface.draw(&paint_layer(&stroke, 0), left, top, params.alpha);
        surface.draw(&paint_layer(&fill, 255), left, top, params.alpha);
        Ok(())
    }

    fn draw_image(
        &self,
        surface: &mut Surface,
        image: &RgbaImage,
        params: &ImageDrawParams,
    ) -> Result<(), BackendError> {
        let width = params.width.round().max(1.0).min(u32::MAX as f32) as u32;
        let height = params.height.round().max(1.0).min(u32::MAX as f32) as u32;
        if width as u64 * height as u64 > MAX_SURFACE_PIXELS {
            return Err(BackendError::Oversized { width, height });
        }
        let scaled = if image.dimensions() == (width, height) {
            image.clone()
        } else {
            image::imageops::resize(image, width, height, FilterType::Lanczos3)
        };
        surface.draw(
            &scaled,
            params.origin.x.round() as i64,
            params.origin.y.round() as i64,
            params.alpha,
        );
        Ok(())
    }

    fn encode(
        &self,
        surface: &Surface,
        mime: &str,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError> {
        let format = image_format_for(mime)?;
        let img = DynamicImage::ImageRgba8(surface.pixels().clone());
        encode_image(&img, format, quality)
    }
}
