//! Pipeline stages.
//!
//! Each function is one stage of an invocation. They combine the pure
//! [`calculations`](super::calculations) with [`RasterBackend`] calls and map
//! backend failures onto the stage that hit them. Ordering and progress
//! reporting belong to [`pipeline`](crate::pipeline).

use super::backend::RasterBackend;
use super::calculations::{
    image_origin, image_watermark_size, text_font_size, text_origin, text_stroke_width,
};
use super::filter::Filter;
use super::params::{
    Adjustments, Alpha, CompressParams, ImageDrawParams, Mark, OutputFormat, Point, Quality,
    TextDrawParams, Watermark,
};
use super::surface::Surface;
use crate::pipeline::EditError;
use crate::types::{EncodedImage, SourceImage};
use std::borrow::Cow;

/// Result type for pipeline stages.
pub type Result<T> = std::result::Result<T, EditError>;

/// Best-effort pre-compression.
///
/// `compression >= 100` borrows the source untouched. Anything lower asks the
/// backend for a re-encode at `compression / 100`; failure is never papered
/// over with the original bytes.
pub fn compress_source<'a>(
    backend: &impl RasterBackend,
    source: &'a SourceImage,
    compression: u32,
) -> Result<Cow<'a, SourceImage>> {
    if compression >= 100 {
        return Ok(Cow::Borrowed(source));
    }
    let params = CompressParams::with_quality(Quality::new(compression));
    backend
        .compress(source, &params)
        .map(Cow::Owned)
        .map_err(EditError::Compression)
}

/// Decode the source and draw it, unscaled, onto a surface of its own size.
pub fn decode_source(backend: &impl RasterBackend, source: &SourceImage) -> Result<Surface> {
    let bitmap = backend.decode(source).map_err(EditError::Decode)?;
    let mut surface = Surface::new(bitmap.width(), bitmap.height())?;
    surface.draw(&bitmap, 0, 0, Alpha::OPAQUE);
    Ok(surface)
}

/// Run the adjustment filter through a scratch surface and copy it back.
///
/// Returns the filter that was applied.
pub fn apply_adjustments(surface: &mut Surface, adjustments: &Adjustments) -> Result<Filter> {
    let filter = Filter::from_adjustments(adjustments);
    let mut scratch = surface.blank_like()?;
    scratch.draw_filtered(surface, &filter);
    surface.clear();
    surface.copy_from(&scratch);
    Ok(filter)
}

/// Where a watermark ended up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub kind: &'static str,
    pub origin: Point,
    /// Drawn width in pixels (text advance width for text marks).
    pub width: f32,
}

/// Composite the watermark, if any.
///
/// `None` leaves the surface untouched and returns `Ok(None)`.
pub fn apply_watermark(
    backend: &impl RasterBackend,
    surface: &mut Surface,
    watermark: Option<&Watermark>,
) -> Result<Option<Placement>> {
    let Some(watermark) = watermark else {
        return Ok(None);
    };
    let alpha = watermark.opacity;
    let (surface_w, _) = surface.dimensions();

    let placement = match &watermark.mark {
        Mark::Text { text } => {
            let font_px = text_font_size(surface_w, watermark.size);
            let width = backend.measure_text(text, font_px);
            let origin = text_origin(watermark.position, surface.dimensions(), width, font_px);
            backend
                .draw_text(
                    surface,
                    &TextDrawParams {
                        text: text.clone(),
                        font_px,
                        origin,
                        stroke_width: text_stroke_width(font_px),
                        alpha,
                    },
                )
                .map_err(|e| EditError::WatermarkResource {
                    reference: "font".into(),
                    source: e,
                })?;
            Placement {
                kind: watermark.mark.kind(),
                origin,
                width,
            }
        }
        Mark::Image { source } => {
            let image = backend.load_watermark(source).map_err(|e| {
                EditError::WatermarkResource {
                    reference: source.to_string(),
                    source: e,
                }
            })?;
            let (width, height) = image_watermark_size(surface_w, watermark.size, image.dimensions());
            let origin = image_origin(watermark.position, surface.dimensions(), (width, height));
            backend
                .draw_image(
                    surface,
                    &image,
                    &ImageDrawParams {
                        origin,
                        width,
                        height,
                        alpha,
                    },
                )
                .map_err(|e| EditError::WatermarkResource {
                    reference: source.to_string(),
                    source: e,
                })?;
            Placement {
                kind: watermark.mark.kind(),
                origin,
                width,
            }
        }
    };
    Ok(Some(placement))
}

/// Encode the surface in the requested format.
///
/// `OutputFormat::Original` encodes with the source's MIME type verbatim,
/// even when no encoder exists for it.
pub fn encode_surface(
    backend: &impl RasterBackend,
    surface: &Surface,
    format: OutputFormat,
    source_mime: &str,
    quality: Quality,
) -> Result<EncodedImage> {
    let mime = format.resolve_mime(source_mime).to_string();
    match backend.encode(surface, &mime, quality) {
        Ok(bytes) => Ok(EncodedImage { mime, bytes }),
        Err(source) => Err(EditError::Encode { mime, source }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::imaging::backend::{BackendError, Dimensions};
    use crate::imaging::params::WatermarkPosition;
    use crate::types::WatermarkSource;
    use image::{Rgba, RgbaImage};

    fn source() -> SourceImage {
        SourceImage::new("photo.jpg", "image/jpeg", vec![7, 8, 9])
    }

    fn surface(w: u32, h: u32) -> Surface {
        let mut s = Surface::new(w, h).unwrap();
        let pattern = RgbaImage::from_fn(w, h, |x, y| {
            Rgba([(x * 7) as u8, (y * 13) as u8, ((x + y) * 3) as u8, 255])
        });
        s.draw(&pattern, 0, 0, Alpha::OPAQUE);
        s
    }

    fn image_mark(position: WatermarkPosition) -> Watermark {
        Watermark {
            mark: Mark::Image {
                source: WatermarkSource::parse("logo.png"),
            },
            position,
            size: 10.0,
            opacity: Alpha::from_percent(50.0),
        }
    }

    fn text_mark(position: WatermarkPosition) -> Watermark {
        Watermark {
            mark: Mark::Text {
                text: "© me".into(),
            },
            position,
            size: 5.0,
            opacity: Alpha::from_percent(40.0),
        }
    }

    // =========================================================================
    // Compression
    // =========================================================================

    #[test]
    fn full_compression_returns_original_bytes() {
        let backend = MockBackend::new();
        let src = source();
        let out = compress_source(&backend, &src, 100).unwrap();
        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(out.bytes, src.bytes);
        assert!(backend.get_operations().is_empty());
    }

    #[test]
    fn compression_calls_backend_with_quality_and_ceiling() {
        let backend = MockBackend::new();
        let src = source();
        let out = compress_source(&backend, &src, 60).unwrap();
        assert!(matches!(out, Cow::Owned(_)));
        assert_eq!(out.mime, "image/jpeg");
        assert_eq!(
            backend.get_operations(),
            vec![RecordedOp::Compress {
                name: "photo.jpg".into(),
                quality: 60,
                max_dimension: 4096,
            }]
        );
    }

    // =========================================================================
    // Decoding
    // =========================================================================

    #[test]
    fn decode_allocates_intrinsic_size() {
        let backend = MockBackend {
            decode_size: Some(Dimensions {
                width: 31,
                height: 17,
            }),
            ..MockBackend::new()
        };
        let surface = decode_source(&backend, &source()).unwrap();
        assert_eq!(surface.dimensions(), (31, 17));
        assert_eq!(surface.pixels().get_pixel(30, 16).0, [90, 120, 150, 255]);
    }

    #[test]
    fn decode_failure_is_decode_error() {
        let backend = MockBackend::undecodable();
        let result = decode_source(&backend, &source());
        assert!(matches!(result, Err(EditError::Decode(BackendError::Decode(_)))));
    }

    // =========================================================================
    // Adjustments
    // =========================================================================

    #[test]
    fn identity_adjustments_are_pixel_exact() {
        let mut s = surface(40, 30);
        let before = s.clone();
        apply_adjustments(&mut s, &Adjustments::default()).unwrap();
        assert_eq!(s, before);
    }

    #[test]
    fn adjustments_return_applied_filter() {
        let mut s = surface(4, 4);
        let filter = apply_adjustments(
            &mut s,
            &Adjustments {
                brightness: 0.0,
                ..Adjustments::default()
            },
        )
        .unwrap();
        assert_eq!(
            filter.to_string(),
            "opacity(1) brightness(0) contrast(1) saturate(1) hue-rotate(0deg)"
        );
        assert!(s.pixels().pixels().all(|p| p.0 == [0, 0, 0, 255]));
    }

    // =========================================================================
    // Watermark
    // =========================================================================

    #[test]
    fn disabled_watermark_is_noop() {
        let backend = MockBackend::new();
        let mut s = surface(50, 40);
        let before = s.clone();
        let placement = apply_watermark(&backend, &mut s, None).unwrap();
        assert_eq!(placement, None);
        assert_eq!(s, before);
        assert!(backend.get_operations().is_empty());
    }

    #[test]
    fn image_watermark_positions() {
        // 1000x800 surface, 200x100 logo at 10% => 100x50
        for (position, expected) in [
            (WatermarkPosition::TopRight, (880.0, 20.0)),
            (WatermarkPosition::BottomLeft, (20.0, 730.0)),
            (WatermarkPosition::Center, (450.0, 375.0)),
        ] {
            let backend = MockBackend::new();
            let mut s = Surface::new(1000, 800).unwrap();
            let placement = apply_watermark(&backend, &mut s, Some(&image_mark(position)))
                .unwrap()
                .unwrap();
            assert_eq!((placement.origin.x, placement.origin.y), expected);

            let ops = backend.get_operations();
            assert_eq!(ops[0], RecordedOp::LoadWatermark("logo.png".into()));
            assert_eq!(
                ops[1],
                RecordedOp::DrawImage {
                    origin: Point::new(expected.0, expected.1),
                    width: 100.0,
                    height: 50.0,
                    alpha: Alpha::new(0.5),
                }
            );
        }
    }

    #[test]
    fn text_watermark_measures_then_draws() {
        let backend = MockBackend::new();
        let mut s = Surface::new(1000, 800).unwrap();
        let placement = apply_watermark(
            &backend,
            &mut s,
            Some(&text_mark(WatermarkPosition::BottomRight)),
        )
        .unwrap()
        .unwrap();

        // font 50px, 4 chars at 0.5em => 100px wide
        assert_eq!(placement.kind, "text");
        assert_eq!(placement.width, 100.0);
        let ops = backend.get_operations();
        assert_eq!(
            ops,
            vec![
                RecordedOp::MeasureText {
                    text: "© me".into(),
                    font_px: 50.0,
                },
                RecordedOp::DrawText {
                    text: "© me".into(),
                    font_px: 50.0,
                    origin: Point::new(880.0, 780.0),
                    stroke_width: 2.5,
                    alpha: Alpha::new(0.4),
                },
            ]
        );
    }

    #[test]
    fn missing_watermark_image_is_resource_error() {
        let backend = MockBackend::without_watermark();
        let mut s = Surface::new(100, 100).unwrap();
        let result = apply_watermark(
            &backend,
            &mut s,
            Some(&image_mark(WatermarkPosition::TopLeft)),
        );
        assert!(matches!(
            result,
            Err(EditError::WatermarkResource { reference, .. }) if reference == "logo.png"
        ));
    }

    #[test]
    fn later_draw_after_watermark_is_opaque() {
        let backend = MockBackend::new();
        let mut s = Surface::new(100, 100).unwrap();
        apply_watermark(
            &backend,
            &mut s,
            Some(&image_mark(WatermarkPosition::Center)),
        )
        .unwrap();

        s.draw(
            &RgbaImage::from_pixel(1, 1, Rgba([12, 34, 56, 255])),
            5,
            5,
            Alpha::default(),
        );
        assert_eq!(s.pixels().get_pixel(5, 5).0, [12, 34, 56, 255]);
    }

    // =========================================================================
    // Encoding
    // =========================================================================

    #[test]
    fn original_format_encodes_with_source_mime() {
        let backend = MockBackend::new();
        let s = surface(2, 2);
        let encoded =
            encode_surface(&backend, &s, OutputFormat::Original, "image/webp", Quality::new(80))
                .unwrap();
        assert_eq!(encoded.mime, "image/webp");
        assert_eq!(
            backend.get_operations(),
            vec![RecordedOp::Encode {
                mime: "image/webp".into(),
                quality: 80,
            }]
        );
    }

    #[test]
    fn table_format_overrides_source_mime() {
        let backend = MockBackend::new();
        let s = surface(2, 2);
        let encoded =
            encode_surface(&backend, &s, OutputFormat::Png, "image/jpeg", Quality::new(80))
                .unwrap();
        assert_eq!(encoded.mime, "image/png");
    }

    #[test]
    fn unencodable_original_mime_is_encode_error() {
        let backend = MockBackend::new();
        let s = surface(2, 2);
        let result =
            encode_surface(&backend, &s, OutputFormat::Original, "image/heic", Quality::new(80));
        assert!(matches!(
            result,
            Err(EditError::Encode { mime, .. }) if mime == "image/heic"
        ));
    }
}
