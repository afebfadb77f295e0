//! The edit pipeline.
//!
//! One invocation takes one [`SourceImage`] through five strictly sequential
//! stages and returns one [`EncodedImage`]:
//!
//! ```text
//! compress → decode → adjust → watermark → encode
//! ```
//!
//! Stages are skipped only by settings: `compression = 100` skips the
//! compressor, a disabled watermark skips compositing, and
//! `format = "original"` encodes with the source MIME type.
//!
//! ## Resources
//!
//! The invocation owns exactly one [`Surface`](crate::imaging::Surface) plus the
//! adjustment stage's scratch copy. Both are dropped when the invocation
//! returns, on success or on error. The compressed source is either a borrow
//! of the caller's bytes or an owned buffer that lives only until decode.
//!
//! ## Progress
//!
//! The library never prints. Pass a [`Sender<EditEvent>`] to receive one
//! event per stage; `output.rs` formats them for the CLI.
//!
//! ## Batches
//!
//! [`edit_files`] runs independent invocations in parallel with
//! [rayon](https://docs.rs/rayon). Invocations share only the backend, which
//! holds no per-invocation state.

use crate::config::{ConfigError, EditSettings, WatermarkKind};
use crate::imaging::{
    BackendError, RasterBackend, RustBackend, SurfaceError, apply_adjustments, apply_watermark,
    compress_source, decode_source, encode_surface,
};
use crate::types::{EncodedImage, SourceImage};
use rayon::prelude::*;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EditError {
    #[error("Could not allocate drawing surface: {0}")]
    SurfaceAcquisition(#[from] SurfaceError),
    #[error("Could not decode image: {0}")]
    Decode(#[source] BackendError),
    #[error("Pre-compression failed: {0}")]
    Compression(#[source] BackendError),
    #[error("Could not load watermark {reference}: {source}")]
    WatermarkResource {
        reference: String,
        #[source]
        source: BackendError,
    },
    #[error("Could not encode as {mime}: {source}")]
    Encode {
        mime: String,
        #[source]
        source: BackendError,
    },
    #[error("Invalid settings: {0}")]
    Settings(#[from] ConfigError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Progress events, one per stage of an invocation.
///
/// `name` is the source's display name so events from parallel invocations
/// can be told apart.
#[derive(Debug, Clone, PartialEq)]
pub enum EditEvent {
    Compressed {
        name: String,
        original_bytes: usize,
        compressed_bytes: usize,
    },
    CompressionSkipped {
        name: String,
    },
    Decoded {
        name: String,
        width: u32,
        height: u32,
    },
    Adjusted {
        name: String,
        /// CSS-like filter string, e.g. `brightness(1.2) contrast(1)`.
        filter: String,
    },
    Watermarked {
        name: String,
        kind: &'static str,
        x: f32,
        y: f32,
        width: f32,
    },
    WatermarkSkipped {
        name: String,
    },
    Encoded {
        name: String,
        mime: String,
        bytes: usize,
    },
    /// A batch entry completed.
    Finished {
        index: usize,
        name: String,
        destination: String,
    },
    /// A batch entry failed; the batch carries on.
    Failed {
        index: usize,
        name: String,
        error: String,
    },
}

fn emit(events: Option<&Sender<EditEvent>>, event: EditEvent) {
    if let Some(tx) = events {
        // A dropped receiver only means nobody is listening.
        let _ = tx.send(event);
    }
}

/// Build the backend for `settings`: the bundled font unless
/// `watermark.font` names another one.
///
/// The custom font is only loaded when a text watermark will be drawn.
pub fn backend_for(settings: &EditSettings) -> Result<RustBackend, EditError> {
    let watermark = &settings.watermark;
    let draws_text = watermark.enabled && watermark.kind == WatermarkKind::Text;
    match watermark.font.as_ref().filter(|_| draws_text) {
        Some(path) => RustBackend::with_font_file(path).map_err(|e| {
            EditError::WatermarkResource {
                reference: path.display().to_string(),
                source: e,
            }
        }),
        None => Ok(RustBackend::new()),
    }
}

/// Edit one image with the production backend.
pub fn apply_image_edits(
    source: &SourceImage,
    settings: &EditSettings,
) -> Result<EncodedImage, EditError> {
    let backend = backend_for(settings)?;
    apply_image_edits_with_backend(&backend, source, settings, None)
}

/// Edit one image using a specific backend (allows testing with mock).
pub fn apply_image_edits_with_backend(
    backend: &impl RasterBackend,
    source: &SourceImage,
    settings: &EditSettings,
    events: Option<&Sender<EditEvent>>,
) -> Result<EncodedImage, EditError> {
    let name = &source.name;
    let watermark = settings.watermark.resolve()?;

    let compressed = compress_source(backend, source, settings.compression)?;
    emit(
        events,
        match &compressed {
            Cow::Borrowed(_) => EditEvent::CompressionSkipped { name: name.clone() },
            Cow::Owned(c) => EditEvent::Compressed {
                name: name.clone(),
                original_bytes: source.bytes.len(),
                compressed_bytes: c.bytes.len(),
            },
        },
    );

    let mut surface = decode_source(backend, &compressed)?;
    drop(compressed);
    let (width, height) = surface.dimensions();
    emit(
        events,
        EditEvent::Decoded {
            name: name.clone(),
            width,
            height,
        },
    );

    let filter = apply_adjustments(&mut surface, &settings.adjustments())?;
    emit(
        events,
        EditEvent::Adjusted {
            name: name.clone(),
            filter: filter.to_string(),
        },
    );

    let placement = apply_watermark(backend, &mut surface, watermark.as_ref())?;
    emit(
        events,
        match placement {
            Some(p) => EditEvent::Watermarked {
                name: name.clone(),
                kind: p.kind,
                x: p.origin.x,
                y: p.origin.y,
                width: p.width,
            },
            None => EditEvent::WatermarkSkipped { name: name.clone() },
        },
    );

    let encoded = encode_surface(
        backend,
        &surface,
        settings.format,
        &source.mime,
        settings.quality(),
    )?;
    emit(
        events,
        EditEvent::Encoded {
            name: name.clone(),
            mime: encoded.mime.clone(),
            bytes: encoded.bytes.len(),
        },
    );
    Ok(encoded)
}

// ============================================================================
// Batches
// ============================================================================

/// Where batch results go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Write `<stem>-edited.<ext>` files into this directory.
    Directory(PathBuf),
    /// Keep results in memory as `data:` URIs.
    DataUri,
}

/// What happened to one batch input.
#[derive(Debug)]
pub enum EditOutcome {
    Written(PathBuf),
    DataUri(String),
    Failed(EditError),
}

impl EditOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, EditOutcome::Failed(_))
    }
}

/// Output file name for an edited source: `<stem>-edited.<ext>`.
pub fn output_file_name(source: &SourceImage, encoded: &EncodedImage) -> String {
    format!("{}-edited.{}", source.stem(), encoded.extension())
}

/// Edit several files in parallel.
///
/// Each input is an independent invocation; a failure is reported for that
/// input and the rest carry on. Outcomes are returned in input order.
pub fn edit_files(
    backend: &impl RasterBackend,
    inputs: &[PathBuf],
    settings: &EditSettings,
    destination: &Destination,
    events: Option<Sender<EditEvent>>,
) -> Vec<EditOutcome> {
    inputs
        .par_iter()
        .enumerate()
        .map_with(events, |tx, (index, path)| {
            let tx = tx.as_ref();
            let outcome = edit_one(backend, path, settings, destination, tx);
            let name = display_name(path);
            match &outcome {
                EditOutcome::Written(out) => emit(
                    tx,
                    EditEvent::Finished {
                        index,
                        name,
                        destination: out.display().to_string(),
                    },
                ),
                EditOutcome::DataUri(_) => emit(
                    tx,
                    EditEvent::Finished {
                        index,
                        name,
                        destination: "data URI".to_string(),
                    },
                ),
                EditOutcome::Failed(e) => emit(
                    tx,
                    EditEvent::Failed {
                        index,
                        name,
                        error: e.to_string(),
                    },
                ),
            }
            outcome
        })
        .collect()
}

fn edit_one(
    backend: &impl RasterBackend,
    path: &Path,
    settings: &EditSettings,
    destination: &Destination,
    events: Option<&Sender<EditEvent>>,
) -> EditOutcome {
    let run = || -> Result<EditOutcome, EditError> {
        let source = SourceImage::open(path)?;
        let encoded = apply_image_edits_with_backend(backend, &source, settings, events)?;
        Ok(match destination {
            Destination::Directory(dir) => {
                std::fs::create_dir_all(dir)?;
                let out = dir.join(output_file_name(&source, &encoded));
                std::fs::write(&out, &encoded.bytes)?;
                EditOutcome::Written(out)
            }
            Destination::DataUri => EditOutcome::DataUri(encoded.to_data_uri()),
        })
    };
    run().unwrap_or_else(EditOutcome::Failed)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::imaging::{OutputFormat, WatermarkPosition};
    use crate::test_helpers::{gradient_png, write_png};
    use std::sync::mpsc;
    use tempfile::TempDir;

    fn source() -> SourceImage {
        SourceImage::new("holiday.jpg", "image/jpeg", vec![0xFF, 0xD8, 0xFF, 0xE0])
    }

    fn op_names(ops: &[RecordedOp]) -> Vec<&'static str> {
        ops.iter()
            .map(|op| match op {
                RecordedOp::Compress { .. } => "compress",
                RecordedOp::Decode(_) => "decode",
                RecordedOp::LoadWatermark(_) => "load_watermark",
                RecordedOp::MeasureText { .. } => "measure_text",
                RecordedOp::DrawText { .. } => "draw_text",
                RecordedOp::DrawImage { .. } => "draw_image",
                RecordedOp::Encode { .. } => "encode",
            })
            .collect()
    }

    #[test]
    fn default_settings_decode_then_encode_original_mime() {
        let backend = MockBackend::new();
        let encoded =
            apply_image_edits_with_backend(&backend, &source(), &EditSettings::default(), None)
                .unwrap();
        assert_eq!(encoded.mime, "image/jpeg");
        assert_eq!(op_names(&backend.get_operations()), vec!["decode", "encode"]);
    }

    #[test]
    fn stages_run_in_order() {
        let backend = MockBackend::new();
        let mut settings = EditSettings {
            compression: 80,
            format: OutputFormat::Webp,
            ..EditSettings::default()
        };
        settings.watermark.enabled = true;
        settings.watermark.kind = WatermarkKind::Image;
        settings.watermark.image = Some("logo.png".into());

        let encoded =
            apply_image_edits_with_backend(&backend, &source(), &settings, None).unwrap();
        assert_eq!(encoded.mime, "image/webp");
        assert_eq!(
            op_names(&backend.get_operations()),
            vec!["compress", "decode", "load_watermark", "draw_image", "encode"]
        );
    }

    #[test]
    fn quality_is_passed_to_encoder() {
        let backend = MockBackend::new();
        let settings = EditSettings {
            quality: 40,
            ..EditSettings::default()
        };
        apply_image_edits_with_backend(&backend, &source(), &settings, None).unwrap();
        assert!(backend.get_operations().contains(&RecordedOp::Encode {
            mime: "image/jpeg".into(),
            quality: 40,
        }));
    }

    #[test]
    fn decode_failure_stops_pipeline() {
        let backend = MockBackend::undecodable();
        let result =
            apply_image_edits_with_backend(&backend, &source(), &EditSettings::default(), None);
        assert!(matches!(result, Err(EditError::Decode(_))));
        assert_eq!(op_names(&backend.get_operations()), vec!["decode"]);
    }

    #[test]
    fn watermark_failure_stops_before_encode() {
        let backend = MockBackend::without_watermark();
        let mut settings = EditSettings::default();
        settings.watermark.enabled = true;
        settings.watermark.kind = WatermarkKind::Image;
        settings.watermark.image = Some("missing.png".into());

        let result = apply_image_edits_with_backend(&backend, &source(), &settings, None);
        assert!(matches!(result, Err(EditError::WatermarkResource { .. })));
        assert!(!op_names(&backend.get_operations()).contains(&"encode"));
    }

    #[test]
    fn invalid_watermark_settings_fail_before_any_stage() {
        let backend = MockBackend::new();
        let mut settings = EditSettings::default();
        settings.watermark.enabled = true;
        settings.watermark.kind = WatermarkKind::Image;

        let result = apply_image_edits_with_backend(&backend, &source(), &settings, None);
        assert!(matches!(result, Err(EditError::Settings(_))));
        assert!(backend.get_operations().is_empty());
    }

    #[test]
    fn out_of_range_watermark_values_are_best_effort() {
        let backend = MockBackend::new();
        let mut settings = EditSettings::default();
        settings.watermark.enabled = true;
        settings.watermark.size = 150.0;
        settings.watermark.opacity = 120.0;

        let (tx, rx) = mpsc::channel();
        apply_image_edits_with_backend(&backend, &source(), &settings, Some(&tx)).unwrap();
        drop(tx);
        // 1000px wide at 150% => 1500px font
        assert!(backend.get_operations().iter().any(|op| matches!(
            op,
            RecordedOp::DrawText { font_px, .. } if *font_px == 1500.0
        )));
        assert!(rx.iter().any(|e| matches!(e, EditEvent::Watermarked { .. })));
    }

    #[test]
    fn empty_watermark_text_still_encodes() {
        let source = SourceImage::new("g.png", "image/png", gradient_png(16, 16));
        let mut settings = EditSettings::default();
        settings.watermark.enabled = true;
        settings.watermark.text = String::new();

        let edited = apply_image_edits(&source, &settings).unwrap();
        let plain = apply_image_edits(&source, &EditSettings::default()).unwrap();
        assert_eq!(
            image::load_from_memory(&edited.bytes).unwrap(),
            image::load_from_memory(&plain.bytes).unwrap()
        );
    }

    #[test]
    fn unencodable_original_mime_is_encode_error() {
        let backend = MockBackend::new();
        let heic = SourceImage::new("phone.heic", "image/heic", vec![0; 8]);
        let result =
            apply_image_edits_with_backend(&backend, &heic, &EditSettings::default(), None);
        assert!(matches!(result, Err(EditError::Encode { mime, .. }) if mime == "image/heic"));
    }

    #[test]
    fn emits_one_event_per_stage() {
        let backend = MockBackend::new();
        let mut settings = EditSettings::default();
        settings.watermark.enabled = true;
        settings.watermark.text = "hi".into();
        settings.watermark.position = WatermarkPosition::TopLeft;

        let (tx, rx) = mpsc::channel();
        apply_image_edits_with_backend(&backend, &source(), &settings, Some(&tx)).unwrap();
        drop(tx);
        let events: Vec<EditEvent> = rx.iter().collect();

        assert_eq!(events.len(), 5);
        assert_eq!(
            events[0],
            EditEvent::CompressionSkipped {
                name: "holiday.jpg".into()
            }
        );
        assert_eq!(
            events[1],
            EditEvent::Decoded {
                name: "holiday.jpg".into(),
                width: 1000,
                height: 800,
            }
        );
        assert!(matches!(&events[2], EditEvent::Adjusted { filter, .. } if filter.starts_with("opacity(1)")));
        // 1000px wide at 5% => 50px font; top-left baseline at margin + font size
        assert_eq!(
            events[3],
            EditEvent::Watermarked {
                name: "holiday.jpg".into(),
                kind: "text",
                x: 20.0,
                y: 70.0,
                width: 50.0,
            }
        );
        assert!(matches!(&events[4], EditEvent::Encoded { mime, .. } if mime == "image/jpeg"));
    }

    #[test]
    fn compression_event_reports_sizes() {
        let backend = MockBackend::new();
        let settings = EditSettings {
            compression: 50,
            ..EditSettings::default()
        };
        let (tx, rx) = mpsc::channel();
        apply_image_edits_with_backend(&backend, &source(), &settings, Some(&tx)).unwrap();
        drop(tx);
        assert_eq!(
            rx.iter().next(),
            Some(EditEvent::Compressed {
                name: "holiday.jpg".into(),
                original_bytes: 4,
                compressed_bytes: 1,
            })
        );
    }

    #[test]
    fn output_file_name_uses_encoded_extension() {
        let encoded = EncodedImage {
            mime: "image/png".into(),
            bytes: vec![],
        };
        assert_eq!(output_file_name(&source(), &encoded), "holiday-edited.png");
    }

    // =========================================================================
    // Batches
    // =========================================================================

    #[test]
    fn edit_files_writes_outputs_in_input_order() {
        let tmp = TempDir::new().unwrap();
        let a = write_png(tmp.path(), "a.png", 4, 4);
        let b = write_png(tmp.path(), "b.png", 4, 4);
        let out = tmp.path().join("out");

        let backend = MockBackend::new();
        let outcomes = edit_files(
            &backend,
            &[a, b],
            &EditSettings::default(),
            &Destination::Directory(out.clone()),
            None,
        );

        assert_eq!(outcomes.len(), 2);
        assert!(matches!(&outcomes[0], EditOutcome::Written(p) if *p == out.join("a-edited.png")));
        assert!(matches!(&outcomes[1], EditOutcome::Written(p) if *p == out.join("b-edited.png")));
        assert!(out.join("a-edited.png").exists());
    }

    #[test]
    fn edit_files_reports_failures_and_continues() {
        let tmp = TempDir::new().unwrap();
        let good = write_png(tmp.path(), "good.png", 4, 4);
        let missing = tmp.path().join("missing.png");

        let backend = MockBackend::new();
        let (tx, rx) = mpsc::channel();
        let outcomes = edit_files(
            &backend,
            &[missing, good],
            &EditSettings::default(),
            &Destination::DataUri,
            Some(tx),
        );

        assert!(matches!(&outcomes[0], EditOutcome::Failed(EditError::Io(_))));
        assert!(matches!(&outcomes[1], EditOutcome::DataUri(uri) if uri.starts_with("data:image/png;base64,")));

        let events: Vec<EditEvent> = rx.iter().collect();
        assert!(events.iter().any(|e| matches!(e, EditEvent::Failed { index: 0, .. })));
        assert!(events.iter().any(|e| matches!(e, EditEvent::Finished { index: 1, .. })));
    }

    #[test]
    fn apply_image_edits_uses_real_backend() {
        let source = SourceImage::new("g.png", "image/png", gradient_png(8, 8));
        let encoded = apply_image_edits(&source, &EditSettings::default()).unwrap();
        assert_eq!(encoded.mime, "image/png");
        assert_eq!(image::load_from_memory(&encoded.bytes).unwrap().width(), 8);
    }

    #[test]
    fn missing_font_file_is_watermark_resource_error() {
        let mut settings = EditSettings::default();
        settings.watermark.enabled = true;
        settings.watermark.font = Some(PathBuf::from("/nonexistent/font.ttf"));
        assert!(matches!(
            backend_for(&settings),
            Err(EditError::WatermarkResource { .. })
        ));
    }

    #[test]
    fn font_is_not_loaded_without_a_text_mark() {
        let mut settings = EditSettings::default();
        settings.watermark.font = Some(PathBuf::from("/nonexistent/font.ttf"));
        assert!(backend_for(&settings).is_ok());

        settings.watermark.enabled = true;
        settings.watermark.kind = WatermarkKind::Image;
        settings.watermark.image = Some("logo.png".into());
        assert!(backend_for(&settings).is_ok());
    }
}
