//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Edit
//!
//! Stage events are prefixed with the source name, since parallel invocations
//! interleave. Each batch entry ends with a positional result line:
//!
//! ```text
//! dawn.jpg: compressed 14.2 MB → 9.8 MB
//! dawn.jpg: decoded 6000x4000
//! dawn.jpg: filter opacity(1) brightness(1.1) contrast(1) saturate(1) hue-rotate(0deg)
//! dawn.jpg: text watermark at (5680, 3980), 300px wide
//! dawn.jpg: encoded image/webp, 1.4 MB
//! 001 dawn.jpg → out/dawn-edited.webp
//! 002 broken.png FAILED: Could not decode image: ...
//!
//! Edited 1 of 2 images
//! ```
//!
//! ## Check
//!
//! ```text
//! Adjustments
//!     opacity(1) brightness(1.1) contrast(1) saturate(1) hue-rotate(0deg)
//! Output
//!     compression: off
//!     quality: 92
//!     format: original
//! Watermark
//!     text "© Jane" bottom-right, size 5%, opacity 50%
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure — no I/O, no side effects.

use crate::config::{EditSettings, WatermarkKind};
use crate::imaging::Filter;
use crate::pipeline::{EditEvent, EditOutcome};

/// Human-readable byte size (binary units, one decimal).
pub fn format_bytes(bytes: usize) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

// ============================================================================
// Edit output
// ============================================================================

/// Format a single edit progress event as display lines.
pub fn format_edit_event(event: &EditEvent) -> Vec<String> {
    let line = match event {
        EditEvent::Compressed {
            name,
            original_bytes,
            compressed_bytes,
        } => format!(
            "{}: compressed {} \u{2192} {}",
            name,
            format_bytes(*original_bytes),
            format_bytes(*compressed_bytes)
        ),
        EditEvent::CompressionSkipped { name } => format!("{}: compression skipped", name),
        EditEvent::Decoded {
            name,
            width,
            height,
        } => format!("{}: decoded {}x{}", name, width, height),
        EditEvent::Adjusted { name, filter } => format!("{}: filter {}", name, filter),
        EditEvent::Watermarked {
            name,
            kind,
            x,
            y,
            width,
        } => format!(
            "{}: {} watermark at ({}, {}), {}px wide",
            name,
            kind,
            x.round(),
            y.round(),
            width.round()
        ),
        EditEvent::WatermarkSkipped { name } => format!("{}: no watermark", name),
        EditEvent::Encoded { name, mime, bytes } => {
            format!("{}: encoded {}, {}", name, mime, format_bytes(*bytes))
        }
        EditEvent::Finished {
            index,
            name,
            destination,
        } => format!("{:03} {} \u{2192} {}", index + 1, name, destination),
        EditEvent::Failed { index, name, error } => {
            format!("{:03} {} FAILED: {}", index + 1, name, error)
        }
    };
    vec![line]
}

/// Summary line after a batch.
pub fn format_batch_summary(outcomes: &[EditOutcome]) -> Vec<String> {
    let ok = outcomes.iter().filter(|o| !o.is_failure()).count();
    let noun = if outcomes.len() == 1 { "image" } else { "images" };
    vec![
        String::new(),
        format!("Edited {} of {} {}", ok, outcomes.len(), noun),
    ]
}

/// Print batch summary to stdout.
pub fn print_batch_summary(outcomes: &[EditOutcome]) {
    for line in format_batch_summary(outcomes) {
        println!("{}", line);
    }
}

// ============================================================================
// Check output
// ============================================================================

/// Format resolved settings for the `check` command.
pub fn format_settings(settings: &EditSettings) -> Vec<String> {
    let mut lines = vec![
        "Adjustments".to_string(),
        format!("    {}", Filter::from_adjustments(&settings.adjustments())),
        "Output".to_string(),
    ];
    if settings.compression >= 100 {
        lines.push("    compression: off".to_string());
    } else {
        lines.push(format!("    compression: {}", settings.compression));
    }
    lines.push(format!("    quality: {}", settings.quality));
    lines.push(format!("    format: {}", format_name(settings)));

    lines.push("Watermark".to_string());
    let wm = &settings.watermark;
    if !wm.enabled {
        lines.push("    disabled".to_string());
        return lines;
    }
    let what = match wm.kind {
        WatermarkKind::Text => format!("text {:?}", wm.text),
        WatermarkKind::Image => {
            let image = wm.image.as_deref().unwrap_or_default();
            // Inline images are long; show only the media type.
            match image.split_once(',') {
                Some((header, _)) if image.starts_with("data:") => format!("image {header},..."),
                _ => format!("image {}", image),
            }
        }
    };
    lines.push(format!(
        "    {} {}, size {}%, opacity {}%",
        what,
        position_name(wm),
        wm.size,
        wm.opacity
    ));
    if let Some(font) = &wm.font {
        lines.push(format!("    font: {}", font.display()));
    }
    lines
}

fn format_name(settings: &EditSettings) -> String {
    toml::Value::try_from(settings.format)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

fn position_name(wm: &crate::config::WatermarkConfig) -> String {
    toml::Value::try_from(wm.position)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

/// Print resolved settings to stdout.
pub fn print_settings(settings: &EditSettings) {
    for line in format_settings(settings) {
        println!("{}", line);
    }
}
