//! Edit settings.
//!
//! Handles loading, validating, and merging settings files. Settings are
//! layered: stock defaults are overridden by a settings file, which is in turn
//! overridden by command-line flags.
//!
//! ## Settings Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! opacity = 100             # Percent, 100 = unchanged
//! brightness = 100          # Percent, 100 = unchanged
//! contrast = 100            # Percent, 100 = unchanged
//! saturation = 100          # Percent, 100 = unchanged
//! hue = 0                   # Degrees of rotation
//! vibrance = 0              # Signed percent
//!
//! compression = 100         # Pre-compression quality, 100 = skip
//! quality = 92              # Final encode quality (0-100)
//! format = "original"       # original, jpeg, png, webp, gif, bmp, tiff, avif
//!
//! [watermark]
//! enabled = false
//! type = "text"             # text or image
//! text = "Watermark"
//! # image = "logo.png"      # Path (relative to the settings file) or data: URI
//! position = "bottom-right"
//! size = 5                  # Percent of image width
//! opacity = 50              # Percent
//! # font = "fonts/Inter.ttf"
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! ## Partial Configuration
//!
//! Settings files are sparse — override just the values you want:
//!
//! ```toml
//! brightness = 120
//!
//! [watermark]
//! enabled = true
//! text = "© Jane Doe"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{Adjustments, Alpha, Mark, OutputFormat, Quality, Watermark, WatermarkPosition};
use crate::types::WatermarkSource;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Settings validation error: {0}")]
    Validation(String),
}

/// Settings for one edit invocation.
///
/// All fields have defaults that leave the image untouched apart from the
/// final re-encode. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EditSettings {
    pub opacity: f32,
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub hue: f32,
    pub vibrance: f32,
    /// Pre-compression quality percent; 100 skips the compressor.
    pub compression: u32,
    /// Final encode quality percent.
    pub quality: u32,
    pub format: OutputFormat,
    pub watermark: WatermarkConfig,
    /// Parallel processing settings (used by batch runs only).
    pub processing: ProcessingConfig,
}

impl Default for EditSettings {
    fn default() -> Self {
        let adj = Adjustments::default();
        Self {
            opacity: adj.opacity,
            brightness: adj.brightness,
            contrast: adj.contrast,
            saturation: adj.saturation,
            hue: adj.hue,
            vibrance: adj.vibrance,
            compression: 100,
            quality: Quality::default().value(),
            format: OutputFormat::Original,
            watermark: WatermarkConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl EditSettings {
    /// Validate values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("opacity", self.opacity, 0.0, 100.0)?;
        for (name, value) in [
            ("brightness", self.brightness),
            ("contrast", self.contrast),
            ("saturation", self.saturation),
        ] {
            check_range(name, value, 0.0, 200.0)?;
        }
        check_range("hue", self.hue, -360.0, 360.0)?;
        check_range("vibrance", self.vibrance, -100.0, 100.0)?;
        if self.compression > 100 {
            return Err(ConfigError::Validation("compression must be 0-100".into()));
        }
        if self.quality > 100 {
            return Err(ConfigError::Validation("quality must be 0-100".into()));
        }
        self.watermark.validate()
    }

    pub fn adjustments(&self) -> Adjustments {
        Adjustments {
            opacity: self.opacity,
            brightness: self.brightness,
            contrast: self.contrast,
            saturation: self.saturation,
            hue: self.hue,
            vibrance: self.vibrance,
        }
    }

    pub fn quality(&self) -> Quality {
        Quality::new(self.quality)
    }
}

fn check_range(name: &str, value: f32, min: f32, max: f32) -> Result<(), ConfigError> {
    if !(min..=max).contains(&value) {
        return Err(ConfigError::Validation(format!(
            "{name} must be {min}-{max}, got {value}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatermarkKind {
    #[default]
    Text,
    Image,
}

/// Watermark settings as written in a settings file.
///
/// Flat on purpose: both `text` and `image` may be present, and `type`
/// picks one. [`WatermarkConfig::resolve`] turns it into a [`Watermark`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatermarkConfig {
    pub enabled: bool,
    #[serde(rename = "type")]
    pub kind: WatermarkKind,
    pub text: String,
    /// Path to an image, or an inline `data:` URI.
    pub image: Option<String>,
    pub position: WatermarkPosition,
    /// Percent of the image width.
    pub size: f32,
    /// Percent.
    pub opacity: f32,
    /// Font for text marks. The bundled DejaVu Sans is used when absent.
    pub font: Option<PathBuf>,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            kind: WatermarkKind::Text,
            text: "Watermark".to_string(),
            image: None,
            position: WatermarkPosition::BottomRight,
            size: 5.0,
            opacity: 50.0,
            font: None,
        }
    }
}

impl WatermarkConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("watermark.size", self.size, 1.0, 100.0)?;
        check_range("watermark.opacity", self.opacity, 0.0, 100.0)?;
        if !self.enabled {
            return Ok(());
        }
        match self.kind {
            WatermarkKind::Text if self.text.trim().is_empty() => Err(ConfigError::Validation(
                "watermark.text must not be empty for text watermarks".into(),
            )),
            WatermarkKind::Image if self.image.as_deref().is_none_or(str::is_empty) => {
                Err(ConfigError::Validation(
                    "watermark.image is required for image watermarks".into(),
                ))
            }
            _ => Ok(()),
        }
    }

    /// The watermark to composite, or `None` when disabled.
    ///
    /// Out-of-range sizes and opacities pass through untouched; only an image
    /// mark without an image is rejected. Range checks belong to
    /// [`validate`](Self::validate).
    pub fn resolve(&self) -> Result<Option<Watermark>, ConfigError> {
        if !self.enabled {
            return Ok(None);
        }
        let mark = match (self.kind, self.image.as_deref()) {
            (WatermarkKind::Text, _) => Mark::Text {
                text: self.text.clone(),
            },
            (WatermarkKind::Image, Some(image)) if !image.is_empty() => Mark::Image {
                source: WatermarkSource::parse(image),
            },
            (WatermarkKind::Image, _) => {
                return Err(ConfigError::Validation(
                    "watermark.image is required for image watermarks".into(),
                ));
            }
        };
        Ok(Some(Watermark {
            mark,
            position: self.position,
            size: self.size,
            opacity: Alpha::from_percent(self.opacity),
        }))
    }

    /// Resolve relative `image` and `font` paths against `base`.
    fn relative_to(&mut self, base: &Path) {
        if let Some(image) = self.image.as_mut() {
            if let WatermarkSource::Path(path) = WatermarkSource::parse(image).relative_to(base) {
                *image = path.to_string_lossy().into_owned();
            }
        }
        if let Some(font) = self.font.as_mut() {
            if font.is_relative() {
                *font = base.join(&*font);
            }
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel edit workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Settings loading, merging, and validation
// =============================================================================

/// Returns the stock default settings as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(EditSettings::default()).expect("default settings must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a settings file as a raw TOML value.
///
/// Unlike a directory lookup, the file must exist: asking for a settings
/// file that is not there is an error.
pub fn load_raw_settings(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(value)
}

/// Merge overlays onto a base value in order, then deserialize and validate.
pub fn resolve_settings(
    base: toml::Value,
    overlays: impl IntoIterator<Item = toml::Value>,
) -> Result<EditSettings, ConfigError> {
    let merged = overlays.into_iter().fold(base, merge_toml);
    let settings: EditSettings = merged.try_into()?;
    settings.validate()?;
    Ok(settings)
}

/// Load settings: stock defaults, then the optional settings file, then
/// `overrides` (e.g. from command-line flags).
///
/// Relative watermark image and font paths in the file are resolved against
/// the file's directory.
pub fn load_settings(
    path: Option<&Path>,
    overrides: Option<toml::Value>,
) -> Result<EditSettings, ConfigError> {
    let file = path.map(load_raw_settings).transpose()?;
    let mut settings = resolve_settings(stock_defaults_value(), file.into_iter().chain(overrides))?;
    if let Some(dir) = path.and_then(Path::parent) {
        settings.watermark.relative_to(dir);
    }
    Ok(settings)
}

/// Returns a fully-commented stock settings file with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Simple Edit Settings
# ====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults, which leave the image unchanged
# apart from the final re-encode.
#
# Command-line flags override values from this file.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Adjustments
# ---------------------------------------------------------------------------
# Percentages: 100 leaves the image unchanged.
opacity = 100       # 0-100
brightness = 100    # 0-200
contrast = 100      # 0-200
saturation = 100    # 0-200

# Hue rotation in degrees (-360 to 360).
hue = 0

# Extra saturation, -100 to 100. 0 = off.
vibrance = 0

# ---------------------------------------------------------------------------
# Output
# ---------------------------------------------------------------------------
# Pre-compression quality (0-100). Images are also scaled to at most
# 4096 px per side and, best effort, 10 MB. 100 skips this step.
compression = 100

# Final encode quality (0 = worst, 100 = best). Lossless formats ignore it.
quality = 92

# original keeps the input's format.
# Others: jpeg, png, webp, gif, bmp, tiff, avif
format = "original"

# ---------------------------------------------------------------------------
# Watermark
# ---------------------------------------------------------------------------
[watermark]
enabled = false

# text or image
type = "text"

# Drawn white with a black outline.
text = "Watermark"

# Image to overlay when type = "image": a path relative to this file,
# an absolute path, or a data: URI.
# image = "logo.png"

# top-left, top-center, top-right,
# middle-left, center, middle-right,
# bottom-left, bottom-center, bottom-right
position = "bottom-right"

# Percent of the image width (font size for text, width for images). 1-100.
size = 5

# Percent, 0-100.
opacity = 50

# TrueType/OpenType font for text. Defaults to the bundled DejaVu Sans.
# font = "fonts/MyFont.ttf"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers when editing several files.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
