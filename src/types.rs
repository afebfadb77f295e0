//! Shared types handed across the pipeline boundary.
//!
//! [`SourceImage`] is what the caller supplies (raw bytes plus MIME type),
//! [`EncodedImage`] is what an invocation returns. [`WatermarkSource`] is the
//! external reference an image watermark is loaded from.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::path::{Path, PathBuf};

/// A raw image file as received from the caller.
///
/// The MIME type is trusted: callers are expected to have checked it starts
/// with `image/` before handing the file to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    /// Display name (usually the file name).
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl SourceImage {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    /// Read a file from disk, sniffing the MIME type from its content.
    ///
    /// Falls back to the file extension when the content is not recognised,
    /// and to `application/octet-stream` when neither helps. Nothing is
    /// decoded here.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let mime = sniff_mime(path, &bytes);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { name, mime, bytes })
    }

    /// File name without its extension, used to name outputs.
    pub fn stem(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.name)
    }
}

fn sniff_mime(path: &Path, bytes: &[u8]) -> String {
    image::guess_format(bytes)
        .ok()
        .or_else(|| image::ImageFormat::from_path(path).ok())
        .map(|f| f.to_mime_type().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

/// The final product of one invocation: encoded bytes and their MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl EncodedImage {
    /// Render as a self-contained `data:` URI.
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }

    /// Preferred file extension for the encoded MIME type.
    pub fn extension(&self) -> &'static str {
        image::ImageFormat::from_mime_type(&self.mime)
            .and_then(|f| f.extensions_str().first().copied())
            .unwrap_or("bin")
    }
}

/// Where an image watermark comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatermarkSource {
    /// A file on disk.
    Path(PathBuf),
    /// An inline `data:<mime>;base64,<payload>` URI, kept undecoded until load.
    DataUri(String),
}

impl WatermarkSource {
    /// Interpret a settings string: `data:` URIs stay inline, anything else is a path.
    pub fn parse(reference: &str) -> Self {
        if reference.starts_with("data:") {
            Self::DataUri(reference.to_string())
        } else {
            Self::Path(PathBuf::from(reference))
        }
    }

    /// Resolve relative paths against `base` (the settings file's directory).
    pub fn relative_to(self, base: &Path) -> Self {
        match self {
            Self::Path(p) if p.is_relative() => Self::Path(base.join(p)),
            other => other,
        }
    }
}

impl std::fmt::Display for WatermarkSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Path(p) => write!(f, "{}", p.display()),
            Self::DataUri(uri) => {
                let header = uri.split(',').next().unwrap_or("data:");
                write!(f, "{header},...")
            }
        }
    }
}

/// Error returned when a `data:` URI cannot be decoded.
#[derive(Debug, thiserror::Error)]
pub enum DataUriError {
    #[error("not a data URI")]
    MissingScheme,
    #[error("data URI has no ',' separator")]
    MissingPayload,
    #[error("only base64 data URIs are supported")]
    NotBase64,
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Split a base64 `data:` URI into its MIME type and decoded payload.
///
/// An empty media type defaults to `text/plain` per RFC 2397.
pub fn decode_data_uri(uri: &str) -> Result<(String, Vec<u8>), DataUriError> {
    let rest = uri.strip_prefix("data:").ok_or(DataUriError::MissingScheme)?;
    let (header, payload) = rest.split_once(',').ok_or(DataUriError::MissingPayload)?;
    let media = header
        .strip_suffix(";base64")
        .ok_or(DataUriError::NotBase64)?;
    let mime = match media.split(';').next() {
        Some(m) if !m.is_empty() => m.to_string(),
        _ => "text/plain".to_string(),
    };
    Ok((mime, STANDARD.decode(payload.trim())?))
}
