//! # Simple Edit
//!
//! A small image editing pipeline: adjust colours, stamp a watermark, and
//! re-encode, one image at a time.
//!
//! # Architecture: One Fixed Pipeline
//!
//! Every invocation runs the same five stages, strictly in order:
//!
//! ```text
//! 1. Compress   source file  →  smaller source file  (optional, compression < 100)
//! 2. Decode     source file  →  RGBA surface
//! 3. Adjust     surface      →  surface              (CSS-style filter chain)
//! 4. Watermark  surface      →  surface              (optional, text or image)
//! 5. Encode     surface      →  encoded bytes        (target or original format)
//! ```
//!
//! ```no_run
//! use simple_edit::config::EditSettings;
//! use simple_edit::pipeline::apply_image_edits;
//! use simple_edit::types::SourceImage;
//!
//! let source = SourceImage::open("photo.jpg".as_ref())?;
//! let settings = EditSettings {
//!     brightness: 110.0,
//!     ..EditSettings::default()
//! };
//! let edited = apply_image_edits(&source, &settings)?;
//! println!("{}", edited.to_data_uri());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`pipeline`] | The entry points: single invocation, batch runner, progress events |
//! | [`imaging`] | Stages, filter chain, surface, and the raster backend trait |
//! | [`config`] | `EditSettings` TOML loading, layering, and validation |
//! | [`types`] | Source and encoded images, watermark references, data URIs |
//! | [`output`] | CLI output formatting for progress events and settings |
//!
//! # Design Decisions
//!
//! ## Alpha Is a Draw Parameter
//!
//! A canvas keeps a "global alpha" that every later draw inherits, which makes
//! it easy to forget to reset after a translucent watermark. Here a
//! [`Surface`](imaging::Surface) holds only pixels: every draw takes its
//! [`Alpha`](imaging::Alpha) as an argument, so nothing carries over.
//!
//! ## Backend Trait
//!
//! Codecs and glyph rendering sit behind [`RasterBackend`](imaging::RasterBackend).
//! Stage logic is tested against a recording mock; the production
//! [`RustBackend`](imaging::RustBackend) uses `image`, `imageproc`, `ab_glyph`
//! and a vendored libwebp, with a bundled font, so the binary has no system
//! dependencies.
//!
//! ## Vibrance Is Extra Saturation
//!
//! There is no CSS vibrance primitive. Vibrance is one more
//! `saturate(1 + vibrance / 200)` pass after the main chain: not selective,
//! but predictable and cheap.

pub mod config;
pub mod imaging;
pub mod output;
pub mod pipeline;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
