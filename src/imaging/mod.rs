//! Image processing, statically linked with no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode / encode** | `image` codecs (rav1e for AVIF output, libwebp for lossy WebP) |
//! | **Pre-compress** | Lanczos3 downscale + re-encode in the source format |
//! | **Adjust** | CSS filter primitives evaluated per pixel ([`Filter`]) |
//! | **Text watermark** | `ab_glyph` + `imageproc` glyph rasterization |
//! | **Image watermark** | Lanczos3 scale + source-over composite |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for watermark geometry and size ceilings (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Filter / Surface**: The colour filter chain and the RGBA raster it runs on
//! - **Backend**: [`RasterBackend`] trait + [`RustBackend`]
//! - **Operations**: The pipeline stages, combining calculations + backend

pub mod backend;
mod calculations;
pub mod filter;
pub mod operations;
mod params;
pub mod rust_backend;
pub mod surface;

pub use backend::{BackendError, RasterBackend};
pub use filter::{Filter, FilterPrimitive};
pub use operations::{
    Placement, apply_adjustments, apply_watermark, compress_source, decode_source, encode_surface,
};
pub use params::{
    Adjustments, Align, Alpha, CompressParams, ImageDrawParams, Mark, OutputFormat, Point,
    Quality, TextDrawParams, Watermark, WatermarkPosition,
};
pub use rust_backend::RustBackend;
pub use surface::{Surface, SurfaceError};
