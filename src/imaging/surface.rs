//! The pixel surface a single invocation draws on.
//!
//! A [`Surface`] is a fixed-size, unpremultiplied RGBA8 raster. Its size is
//! set once at creation and never changes. Every draw takes its paint
//! [`Alpha`] as an argument; the surface itself holds no drawing state.

use super::filter::Filter;
use super::params::Alpha;
use image::{Rgba, RgbaImage};
use thiserror::Error;

/// Largest surface we agree to allocate (pixels).
pub const MAX_SURFACE_PIXELS: u64 = 1 << 28;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("cannot allocate a {width}x{height} surface")]
pub struct SurfaceError {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    pixels: RgbaImage,
}

impl Surface {
    /// Allocate a transparent surface.
    ///
    /// Fails for zero-sized surfaces and for sizes above
    /// [`MAX_SURFACE_PIXELS`].
    pub fn new(width: u32, height: u32) -> Result<Self, SurfaceError> {
        let pixels = width as u64 * height as u64;
        if pixels == 0 || pixels > MAX_SURFACE_PIXELS {
            return Err(SurfaceError { width, height });
        }
        Ok(Self {
            pixels: RgbaImage::new(width, height),
        })
    }

    /// A surface with the same dimensions as this one, for scratch work.
    pub fn blank_like(&self) -> Result<Self, SurfaceError> {
        Self::new(self.width(), self.height())
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Reset every pixel to transparent black.
    pub fn clear(&mut self) {
        for px in self.pixels.pixels_mut() {
            *px = Rgba([0, 0, 0, 0]);
        }
    }

    /// Replace this surface's pixels with `other`'s. Sizes must match.
    pub fn copy_from(&mut self, other: &Surface) {
        debug_assert_eq!(self.dimensions(), other.dimensions());
        self.pixels.copy_from_slice(other.pixels.as_raw());
    }

    /// Source-over `src` with its top-left at `(x, y)`, scaled by `alpha`.
    ///
    /// Pixels falling outside the surface are clipped.
    pub fn draw(&mut self, src: &RgbaImage, x: i64, y: i64, alpha: Alpha) {
        let a = alpha.value();
        if a <= 0.0 {
            return;
        }
        let (w, h) = (self.width() as i64, self.height() as i64);
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = (x + src.width() as i64).min(w);
        let y1 = (y + src.height() as i64).min(h);
        for dy in y0..y1 {
            for dx in x0..x1 {
                let s = *src.get_pixel((dx - x) as u32, (dy - y) as u32);
                let d = self.pixels.get_pixel_mut(dx as u32, dy as u32);
                *d = blend_over(*d, s, a);
            }
        }
    }

    /// Fill this surface with `src` passed through `filter`.
    ///
    /// This is the filtered draw onto a fresh scratch surface: `src` is only
    /// read, so the filter always sees unfiltered input.
    pub fn draw_filtered(&mut self, src: &Surface, filter: &Filter) {
        debug_assert_eq!(self.dimensions(), src.dimensions());
        for (dst, s) in self.pixels.pixels_mut().zip(src.pixels.pixels()) {
            *dst = filter.apply(*s);
        }
    }
}

/// Unpremultiplied source-over with an extra global alpha.
fn blend_over(dst: Rgba<u8>, src: Rgba<u8>, alpha: f32) -> Rgba<u8> {
    let sa = src[3] as f32 / 255.0 * alpha;
    if sa <= 0.0 {
        return dst;
    }
    if sa >= 1.0 {
        return Rgba([src[0], src[1], src[2], 255]);
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    let mut out = [0u8; 4];
    for c in 0..3 {
        let v = (src[c] as f32 * sa + dst[c] as f32 * da * (1.0 - sa)) / out_a;
        out[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgba(out)
}
