//! CSS-style colour filter primitives.
//!
//! A [`Filter`] is an ordered chain of primitives with the semantics of the
//! CSS Filter Effects shorthand functions. Each primitive works on
//! unpremultiplied sRGB channels in `[0, 1]` and clamps its output before the
//! next one runs.
//!
//! Vibrance has no CSS primitive. It is approximated as one extra
//! `saturate(1 + vibrance / 200)` pass; this is not a selective (low-saturation
//! or skin-tone aware) vibrance.

use super::params::Adjustments;
use image::Rgba;
use std::fmt;

// Rec. 709 luminance coefficients used by feColorMatrix.
const LUM_R: f32 = 0.213;
const LUM_G: f32 = 0.715;
const LUM_B: f32 = 0.072;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterPrimitive {
    Opacity(f32),
    Brightness(f32),
    Contrast(f32),
    Saturate(f32),
    /// Degrees.
    HueRotate(f32),
}

type Matrix = [[f32; 3]; 3];

fn saturate_matrix(s: f32) -> Matrix {
    [
        [LUM_R + (1.0 - LUM_R) * s, LUM_G - LUM_G * s, LUM_B - LUM_B * s],
        [LUM_R - LUM_R * s, LUM_G + (1.0 - LUM_G) * s, LUM_B - LUM_B * s],
        [LUM_R - LUM_R * s, LUM_G - LUM_G * s, LUM_B + (1.0 - LUM_B) * s],
    ]
}

fn hue_rotate_matrix(degrees: f32) -> Matrix {
    let (sin, cos) = degrees.to_radians().sin_cos();
    [
        [
            LUM_R + cos * (1.0 - LUM_R) - sin * LUM_R,
            LUM_G - cos * LUM_G - sin * LUM_G,
            LUM_B - cos * LUM_B + sin * (1.0 - LUM_B),
        ],
        [
            LUM_R - cos * LUM_R + sin * 0.143,
            LUM_G + cos * (1.0 - LUM_G) + sin * 0.140,
            LUM_B - cos * LUM_B - sin * 0.283,
        ],
        [
            LUM_R - cos * LUM_R - sin * (1.0 - LUM_R),
            LUM_G - cos * LUM_G + sin * LUM_G,
            LUM_B + cos * (1.0 - LUM_B) + sin * LUM_B,
        ],
    ]
}

fn apply_matrix(m: &Matrix, px: &mut [f32; 4]) {
    let [r, g, b, _] = *px;
    for (row, channel) in m.iter().zip(px.iter_mut()) {
        *channel = (row[0] * r + row[1] * g + row[2] * b).clamp(0.0, 1.0);
    }
}

impl FilterPrimitive {
    fn apply(&self, px: &mut [f32; 4]) {
        match *self {
            FilterPrimitive::Opacity(a) => {
                px[3] = (px[3] * a.clamp(0.0, 1.0)).clamp(0.0, 1.0);
            }
            FilterPrimitive::Brightness(b) => {
                for c in &mut px[..3] {
                    *c = (*c * b.max(0.0)).clamp(0.0, 1.0);
                }
            }
            FilterPrimitive::Contrast(k) => {
                let k = k.max(0.0);
                for c in &mut px[..3] {
                    *c = ((*c - 0.5) * k + 0.5).clamp(0.0, 1.0);
                }
            }
            FilterPrimitive::Saturate(s) => apply_matrix(&saturate_matrix(s.max(0.0)), px),
            FilterPrimitive::HueRotate(deg) => apply_matrix(&hue_rotate_matrix(deg), px),
        }
    }
}

impl fmt::Display for FilterPrimitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterPrimitive::Opacity(v) => write!(f, "opacity({v})"),
            FilterPrimitive::Brightness(v) => write!(f, "brightness({v})"),
            FilterPrimitive::Contrast(v) => write!(f, "contrast({v})"),
            FilterPrimitive::Saturate(v) => write!(f, "saturate({v})"),
            FilterPrimitive::HueRotate(v) => write!(f, "hue-rotate({v}deg)"),
        }
    }
}

/// An ordered chain of filter primitives.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filter {
    primitives: Vec<FilterPrimitive>,
}

impl Filter {
    /// Build the adjustment chain: opacity, brightness, contrast, saturate,
    /// hue-rotate, then the vibrance saturate pass when vibrance is non-zero.
    pub fn from_adjustments(adj: &Adjustments) -> Self {
        let mut primitives = vec![
            FilterPrimitive::Opacity(adj.opacity / 100.0),
            FilterPrimitive::Brightness(adj.brightness / 100.0),
            FilterPrimitive::Contrast(adj.contrast / 100.0),
            FilterPrimitive::Saturate(adj.saturation / 100.0),
            FilterPrimitive::HueRotate(adj.hue),
        ];
        if adj.vibrance != 0.0 {
            primitives.push(FilterPrimitive::Saturate(1.0 + adj.vibrance / 200.0));
        }
        Self { primitives }
    }

    pub fn primitives(&self) -> &[FilterPrimitive] {
        &self.primitives
    }

    /// Filter one pixel.
    pub fn apply(&self, px: Rgba<u8>) -> Rgba<u8> {
        let mut v = px.0.map(|c| c as f32 / 255.0);
        for primitive in &self.primitives {
            primitive.apply(&mut v);
        }
        Rgba(v.map(|c| (c * 255.0).round().clamp(0.0, 255.0) as u8))
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, p) in self.primitives.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{p}")?;
        }
        Ok(())
    }
}
