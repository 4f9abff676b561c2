//! Core types for the rasterizer

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// 8-bit RGBA color. Alpha is coverage: 255 opaque, 0 fully transparent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    #[serde(default = "opaque")]
    pub a: u8,
}

fn opaque() -> u8 {
    255
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

impl Color {
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0, a: 255 };
    pub const WHITE: Color = Color { r: 255, g: 255, b: 255, a: 255 };
    pub const RED: Color = Color { r: 255, g: 0, b: 0, a: 255 };
    pub const GREEN: Color = Color { r: 0, g: 255, b: 0, a: 255 };
    pub const BLUE: Color = Color { r: 0, g: 0, b: 255, a: 255 };
    pub const TRANSPARENT: Color = Color { r: 0, g: 0, b: 0, a: 0 };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn with_alpha(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Convert to [u8; 4] for the framebuffer (RGBA)
    pub fn to_bytes(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Texture modulation: `(c * (t + 1)) >> 8` per channel including alpha.
    /// A white tint leaves the texel unchanged.
    #[inline]
    pub fn modulate(self, tint: Color) -> Self {
        #[inline]
        fn ch(c: u8, t: u8) -> u8 {
            ((c as u32 * (t as u32 + 1)) >> 8) as u8
        }
        Self {
            r: ch(self.r, tint.r),
            g: ch(self.g, tint.g),
            b: ch(self.b, tint.b),
            a: ch(self.a, tint.a),
        }
    }

    /// Move toward `target` by `amount` in 0..=256 (256 = fully `target`).
    /// Alpha is kept.
    #[inline]
    pub fn fade(self, target: Color, amount: u32) -> Self {
        let f = amount.min(256);
        let inv = 256 - f;
        #[inline]
        fn ch(c: u8, t: u8, inv: u32, f: u32) -> u8 {
            ((c as u32 * inv + t as u32 * f) >> 8) as u8
        }
        Self {
            r: ch(self.r, target.r, inv, f),
            g: ch(self.g, target.g, inv, f),
            b: ch(self.b, target.b, inv, f),
            a: self.a,
        }
    }
}

bitflags! {
    /// Per-triangle render switches, chosen by the filler dispatch
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct RenderFlags: u8 {
        const TEXTURED  = 1 << 0;
        const MIPMAPPED = 1 << 1;
        const FOGGED    = 1 << 2;
        const BLENDED   = 1 << 3;
    }
}

/// Distance fog shared by every triangle of a frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fog {
    pub color: Color,
    pub near: f32,
    pub far: f32,
}

impl Default for Fog {
    fn default() -> Self {
        Self {
            color: Color::new(96, 104, 128),
            near: 4.0,
            far: 32.0,
        }
    }
}

impl Fog {
    pub fn new(color: Color, near: f32, far: f32) -> Self {
        Self { color, near, far }
    }

    /// Fog intensity in [0, 1]: zero before `near`, one past `far`,
    /// rising quadratically in between
    pub fn factor(&self, depth: f32) -> f32 {
        if self.far <= self.near {
            return if depth >= self.far { 1.0 } else { 0.0 };
        }
        let t = ((depth - self.near) / (self.far - self.near)).clamp(0.0, 1.0);
        t * t
    }

    /// `factor` quantised to the 0..=256 scale used by `Color::fade`
    pub fn amount(&self, depth: f32) -> u32 {
        (self.factor(depth) * 256.0) as u32
    }
}
