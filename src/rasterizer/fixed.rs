//! Fixed-point formats for the integer span filler
//!
//! Two formats are used while walking a span:
//! - 16.16 for texel coordinates and view depth (`FixedTexel`)
//! - 2.30 for reciprocal depth `w = near / z` (`FixedRecip`), which always
//!   lies in (0, 1] once the near plane has been clipped
//!
//! Perspective division happens in 64-bit so the 2.30 shift never overflows.

use std::ops::{Add, AddAssign, Sub};

/// Fractional bits of texel / depth values (65536 = 1.0)
pub const TEXEL_FRAC: u32 = 16;
const TEXEL_ONE: i32 = 1 << TEXEL_FRAC;

/// Fractional bits of reciprocal depth (2^30 = 1.0)
pub const W_FRAC: u32 = 30;
const W_ONE: i64 = 1 << W_FRAC;

/// 16.16 fixed-point value in 32-bit storage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct FixedTexel(pub i32);

impl FixedTexel {
    pub const ZERO: FixedTexel = FixedTexel(0);
    pub const ONE: FixedTexel = FixedTexel(TEXEL_ONE);

    #[inline]
    pub fn from_int(n: i32) -> Self {
        FixedTexel(n << TEXEL_FRAC)
    }

    /// Create from f32 (saturates at the i32 range)
    #[inline]
    pub fn from_f32(f: f32) -> Self {
        FixedTexel((f * TEXEL_ONE as f32) as i32)
    }

    #[inline]
    pub fn to_f32(self) -> f32 {
        self.0 as f32 / TEXEL_ONE as f32
    }

    /// Floor to integer (arithmetic shift rounds toward -inf, so wrap
    /// masking stays correct for negative coordinates)
    #[inline]
    pub fn floor(self) -> i32 {
        self.0 >> TEXEL_FRAC
    }
}

impl Add for FixedTexel {
    type Output = Self;
    #[inline]
    fn add(self, other: Self) -> Self {
        FixedTexel(self.0.wrapping_add(other.0))
    }
}

impl AddAssign for FixedTexel {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.wrapping_add(other.0);
    }
}

impl Sub for FixedTexel {
    type Output = Self;
    #[inline]
    fn sub(self, other: Self) -> Self {
        FixedTexel(self.0.wrapping_sub(other.0))
    }
}

/// 2.30 fixed-point reciprocal depth
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct FixedRecip(pub i32);

impl FixedRecip {
    pub const ONE: FixedRecip = FixedRecip(W_ONE as i32);

    /// Create from f32, clamped to the representable range (-2, 2)
    #[inline]
    pub fn from_f32(f: f32) -> Self {
        let scaled = (f as f64 * W_ONE as f64).clamp(i32::MIN as f64, i32::MAX as f64);
        FixedRecip(scaled as i32)
    }

    #[inline]
    pub fn to_f32(self) -> f32 {
        (self.0 as f64 / W_ONE as f64) as f32
    }
}

impl AddAssign for FixedRecip {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.wrapping_add(other.0);
    }
}

/// Undo the `* w` premultiplication: `value / w`, both in fixed point.
/// A non-positive `w` yields zero instead of dividing.
#[inline]
pub fn perspective_div(value: FixedTexel, w: FixedRecip) -> FixedTexel {
    if w.0 <= 0 {
        return FixedTexel::ZERO;
    }
    let q = ((value.0 as i64) << W_FRAC) / w.0 as i64;
    FixedTexel(q.clamp(i32::MIN as i64, i32::MAX as i64) as i32)
}

/// View depth `near / w` in 16.16, saturating for tiny `w`
#[inline]
pub fn depth_from_recip(near: FixedTexel, w: FixedRecip) -> FixedTexel {
    if w.0 <= 0 {
        return FixedTexel(i32::MAX);
    }
    perspective_div(near, w)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texel_precision() {
        let a = FixedTexel::from_f32(3.25);
        assert_eq!(a.floor(), 3);
        assert!((a.to_f32() - 3.25).abs() < 1.0 / 65536.0);
    }

    #[test]
    fn test_negative_floor_rounds_down() {
        assert_eq!(FixedTexel::from_f32(-0.5).floor(), -1);
        assert_eq!(FixedTexel::from_int(-3).floor(), -3);
    }

    #[test]
    fn test_recip_roundtrip() {
        let w = FixedRecip::from_f32(0.37);
        assert!((w.to_f32() - 0.37).abs() < 1e-6);
        assert_eq!(FixedRecip::from_f32(1.0), FixedRecip::ONE);
    }

    #[test]
    fn test_perspective_div_matches_float() {
        // u = 12.5 texels at w = 0.25 is stored premultiplied as 3.125
        let uw = FixedTexel::from_f32(12.5 * 0.25);
        let w = FixedRecip::from_f32(0.25);
        let u = perspective_div(uw, w);
        assert!((u.to_f32() - 12.5).abs() < 1e-3, "{}", u.to_f32());
    }

    #[test]
    fn test_perspective_div_guards_zero() {
        assert_eq!(perspective_div(FixedTexel::ONE, FixedRecip(0)), FixedTexel::ZERO);
        assert_eq!(depth_from_recip(FixedTexel::ONE, FixedRecip(0)).0, i32::MAX);
    }

    #[test]
    fn test_depth_from_recip() {
        // near 1, z 4 -> w 0.25 -> depth 4
        let d = depth_from_recip(FixedTexel::ONE, FixedRecip::from_f32(0.25));
        assert!((d.to_f32() - 4.0).abs() < 1e-3);
    }
}
