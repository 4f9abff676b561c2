//! Span fillers: the per-pixel inner loop
//!
//! A span is one horizontal run of pixels with perspective-premultiplied
//! attributes (`w`, `u*w`, `v*w`) and their per-pixel steps. Every pixel
//! divides by its own `w` before sampling, which keeps texturing
//! perspective-correct.
//!
//! The three fillers share one pixel-writing routine, so fog and blend
//! arithmetic is the same everywhere; they differ only in how attributes
//! are stepped across the span.

use super::fixed::{depth_from_recip, perspective_div, FixedRecip, FixedTexel};
use super::texture::Texture;
use super::types::{Color, Fog};
use crate::config::Arithmetic;

/// One scanline segment, `x_start..x_end`, attributes at the centre of
/// `x_start`. `uw`/`vw` are in texels of the bound mip level.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Span {
    pub x_start: i32,
    pub x_end: i32,
    pub w: f32,
    pub uw: f32,
    pub vw: f32,
    pub dw: f32,
    pub duw: f32,
    pub dvw: f32,
}

impl Span {
    pub fn len(&self) -> usize {
        (self.x_end - self.x_start).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.x_end <= self.x_start
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FillMode {
    pub textured: bool,
    pub fogged: bool,
    pub blended: bool,
}

/// Fog as seen from the fillers: depth comes back from `w` through the
/// camera near distance
#[derive(Debug, Clone, Copy)]
pub struct FogParams {
    pub fog: Fog,
    pub camera_near: f32,
    near_fx: i64,
    far_fx: i64,
    camera_near_fx: FixedTexel,
}

impl FogParams {
    pub fn new(fog: Fog, camera_near: f32) -> Self {
        Self {
            fog,
            camera_near,
            near_fx: FixedTexel::from_f32(fog.near).0 as i64,
            far_fx: FixedTexel::from_f32(fog.far).0 as i64,
            camera_near_fx: FixedTexel::from_f32(camera_near),
        }
    }

    /// Fog amount (0..=256) at reciprocal depth `w`
    #[inline]
    pub fn amount(&self, w: f32) -> u32 {
        if w <= 0.0 {
            return 256;
        }
        self.fog.amount(self.camera_near / w)
    }

    /// Integer version of `amount`: quadratic in `t` with `t` on a 0..=256 scale
    #[inline]
    pub fn amount_fixed(&self, w: FixedRecip) -> u32 {
        let depth = depth_from_recip(self.camera_near_fx, w).0 as i64;
        let range = self.far_fx - self.near_fx;
        if range <= 0 {
            return if depth >= self.far_fx { 256 } else { 0 };
        }
        let t = (((depth - self.near_fx) << 8) / range).clamp(0, 256);
        ((t * t) >> 8) as u32
    }
}

/// Everything a filler needs besides the span itself
pub struct FillContext<'a> {
    /// Mip level to sample, when textured
    pub texture: Option<&'a Texture>,
    /// Modulates texels, or is the fill colour when untextured
    pub color: Color,
    pub mode: FillMode,
    pub fog: FogParams,
}

impl FillContext<'_> {
    #[inline]
    fn shade(&self, tx: i32, ty: i32) -> Color {
        match self.texture {
            Some(tex) if self.mode.textured => tex.texel(tx, ty).modulate(self.color),
            _ => self.color,
        }
    }
}

/// Fills one span of a framebuffer row (RGBA bytes)
pub trait SpanFiller {
    fn name(&self) -> &'static str;
    fn fill_span(&self, row: &mut [u8], span: &Span, ctx: &FillContext);
}

/// Filler for the configured arithmetic
pub fn filler_for(arithmetic: Arithmetic) -> Box<dyn SpanFiller> {
    match arithmetic {
        Arithmetic::Float => Box::new(FloatFiller),
        Arithmetic::FloatWide => Box::new(WideFiller),
        Arithmetic::Fixed => Box::new(FixedFiller),
    }
}

/// Write one pixel: fog first, then blend into the destination.
/// Blending is `(dst * (255 - a) + src * a) / 255`; `a == 0` leaves the
/// pixel alone. Written alpha is always 255.
#[inline(always)]
fn write_pixel<const FOG: bool, const BLEND: bool>(
    px: &mut [u8],
    src: Color,
    fog_color: Color,
    fog_amount: u32,
) {
    let c = if FOG { src.fade(fog_color, fog_amount) } else { src };
    if BLEND && c.a < 255 {
        let a = c.a as u32;
        if a == 0 {
            return;
        }
        let inv = 255 - a;
        px[0] = ((px[0] as u32 * inv + c.r as u32 * a) / 255) as u8;
        px[1] = ((px[1] as u32 * inv + c.g as u32 * a) / 255) as u8;
        px[2] = ((px[2] as u32 * inv + c.b as u32 * a) / 255) as u8;
    } else {
        px[0] = c.r;
        px[1] = c.g;
        px[2] = c.b;
    }
    px[3] = 255;
}

macro_rules! dispatch_mode {
    ($f:ident, $mode:expr, $($arg:expr),*) => {
        match ($mode.textured, $mode.fogged, $mode.blended) {
            (false, false, false) => $f::<false, false, false>($($arg),*),
            (false, false, true) => $f::<false, false, true>($($arg),*),
            (false, true, false) => $f::<false, true, false>($($arg),*),
            (false, true, true) => $f::<false, true, true>($($arg),*),
            (true, false, false) => $f::<true, false, false>($($arg),*),
            (true, false, true) => $f::<true, false, true>($($arg),*),
            (true, true, false) => $f::<true, true, false>($($arg),*),
            (true, true, true) => $f::<true, true, true>($($arg),*),
        }
    };
}

/// Scalar floating-point reference. Attributes are evaluated as
/// `start + delta * i` rather than accumulated, so results do not depend
/// on how the span is chunked.
pub struct FloatFiller;

#[inline(always)]
fn float_pixel<const TEX: bool, const FOG: bool, const BLEND: bool>(
    px: &mut [u8],
    w: f32,
    uw: f32,
    vw: f32,
    ctx: &FillContext,
) {
    let src = if TEX {
        let inv = 1.0 / w;
        ctx.shade((uw * inv).floor() as i32, (vw * inv).floor() as i32)
    } else {
        ctx.color
    };
    let amount = if FOG { ctx.fog.amount(w) } else { 0 };
    write_pixel::<FOG, BLEND>(px, src, ctx.fog.fog.color, amount);
}

fn fill_float<const TEX: bool, const FOG: bool, const BLEND: bool>(
    row: &mut [u8],
    span: &Span,
    ctx: &FillContext,
) {
    let start = span.x_start as usize;
    for i in 0..span.len() {
        let t = i as f32;
        let x = start + i;
        float_pixel::<TEX, FOG, BLEND>(
            &mut row[x * 4..x * 4 + 4],
            span.w + span.dw * t,
            span.uw + span.duw * t,
            span.vw + span.dvw * t,
            ctx,
        );
    }
}

impl SpanFiller for FloatFiller {
    fn name(&self) -> &'static str {
        "float"
    }

    fn fill_span(&self, row: &mut [u8], span: &Span, ctx: &FillContext) {
        if span.is_empty() {
            return;
        }
        dispatch_mode!(fill_float, ctx.mode, row, span, ctx);
    }
}

/// Floating point in 4-pixel chunks: attributes for a whole chunk are
/// computed together so the compiler can keep them in vector registers.
/// Produces exactly the same pixels as `FloatFiller`.
pub struct WideFiller;

const LANES: usize = 4;

fn fill_wide<const TEX: bool, const FOG: bool, const BLEND: bool>(
    row: &mut [u8],
    span: &Span,
    ctx: &FillContext,
) {
    let start = span.x_start as usize;
    let n = span.len();
    let chunks = n / LANES;
    let pixels = &mut row[start * 4..(start + n) * 4];

    for (c, chunk) in pixels.chunks_exact_mut(LANES * 4).take(chunks).enumerate() {
        let base = (c * LANES) as f32;
        let mut w = [0.0f32; LANES];
        let mut uw = [0.0f32; LANES];
        let mut vw = [0.0f32; LANES];
        for lane in 0..LANES {
            let t = base + lane as f32;
            w[lane] = span.w + span.dw * t;
            uw[lane] = span.uw + span.duw * t;
            vw[lane] = span.vw + span.dvw * t;
        }
        for (lane, px) in chunk.chunks_exact_mut(4).enumerate() {
            float_pixel::<TEX, FOG, BLEND>(px, w[lane], uw[lane], vw[lane], ctx);
        }
    }

    for i in chunks * LANES..n {
        let t = i as f32;
        float_pixel::<TEX, FOG, BLEND>(
            &mut pixels[i * 4..i * 4 + 4],
            span.w + span.dw * t,
            span.uw + span.duw * t,
            span.vw + span.dvw * t,
            ctx,
        );
    }
}

impl SpanFiller for WideFiller {
    fn name(&self) -> &'static str {
        "float-wide"
    }

    fn fill_span(&self, row: &mut [u8], span: &Span, ctx: &FillContext) {
        if span.is_empty() {
            return;
        }
        dispatch_mode!(fill_wide, ctx.mode, row, span, ctx);
    }
}

/// Move a premultiplied coordinate `cw` (with step `dcw`) by a whole number
/// of texture repeats so its start lands in `0..size` texels. `c / w` then
/// differs by exactly `k * size` at every pixel, which the wrap mask
/// discards, and the value fits 16.16 however far the texture is tiled.
fn wrap_premultiplied(cw: f32, dcw: f32, w: f32, dw: f32, size: usize) -> (f32, f32) {
    if !(w > 0.0) {
        return (cw, dcw);
    }
    let size = size as f64;
    let repeats = ((cw as f64 / w as f64) / size).floor() * size;
    (
        (cw as f64 - repeats * w as f64) as f32,
        (dcw as f64 - repeats * dw as f64) as f32,
    )
}

/// Integer filler: 2.30 reciprocal depth and 16.16 texel coordinates,
/// stepped by accumulation
pub struct FixedFiller;

fn fill_fixed<const TEX: bool, const FOG: bool, const BLEND: bool>(
    row: &mut [u8],
    span: &Span,
    ctx: &FillContext,
) {
    let (span_uw, span_duw, span_vw, span_dvw) = match ctx.texture {
        Some(tex) if TEX => {
            let (uw, duw) = wrap_premultiplied(span.uw, span.duw, span.w, span.dw, tex.width());
            let (vw, dvw) = wrap_premultiplied(span.vw, span.dvw, span.w, span.dw, tex.height());
            (uw, duw, vw, dvw)
        }
        _ => (span.uw, span.duw, span.vw, span.dvw),
    };
    let mut w = FixedRecip::from_f32(span.w);
    let dw = FixedRecip::from_f32(span.dw);
    let mut uw = FixedTexel::from_f32(span_uw);
    let duw = FixedTexel::from_f32(span_duw);
    let mut vw = FixedTexel::from_f32(span_vw);
    let dvw = FixedTexel::from_f32(span_dvw);
    let fog_color = ctx.fog.fog.color;

    let start = span.x_start as usize;
    for x in start..start + span.len() {
        let src = if TEX {
            let u = perspective_div(uw, w);
            let v = perspective_div(vw, w);
            ctx.shade(u.floor(), v.floor())
        } else {
            ctx.color
        };
        let amount = if FOG { ctx.fog.amount_fixed(w) } else { 0 };
        write_pixel::<FOG, BLEND>(&mut row[x * 4..x * 4 + 4], src, fog_color, amount);

        w += dw;
        uw += duw;
        vw += dvw;
    }
}

impl SpanFiller for FixedFiller {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn fill_span(&self, row: &mut [u8], span: &Span, ctx: &FillContext) {
        if span.is_empty() {
            return;
        }
        dispatch_mode!(fill_fixed, ctx.mode, row, span, ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stripes() -> Texture {
        let pixels = (0..16 * 16)
            .map(|i| Color::new((i % 16 * 16) as u8, (i / 16 * 16) as u8, 99))
            .collect();
        Texture::from_pixels("stripes", 16, 16, pixels).unwrap()
    }

    fn perspective_span() -> Span {
        Span {
            x_start: 3,
            x_end: 30,
            w: 0.9,
            uw: 0.0,
            vw: 2.0,
            dw: -0.02,
            duw: 0.31,
            dvw: 0.05,
        }
    }

    fn fill(filler: &dyn SpanFiller, span: &Span, ctx: &FillContext, bg: u8) -> Vec<u8> {
        let mut row = vec![bg; 32 * 4];
        filler.fill_span(&mut row, span, ctx);
        row
    }

    fn context(tex: &Texture, mode: FillMode) -> FillContext<'_> {
        FillContext {
            texture: Some(tex),
            color: Color::WHITE,
            mode,
            fog: FogParams::new(Fog::new(Color::new(200, 10, 10), 1.0, 2.0), 1.0),
        }
    }

    #[test]
    fn test_wide_matches_reference_in_every_mode() {
        let tex = stripes();
        for bits in 0..8u8 {
            let mode = FillMode {
                textured: bits & 1 != 0,
                fogged: bits & 2 != 0,
                blended: bits & 4 != 0,
            };
            let ctx = context(&tex, mode);
            let span = perspective_span();
            assert_eq!(
                fill(&FloatFiller, &span, &ctx, 40),
                fill(&WideFiller, &span, &ctx, 40),
                "{:?}",
                mode
            );
        }
    }

    #[test]
    fn test_span_stays_in_bounds() {
        let tex = stripes();
        let ctx = context(&tex, FillMode { textured: true, ..FillMode::default() });
        let row = fill(&FloatFiller, &perspective_span(), &ctx, 7);
        assert!(row[..12].iter().all(|&b| b == 7));
        assert!(row[30 * 4..].iter().all(|&b| b == 7));
        assert_eq!(row[3 * 4 + 3], 255);
    }

    #[test]
    fn test_perspective_correct_sampling() {
        // w halves across the span while u*w stays constant: u doubles
        let tex = stripes();
        let ctx = context(&tex, FillMode { textured: true, ..FillMode::default() });
        let span = Span { x_start: 0, x_end: 2, w: 1.0, uw: 2.0, vw: 0.0, dw: -0.5, duw: -1.0, dvw: 0.0 };
        let row = fill(&FloatFiller, &span, &ctx, 0);
        assert_eq!(row[0], 2 * 16);
        assert_eq!(row[4], 2 * 16);
        let span = Span { dw: -0.5, duw: -0.5, ..span };
        let row = fill(&FloatFiller, &span, &ctx, 0);
        // second pixel: u*w = 1.5, w = 0.5 -> u = 3
        assert_eq!(row[4], 3 * 16);
    }

    #[test]
    fn test_fixed_matches_float_on_flat_texture() {
        let tex = Texture::solid(8, 8, Color::new(10, 200, 30)).unwrap();
        let ctx = context(&tex, FillMode { textured: true, ..FillMode::default() });
        let span = perspective_span();
        assert_eq!(fill(&FloatFiller, &span, &ctx, 0), fill(&FixedFiller, &span, &ctx, 0));
    }

    #[test]
    fn test_fixed_tracks_float_texels() {
        let tex = stripes();
        let ctx = context(&tex, FillMode { textured: true, ..FillMode::default() });
        let span = Span { duw: 0.25, dvw: 0.0, ..perspective_span() };
        let a = fill(&FloatFiller, &span, &ctx, 0);
        let b = fill(&FixedFiller, &span, &ctx, 0);
        let differing = a.chunks(4).zip(b.chunks(4)).filter(|(p, q)| p != q).count();
        // Only texel boundaries may land on different sides
        assert!(differing <= 3, "{} pixels differ", differing);
    }

    #[test]
    fn test_fixed_wraps_far_tiled_coordinates() {
        // 40000 texels is past the 16.16 range; both must wrap to texel t & 15
        let tex = stripes();
        let ctx = context(&tex, FillMode { textured: true, ..FillMode::default() });
        for uw in [40000.5f32, -40000.5] {
            let span = Span { x_start: 0, x_end: 32, w: 1.0, uw, duw: 1.0, ..Span::default() };
            let float = fill(&FloatFiller, &span, &ctx, 0);
            let fixed = fill(&FixedFiller, &span, &ctx, 0);
            assert_eq!(float, fixed, "uw {}", uw);
        }
        let span = Span { x_start: 0, x_end: 1, w: 1.0, uw: 40000.5, ..Span::default() };
        assert_eq!(fill(&FixedFiller, &span, &ctx, 0)[0], 0);
    }

    #[test]
    fn test_wrap_premultiplied_keeps_texel_phase() {
        let (w, dw) = (0.8f32, -0.01f32);
        let (uw, duw) = (5000.0f32 * w, 0.3f32);
        let (cw, dcw) = wrap_premultiplied(uw, duw, w, dw, 16);
        assert!(cw / w >= 0.0 && cw / w < 16.0, "{}", cw / w);
        for t in [0.0f32, 7.0, 20.0] {
            let before = (uw + duw * t) / (w + dw * t);
            let after = (cw + dcw * t) / (w + dw * t);
            let shift = before - after;
            assert!((shift - (shift / 16.0).round() * 16.0).abs() < 1e-2, "t {}: {}", t, shift);
        }
    }

    #[test]
    fn test_alpha_blend_formula() {
        let tex = Texture::solid(4, 4, Color::with_alpha(200, 100, 0, 128)).unwrap();
        let ctx = context(&tex, FillMode { textured: true, blended: true, ..FillMode::default() });
        let span = Span { x_start: 0, x_end: 1, w: 1.0, ..Span::default() };
        let row = fill(&FloatFiller, &span, &ctx, 50);
        assert_eq!(row[0], ((50 * 127 + 200 * 128) / 255) as u8);
        assert_eq!(row[1], ((50 * 127 + 100 * 128) / 255) as u8);
        assert_eq!(row[2], ((50 * 127) / 255) as u8);
    }

    #[test]
    fn test_zero_alpha_skipped() {
        let tex = Texture::solid(4, 4, Color::TRANSPARENT).unwrap();
        let ctx = context(&tex, FillMode { textured: true, blended: true, ..FillMode::default() });
        let span = Span { x_start: 0, x_end: 4, w: 1.0, ..Span::default() };
        assert!(fill(&FixedFiller, &span, &ctx, 9).iter().all(|&b| b == 9));
    }

    #[test]
    fn test_untextured_uses_color() {
        let tex = stripes();
        let mut ctx = context(&tex, FillMode::default());
        ctx.color = Color::new(1, 2, 3);
        let span = Span { x_start: 0, x_end: 2, w: 1.0, ..Span::default() };
        let row = fill(&WideFiller, &span, &ctx, 0);
        assert_eq!(&row[..8], &[1, 2, 3, 255, 1, 2, 3, 255]);
    }

    #[test]
    fn test_fog_amount_float_and_fixed_agree() {
        let params = FogParams::new(Fog::new(Color::BLACK, 2.0, 6.0), 1.0);
        for depth in [1.0f32, 2.0, 3.0, 4.0, 5.5, 8.0] {
            let w = 1.0 / depth;
            let a = params.amount(w) as i32;
            let b = params.amount_fixed(FixedRecip::from_f32(w)) as i32;
            assert!((a - b).abs() <= 2, "depth {}: {} vs {}", depth, a, b);
        }
        assert_eq!(params.amount(1.0), 0);
        assert_eq!(params.amount(0.1), 256);
    }

    #[test]
    fn test_fog_darkens_with_distance() {
        let tex = Texture::solid(4, 4, Color::WHITE).unwrap();
        let mut ctx = context(&tex, FillMode { textured: true, fogged: true, ..FillMode::default() });
        ctx.fog = FogParams::new(Fog::new(Color::BLACK, 1.0, 4.0), 1.0);
        // w from 1.0 (depth 1) down to 0.25 (depth 4)
        let span = Span { x_start: 0, x_end: 8, w: 1.0, dw: -0.75 / 7.0, ..Span::default() };
        let row = fill(&FloatFiller, &span, &ctx, 0);
        let reds: Vec<u8> = row.chunks(4).take(8).map(|p| p[0]).collect();
        assert_eq!(reds[0], 255);
        assert!(reds.windows(2).all(|p| p[0] >= p[1]), "{:?}", reds);
        assert!(reds[7] <= 1);
    }
}
