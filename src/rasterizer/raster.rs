//! Scan conversion of a sorted triangle list into the framebuffer
//!
//! Painter's algorithm: the list is z-sorted farthest first and every
//! triangle simply overwrites (or blends over) what is already there.
//! Each triangle is split at its middle vertex into a flat-bottom and a
//! flat-top half, and each half is filled one scanline span at a time.

use super::buffers::{TriVertex, Triangle, TriangleList};
use super::filler::{filler_for, FillContext, FillMode, FogParams, Span, SpanFiller};
use super::framebuffer::Framebuffer;
use super::renderer::signed_area;
use super::texture::{Texture, TextureSource};
use super::types::{Color, RenderFlags};
use crate::config::{Arithmetic, RenderConfig};

/// Below this, a triangle has no area or no height to scan
const DEGENERATE_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterOutcome {
    Drawn,
    /// Zero height or zero area
    Degenerate,
    /// Valid, but no pixel centre inside the framebuffer
    Empty,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RasterStats {
    pub drawn: usize,
    pub degenerate: usize,
    pub empty: usize,
    pub spans: usize,
}

impl RasterStats {
    fn record(&mut self, outcome: RasterOutcome) {
        match outcome {
            RasterOutcome::Drawn => self.drawn += 1,
            RasterOutcome::Degenerate => self.degenerate += 1,
            RasterOutcome::Empty => self.empty += 1,
        }
    }
}

/// Pick a mip level from texels covered per screen row between the
/// topmost and bottommost vertex: `floor(log2(texels / rows))`, clamped
/// to the chain. Vertices are projected (`u`/`v` premultiplied by `z`).
pub fn select_mip_level(top: &TriVertex, bottom: &TriVertex, levels: usize) -> usize {
    let screen_span = bottom.y - top.y;
    if levels == 0 || screen_span <= DEGENERATE_EPSILON || top.z <= 0.0 || bottom.z <= 0.0 {
        return 0;
    }
    let du = bottom.u / bottom.z - top.u / top.z;
    let dv = bottom.v / bottom.z - top.v / top.z;
    let ratio = (du * du + dv * dv).sqrt() / screen_span;
    if ratio < 2.0 {
        return 0;
    }
    (ratio.log2().floor() as usize).min(levels)
}

pub struct Rasterizer {
    framebuffer: Framebuffer,
    background: Color,
    filler: Box<dyn SpanFiller>,
    mipmapping: bool,
    camera_near: f32,
    stats: RasterStats,
}

impl Rasterizer {
    pub fn new(config: &RenderConfig) -> Self {
        let mut framebuffer = Framebuffer::new(config.width, config.height);
        framebuffer.clear(config.background);
        Self {
            framebuffer,
            background: config.background,
            filler: filler_for(config.arithmetic),
            mipmapping: config.mipmapping,
            camera_near: config.near,
            stats: RasterStats::default(),
        }
    }

    pub fn set_arithmetic(&mut self, arithmetic: Arithmetic) {
        self.filler = filler_for(arithmetic);
    }

    pub fn filler_name(&self) -> &'static str {
        self.filler.name()
    }

    pub fn set_mipmapping(&mut self, enabled: bool) {
        self.mipmapping = enabled;
    }

    pub fn set_background(&mut self, color: Color) {
        self.background = color;
    }

    pub fn width(&self) -> usize {
        self.framebuffer.width
    }

    pub fn height(&self) -> usize {
        self.framebuffer.height
    }

    /// Clear to the background colour and reset frame stats
    pub fn flush(&mut self) {
        self.framebuffer.clear(self.background);
        self.stats = RasterStats::default();
    }

    /// RGBA bytes, row-major, top row first
    pub fn pixels(&self) -> &[u8] {
        self.framebuffer.as_bytes()
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    /// Totals since the last `flush`
    pub fn stats(&self) -> RasterStats {
        self.stats
    }

    /// Sort the list back to front and draw every queued triangle
    pub fn raster_list(&mut self, list: &mut TriangleList, textures: &dyn TextureSource) -> RasterStats {
        list.z_sort();
        let fog = FogParams::new(list.fog, self.camera_near);
        let mut stats = RasterStats::default();

        for &index in list.valid_indices() {
            let (outcome, spans) = self.draw(list.triangle(index), textures, &fog);
            stats.record(outcome);
            stats.spans += spans;
        }

        if stats.degenerate > 0 {
            log::trace!("{} degenerate triangles skipped", stats.degenerate);
        }
        self.stats.drawn += stats.drawn;
        self.stats.degenerate += stats.degenerate;
        self.stats.empty += stats.empty;
        self.stats.spans += stats.spans;
        stats
    }

    /// Draw one projected triangle with the given fog
    pub fn raster_triangle(
        &mut self,
        triangle: &Triangle,
        textures: &dyn TextureSource,
        fog: &FogParams,
    ) -> RasterOutcome {
        let (outcome, spans) = self.draw(triangle, textures, fog);
        self.stats.record(outcome);
        self.stats.spans += spans;
        outcome
    }

    fn draw(&mut self, tri: &Triangle, textures: &dyn TextureSource, fog: &FogParams) -> (RasterOutcome, usize) {
        let mut v = tri.vertices;
        v.sort_by(|a, b| a.y.total_cmp(&b.y));
        let [top, mid, bottom] = v;

        let height = bottom.y - top.y;
        if !(height > DEGENERATE_EPSILON) || signed_area(&top, &mid, &bottom).abs() <= DEGENERATE_EPSILON {
            return (RasterOutcome::Degenerate, 0);
        }

        let base = if tri.flags.contains(RenderFlags::TEXTURED) {
            textures.texture(tri.texture)
        } else {
            None
        };

        // Texel units differ per axis once one side of the chain bottoms out
        let (texture, scale): (Option<&Texture>, (f32, f32)) = match base {
            Some(tex) => {
                let level = if self.mipmapping && tri.flags.contains(RenderFlags::MIPMAPPED) {
                    select_mip_level(&top, &bottom, tex.mip_levels())
                } else {
                    0
                };
                let mip = tex.mip_level(level);
                let scale_u = mip.width() as f32 / tex.width() as f32;
                let scale_v = mip.height() as f32 / tex.height() as f32;
                (Some(mip), (scale_u, scale_v))
            }
            None => (None, (1.0, 1.0)),
        };

        let ctx = FillContext {
            texture,
            color: tri.color,
            mode: FillMode {
                textured: texture.is_some(),
                fogged: tri.flags.contains(RenderFlags::FOGGED),
                blended: tri.flags.contains(RenderFlags::BLENDED),
            },
            fog: *fog,
        };

        let t = (mid.y - top.y) / height;
        let split = top.lerp(&bottom, t);

        let mut spans = 0;
        spans += scan_part(&mut self.framebuffer, self.filler.as_ref(), &ctx, scale, (&top, &mid), (&top, &split));
        spans += scan_part(&mut self.framebuffer, self.filler.as_ref(), &ctx, scale, (&mid, &bottom), (&split, &bottom));

        if spans == 0 {
            (RasterOutcome::Empty, 0)
        } else {
            (RasterOutcome::Drawn, spans)
        }
    }
}

/// Edge position and attributes at screen row centre `y`
#[inline]
fn edge_at(edge: (&TriVertex, &TriVertex), y: f32) -> TriVertex {
    let (a, b) = edge;
    let dy = b.y - a.y;
    if dy.abs() <= DEGENERATE_EPSILON {
        return *a;
    }
    a.lerp(b, ((y - a.y) / dy).clamp(0.0, 1.0))
}

/// Fill the rows between two edges that share their vertical extent.
/// Rows are `ceil(y_top - 0.5)..ceil(y_bottom - 0.5)`, so a row belongs
/// to the half whose range contains its centre.
fn scan_part(
    fb: &mut Framebuffer,
    filler: &dyn SpanFiller,
    ctx: &FillContext,
    scale: (f32, f32),
    edge_a: (&TriVertex, &TriVertex),
    edge_b: (&TriVertex, &TriVertex),
) -> usize {
    let y_top = edge_a.0.y;
    let y_bottom = edge_a.1.y;
    let row_start = ((y_top - 0.5).ceil().max(0.0)) as usize;
    let row_end = ((y_bottom - 0.5).ceil().max(0.0) as usize).min(fb.height);
    let width = fb.width as f32;
    let (scale_u, scale_v) = scale;

    let mut spans = 0;
    for y in row_start..row_end {
        let yc = y as f32 + 0.5;
        let a = edge_at(edge_a, yc);
        let b = edge_at(edge_b, yc);
        let (left, right) = if a.x <= b.x { (a, b) } else { (b, a) };

        let dx = right.x - left.x;
        if dx <= DEGENERATE_EPSILON {
            continue;
        }
        let x_start = (left.x - 0.5).ceil().clamp(0.0, width);
        let x_end = (right.x - 0.5).ceil().clamp(0.0, width);
        if x_end <= x_start {
            continue;
        }

        let dw = (right.z - left.z) / dx;
        let duw = (right.u - left.u) / dx * scale_u;
        let dvw = (right.v - left.v) / dx * scale_v;
        let offset = x_start + 0.5 - left.x;
        let span = Span {
            x_start: x_start as i32,
            x_end: x_end as i32,
            w: left.z + dw * offset,
            uw: left.u * scale_u + duw * offset,
            vw: left.v * scale_v + dvw * offset,
            dw,
            duw,
            dvw,
        };
        filler.fill_span(fb.row_mut(y), &span, ctx);
        spans += 1;
    }
    spans
}
