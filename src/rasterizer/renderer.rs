//! Geometry pipeline: mesh / billboard set -> screen-space triangles
//!
//! Stages run in order over two index arrays that swap roles after each
//! stage, so triangle payloads never move:
//! transform, build (with near/far hard clip), plane clipping, projection,
//! backface culling, optional screen-frame clipping, commit.

use super::buffers::{TriVertex, Triangle, TriangleList, VertexBuffer};
use super::camera::Camera;
use super::clip::{clip_triangle, depth_planes, frame_planes, frustum_planes, ClipResult};
use super::geometry::{BillboardSet, Mesh};
use super::math::{
    mat4_identity, mat4_inverse, mat4_mul, mat4_transform_point, Mat4, Plane, Vec3, Vec4,
};
use super::texture::TextureSource;
use super::types::RenderFlags;
use crate::config::{ClipMode, RenderConfig};

/// Why a render call appended nothing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    CapacityExceeded { requested: usize, available: usize },
    InvalidTextureSlot { triangle: usize, slot: usize },
    InvalidIndex { triangle: usize, index: u32 },
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderError::CapacityExceeded { requested, available } => {
                write!(f, "Capacity exceeded: need {}, {} free", requested, available)
            }
            RenderError::InvalidTextureSlot { triangle, slot } => {
                write!(f, "Triangle {} uses missing texture slot {}", triangle, slot)
            }
            RenderError::InvalidIndex { triangle, index } => {
                write!(f, "Triangle {} references missing index {}", triangle, index)
            }
        }
    }
}

impl std::error::Error for RenderError {}

/// Triangle counts per pipeline stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Source triangles considered
    pub submitted: usize,
    /// Rejected whole by the near/far test during build
    pub hard_clipped: usize,
    /// Removed by plane clipping (view or frame)
    pub plane_clipped: usize,
    /// Extra triangles created by 4-vertex clip results
    pub split: usize,
    /// Extra triangles lost because the list was full
    pub dropped_splits: usize,
    /// Entirely outside the viewport after projection
    pub offscreen: usize,
    pub backfaced: usize,
    /// Appended to the draw order
    pub emitted: usize,
}

impl RenderStats {
    fn accumulate(&mut self, other: &RenderStats) {
        self.submitted += other.submitted;
        self.hard_clipped += other.hard_clipped;
        self.plane_clipped += other.plane_clipped;
        self.split += other.split;
        self.dropped_splits += other.dropped_splits;
        self.offscreen += other.offscreen;
        self.backfaced += other.backfaced;
        self.emitted += other.emitted;
    }
}

/// Something the renderer can turn into triangles
#[derive(Debug, Clone, Copy)]
pub enum Drawable<'a> {
    Mesh(&'a Mesh),
    Billboards(&'a BillboardSet),
}

impl<'a> From<&'a Mesh> for Drawable<'a> {
    fn from(mesh: &'a Mesh) -> Self {
        Drawable::Mesh(mesh)
    }
}

impl<'a> From<&'a BillboardSet> for Drawable<'a> {
    fn from(set: &'a BillboardSet) -> Self {
        Drawable::Billboards(set)
    }
}

/// Result of projecting a single world point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportPoint {
    pub x: f32,
    pub y: f32,
    /// View-space z
    pub depth: f32,
    /// Inside the viewport and between near and far
    pub inside: bool,
}

/// Twice the signed screen-space area; positive for front faces
/// (counter-clockwise as seen by the camera, with y pointing down).
#[inline]
pub fn signed_area(a: &TriVertex, b: &TriVertex, c: &TriVertex) -> f32 {
    (c.x - a.x) * (b.y - a.y) - (b.x - a.x) * (c.y - a.y)
}

pub struct Renderer {
    width: f32,
    height: f32,
    cx: f32,
    cy: f32,
    focal: f32,
    near: f32,
    far: f32,
    view: Mat4,
    view_inverse: Mat4,
    vertices: VertexBuffer,
    stage_src: Vec<u32>,
    stage_dst: Vec<u32>,
    view_planes: Vec<Plane>,
    frame: [Plane; 4],
    clip_mode: ClipMode,
    backface_culling: bool,
    stats: RenderStats,
}

impl Renderer {
    pub fn new(config: &RenderConfig) -> Self {
        let width = config.width as f32;
        let height = config.height as f32;
        let tan_x = (config.fov.to_radians() * 0.5).tan();
        let focal = (width * 0.5) / tan_x;
        let tan_y = (height * 0.5) / focal;

        let view_planes = match config.clip_mode {
            ClipMode::Frustum => frustum_planes(config.near, config.far, tan_x, tan_y).to_vec(),
            ClipMode::Frame => depth_planes(config.near, config.far).to_vec(),
        };

        Self {
            width,
            height,
            cx: width * 0.5,
            cy: height * 0.5,
            focal,
            near: config.near,
            far: config.far,
            view: mat4_identity(),
            view_inverse: mat4_identity(),
            vertices: VertexBuffer::new(config.max_triangles * 3),
            stage_src: Vec::with_capacity(config.max_triangles * 3),
            stage_dst: Vec::with_capacity(config.max_triangles * 3),
            view_planes,
            frame: frame_planes(width, height),
            clip_mode: config.clip_mode,
            backface_culling: config.backface_culling,
            stats: RenderStats::default(),
        }
    }

    pub fn focal(&self) -> f32 {
        self.focal
    }

    pub fn near(&self) -> f32 {
        self.near
    }

    pub fn far(&self) -> f32 {
        self.far
    }

    pub fn set_backface_culling(&mut self, enabled: bool) {
        self.backface_culling = enabled;
    }

    pub fn set_camera(&mut self, camera: &Camera) {
        self.set_view(camera.view_matrix());
    }

    /// Set the world -> view matrix
    pub fn set_view(&mut self, view: Mat4) {
        self.view = view;
        self.view_inverse = mat4_inverse(&view).unwrap_or_else(|| {
            log::warn!("view matrix is singular, unprojection disabled");
            mat4_identity()
        });
    }

    pub fn view(&self) -> &Mat4 {
        &self.view
    }

    /// Totals since the last `flush`
    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    /// Start a new frame
    pub fn flush(&mut self) {
        self.stats = RenderStats::default();
        self.vertices.reset();
    }

    /// Run one object through the pipeline, appending to `list`.
    ///
    /// Capacity, texture slots and vertex indices are checked before any
    /// work; on error nothing is appended.
    pub fn render<'a>(
        &mut self,
        drawable: impl Into<Drawable<'a>>,
        textures: &dyn TextureSource,
        list: &mut TriangleList,
    ) -> Result<RenderStats, RenderError> {
        let drawable = drawable.into();
        if let Err(e) = self.validate(drawable, textures, list) {
            log::debug!("render skipped: {}", e);
            return Err(e);
        }

        let mut stats = RenderStats::default();
        self.vertices.reset();
        self.stage_src.clear();

        match drawable {
            Drawable::Mesh(mesh) => self.build_mesh(mesh, textures, list, &mut stats),
            Drawable::Billboards(set) => self.build_billboards(set, textures, list, &mut stats),
        }

        for i in 0..self.view_planes.len() {
            let plane = self.view_planes[i];
            self.clip_stage(&plane, true, list, &mut stats);
        }

        self.project_stage(list, &mut stats);

        if self.clip_mode == ClipMode::Frame {
            for plane in self.frame {
                self.clip_stage(&plane, false, list, &mut stats);
            }
        }

        for &index in &self.stage_src {
            list.push_valid(index);
        }
        stats.emitted = self.stage_src.len();
        if stats.dropped_splits > 0 {
            log::trace!("{} clip splits dropped, triangle list full", stats.dropped_splits);
        }

        self.stats.accumulate(&stats);
        Ok(stats)
    }

    fn validate(
        &self,
        drawable: Drawable<'_>,
        textures: &dyn TextureSource,
        list: &TriangleList,
    ) -> Result<(), RenderError> {
        let (vertex_count, triangle_count) = match drawable {
            Drawable::Mesh(mesh) => (mesh.vertices.len(), mesh.triangles.len()),
            Drawable::Billboards(set) => (set.billboards.len(), set.billboards.len() * 2),
        };
        if vertex_count > self.vertices.capacity() {
            return Err(RenderError::CapacityExceeded {
                requested: vertex_count,
                available: self.vertices.capacity(),
            });
        }
        if triangle_count > list.remaining() {
            return Err(RenderError::CapacityExceeded {
                requested: triangle_count,
                available: list.remaining(),
            });
        }

        let slots = textures.texture_count();
        match drawable {
            Drawable::Mesh(mesh) => {
                let textured = mesh.flags.contains(RenderFlags::TEXTURED);
                for (i, tri) in mesh.triangles.iter().enumerate() {
                    if let Some(&index) =
                        tri.vertices.iter().find(|&&v| v as usize >= mesh.vertices.len())
                    {
                        return Err(RenderError::InvalidIndex { triangle: i, index });
                    }
                    if !textured {
                        continue;
                    }
                    if let Some(&index) =
                        tri.texcoords.iter().find(|&&t| t as usize >= mesh.texcoords.len())
                    {
                        return Err(RenderError::InvalidIndex { triangle: i, index });
                    }
                    if tri.texture >= slots {
                        return Err(RenderError::InvalidTextureSlot { triangle: i, slot: tri.texture });
                    }
                }
            }
            Drawable::Billboards(set) => {
                if set.flags.contains(RenderFlags::TEXTURED) {
                    if let Some((i, b)) =
                        set.billboards.iter().enumerate().find(|(_, b)| b.texture >= slots)
                    {
                        return Err(RenderError::InvalidTextureSlot { triangle: i * 2, slot: b.texture });
                    }
                }
            }
        }
        Ok(())
    }

    /// Texture size in texels and whether it forces blending
    fn texture_params(textures: &dyn TextureSource, flags: RenderFlags, slot: usize) -> (f32, f32, bool) {
        if !flags.contains(RenderFlags::TEXTURED) {
            return (0.0, 0.0, false);
        }
        match textures.texture(slot) {
            Some(t) => (t.width() as f32, t.height() as f32, t.has_alpha),
            None => (0.0, 0.0, false),
        }
    }

    fn hard_clipped(&self, zs: [f32; 3]) -> bool {
        zs.iter().all(|&z| z < self.near) || zs.iter().all(|&z| z > self.far)
    }

    fn build_mesh(
        &mut self,
        mesh: &Mesh,
        textures: &dyn TextureSource,
        list: &mut TriangleList,
        stats: &mut RenderStats,
    ) {
        let model_view = mat4_mul(&self.view, &mesh.matrix);
        if self.vertices.transform(&model_view, &mesh.vertices).is_none() {
            return;
        }
        let view_space = self.vertices.as_slice();
        let use_shades = mesh.shades.len() == mesh.triangles.len();

        for (i, src) in mesh.triangles.iter().enumerate() {
            stats.submitted += 1;
            let p = src.vertices.map(|v| view_space[v as usize]);
            if self.hard_clipped([p[0].z, p[1].z, p[2].z]) {
                stats.hard_clipped += 1;
                continue;
            }
            let Some(index) = list.allocate() else {
                return;
            };

            let (tw, th, has_alpha) = Self::texture_params(textures, mesh.flags, src.texture);
            let mut flags = mesh.flags;
            if has_alpha {
                flags |= RenderFlags::BLENDED;
            }
            let textured = flags.contains(RenderFlags::TEXTURED);

            let mut vertices = [TriVertex::default(); 3];
            for k in 0..3 {
                let (u, v) = if textured {
                    let tc = mesh.texcoords[src.texcoords[k] as usize];
                    (tc.x * tw, tc.y * th)
                } else {
                    (0.0, 0.0)
                };
                vertices[k] = TriVertex::new(p[k].x, p[k].y, p[k].z, u, v);
            }

            let tri = list.triangle_mut(index);
            *tri = Triangle {
                vertices,
                view_distance: 0.0,
                view_offset: mesh.view_offset,
                color: if use_shades { mesh.shades[i] } else { src.color },
                texture: src.texture,
                flags,
            };
            tri.update_view_distance();
            self.stage_src.push(index);
        }
    }

    fn build_billboards(
        &mut self,
        set: &BillboardSet,
        textures: &dyn TextureSource,
        list: &mut TriangleList,
        stats: &mut RenderStats,
    ) {
        let model_view = mat4_mul(&self.view, &set.matrix);
        let centres = set.billboards.iter().map(|b| b.position);
        if self.vertices.transform_iter(&model_view, centres).is_none() {
            return;
        }

        for (i, b) in set.billboards.iter().enumerate() {
            stats.submitted += 2;
            let c: Vec4 = self.vertices.as_slice()[i];
            if c.z < self.near || c.z > self.far {
                stats.hard_clipped += 2;
                continue;
            }

            let (tw, th, has_alpha) = Self::texture_params(textures, set.flags, b.texture);
            let mut flags = set.flags;
            if has_alpha {
                flags |= RenderFlags::BLENDED;
            }
            let (hx, hy) = (b.half_size.x, b.half_size.y);
            // Corners CCW from bottom-left, always facing the camera
            let corners = [
                TriVertex::new(c.x - hx, c.y - hy, c.z, 0.0, th),
                TriVertex::new(c.x + hx, c.y - hy, c.z, tw, th),
                TriVertex::new(c.x + hx, c.y + hy, c.z, tw, 0.0),
                TriVertex::new(c.x - hx, c.y + hy, c.z, 0.0, 0.0),
            ];

            for [a, bb, cc] in [[0, 1, 2], [0, 2, 3]] {
                let Some(index) = list.allocate() else {
                    return;
                };
                let tri = list.triangle_mut(index);
                *tri = Triangle {
                    vertices: [corners[a], corners[bb], corners[cc]],
                    view_distance: 0.0,
                    view_offset: set.view_offset,
                    color: b.color,
                    texture: b.texture,
                    flags,
                };
                tri.update_view_distance();
                self.stage_src.push(index);
            }
        }
    }

    /// Clip every staged triangle against one plane. `view_space` selects
    /// whether sort keys are refreshed (they are only meaningful before
    /// projection).
    fn clip_stage(&mut self, plane: &Plane, view_space: bool, list: &mut TriangleList, stats: &mut RenderStats) {
        self.stage_dst.clear();
        let mut out = [TriVertex::default(); 4];

        for &index in &self.stage_src {
            let vertices = list.triangle(index).vertices;
            match clip_triangle(&vertices, plane, &mut out) {
                ClipResult::Unchanged => self.stage_dst.push(index),
                ClipResult::Culled => stats.plane_clipped += 1,
                ClipResult::Clipped(count) => {
                    let tri = list.triangle_mut(index);
                    tri.vertices = [out[0], out[1], out[2]];
                    if view_space {
                        tri.update_view_distance();
                    }
                    self.stage_dst.push(index);

                    if count == 4 {
                        let mut extra = *list.triangle(index);
                        extra.vertices = [out[0], out[2], out[3]];
                        if view_space {
                            extra.update_view_distance();
                        }
                        match list.allocate() {
                            Some(slot) => {
                                *list.triangle_mut(slot) = extra;
                                self.stage_dst.push(slot);
                                stats.split += 1;
                            }
                            None => stats.dropped_splits += 1,
                        }
                    }
                }
            }
        }

        std::mem::swap(&mut self.stage_src, &mut self.stage_dst);
    }

    fn project_stage(&mut self, list: &mut TriangleList, stats: &mut RenderStats) {
        self.stage_dst.clear();

        for &index in &self.stage_src {
            let tri = list.triangle_mut(index);
            for v in tri.vertices.iter_mut() {
                let z = v.z.max(f32::MIN_POSITIVE);
                let inv = 1.0 / z;
                let w = self.near * inv;
                v.x = self.cx + v.x * self.focal * inv;
                v.y = self.cy - v.y * self.focal * inv;
                v.z = w;
                v.u *= w;
                v.v *= w;
            }

            let [a, b, c] = &tri.vertices;
            let offscreen = (a.x < 0.0 && b.x < 0.0 && c.x < 0.0)
                || (a.x > self.width && b.x > self.width && c.x > self.width)
                || (a.y < 0.0 && b.y < 0.0 && c.y < 0.0)
                || (a.y > self.height && b.y > self.height && c.y > self.height);
            if offscreen {
                stats.offscreen += 1;
                continue;
            }

            if self.backface_culling && signed_area(a, b, c) <= 0.0 {
                stats.backfaced += 1;
                continue;
            }

            self.stage_dst.push(index);
        }

        std::mem::swap(&mut self.stage_src, &mut self.stage_dst);
    }

    /// Project one world-space point. None when it is at or behind the eye.
    pub fn viewport_coordinates(&self, world: Vec3) -> Option<ViewportPoint> {
        let p = mat4_transform_point(&self.view, world);
        if p.z <= 0.0 {
            return None;
        }
        let x = self.cx + p.x * self.focal / p.z;
        let y = self.cy - p.y * self.focal / p.z;
        let inside = x >= 0.0
            && x < self.width
            && y >= 0.0
            && y < self.height
            && p.z >= self.near
            && p.z <= self.far;
        Some(ViewportPoint { x, y, depth: p.z, inside })
    }

    /// Inverse of `viewport_coordinates`: screen position plus view depth
    /// back to world space
    pub fn unproject(&self, x: f32, y: f32, depth: f32) -> Vec3 {
        let view = Vec3::new(
            (x - self.cx) * depth / self.focal,
            (self.cy - y) * depth / self.focal,
            depth,
        );
        mat4_transform_point(&self.view_inverse, view)
    }
}
