//! Per-frame vertex and triangle storage
//!
//! Both buffers are allocated once and reused: `reset`/`clear` only rewind
//! counters. Triangles are addressed by `u32` index, never moved; the
//! painter's order lives in a separate index array.

use std::ops::Range;

use super::math::{mat4_transform_vec4, Mat4, Vec3, Vec4};
use super::types::{Color, Fog, RenderFlags};

/// Transformed vertices for the object currently being rendered
#[derive(Debug, Clone)]
pub struct VertexBuffer {
    vertices: Vec<Vec4>,
    used: usize,
}

impl VertexBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            vertices: vec![Vec4::default(); capacity],
            used: 0,
        }
    }

    pub fn reset(&mut self) {
        self.used = 0;
    }

    pub fn capacity(&self) -> usize {
        self.vertices.len()
    }

    pub fn remaining(&self) -> usize {
        self.vertices.len() - self.used
    }

    pub fn len(&self) -> usize {
        self.used
    }

    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    /// Append `matrix * p` for every point. Returns the written range, or
    /// None (writing nothing) when the points do not fit.
    pub fn transform(&mut self, matrix: &Mat4, points: &[Vec3]) -> Option<Range<usize>> {
        self.transform_iter(matrix, points.iter().copied())
    }

    /// `transform` for points produced on the fly, e.g. billboard centres
    pub fn transform_iter<I>(&mut self, matrix: &Mat4, points: I) -> Option<Range<usize>>
    where
        I: ExactSizeIterator<Item = Vec3>,
    {
        let count = points.len();
        if count > self.remaining() {
            return None;
        }
        let start = self.used;
        for (dst, p) in self.vertices[start..start + count].iter_mut().zip(points) {
            *dst = mat4_transform_vec4(matrix, Vec4::from_point(p));
        }
        self.used += count;
        Some(start..self.used)
    }

    pub fn get(&self, index: usize) -> Option<&Vec4> {
        self.vertices[..self.used].get(index)
    }

    pub fn as_slice(&self) -> &[Vec4] {
        &self.vertices[..self.used]
    }
}

/// Triangle corner: position plus texture coordinates.
///
/// In view space `u`/`v` are texel units. After projection x/y are pixels,
/// `z` holds `w = near / z` and `u`/`v` are premultiplied by it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TriVertex {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub u: f32,
    pub v: f32,
}

impl TriVertex {
    pub fn new(x: f32, y: f32, z: f32, u: f32, v: f32) -> Self {
        Self { x, y, z, u, v }
    }

    #[inline]
    pub fn lerp(&self, other: &TriVertex, t: f32) -> TriVertex {
        TriVertex {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
            z: self.z + (other.z - self.z) * t,
            u: self.u + (other.u - self.u) * t,
            v: self.v + (other.v - self.v) * t,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub vertices: [TriVertex; 3],
    /// Painter's sort key (larger = drawn earlier)
    pub view_distance: f32,
    pub view_offset: f32,
    pub color: Color,
    pub texture: usize,
    pub flags: RenderFlags,
}

impl Default for Triangle {
    fn default() -> Self {
        Self {
            vertices: [TriVertex::default(); 3],
            view_distance: 0.0,
            view_offset: 0.0,
            color: Color::WHITE,
            texture: 0,
            flags: RenderFlags::empty(),
        }
    }
}

impl Triangle {
    /// Squared length of the vertex sum plus the owner's offset. Only valid
    /// while the vertices are still in view space.
    pub fn update_view_distance(&mut self) {
        let [a, b, c] = &self.vertices;
        let sx = a.x + b.x + c.x;
        let sy = a.y + b.y + c.y;
        let sz = a.z + b.z + c.z;
        self.view_distance = sx * sx + sy * sy + sz * sz + self.view_offset;
    }
}

/// Fixed-capacity triangle arena plus the list of triangles to draw
#[derive(Debug, Clone)]
pub struct TriangleList {
    triangles: Vec<Triangle>,
    order: Vec<u32>,
    scratch: Vec<u32>,
    used: usize,
    valid: usize,
    pub fog: Fog,
}

impl TriangleList {
    pub fn new(capacity: usize) -> Self {
        Self {
            triangles: vec![Triangle::default(); capacity],
            order: vec![0; capacity],
            scratch: vec![0; capacity],
            used: 0,
            valid: 0,
            fog: Fog::default(),
        }
    }

    /// Forget every triangle; storage is kept
    pub fn clear(&mut self) {
        self.used = 0;
        self.valid = 0;
    }

    pub fn capacity(&self) -> usize {
        self.triangles.len()
    }

    pub fn remaining(&self) -> usize {
        self.triangles.len() - self.used
    }

    /// Slots written this frame
    pub fn len_used(&self) -> usize {
        self.used
    }

    /// Triangles queued for rasterization
    pub fn len_valid(&self) -> usize {
        self.valid
    }

    pub fn is_empty(&self) -> bool {
        self.valid == 0
    }

    /// Reserve the next free slot
    pub fn allocate(&mut self) -> Option<u32> {
        if self.used >= self.triangles.len() {
            return None;
        }
        let index = self.used as u32;
        self.used += 1;
        Some(index)
    }

    pub fn triangle(&self, index: u32) -> &Triangle {
        &self.triangles[index as usize]
    }

    pub fn triangle_mut(&mut self, index: u32) -> &mut Triangle {
        &mut self.triangles[index as usize]
    }

    /// Queue an allocated slot for drawing
    pub fn push_valid(&mut self, index: u32) {
        debug_assert!((index as usize) < self.used);
        if self.valid < self.order.len() {
            self.order[self.valid] = index;
            self.valid += 1;
        }
    }

    /// Allocate, store and queue in one step
    pub fn push(&mut self, triangle: Triangle) -> Option<u32> {
        let index = self.allocate()?;
        self.triangles[index as usize] = triangle;
        self.push_valid(index);
        Some(index)
    }

    /// Draw order (after `z_sort`: farthest first)
    pub fn valid_indices(&self) -> &[u32] {
        &self.order[..self.valid]
    }

    pub fn iter_valid(&self) -> impl Iterator<Item = &Triangle> + '_ {
        self.valid_indices().iter().map(move |&i| &self.triangles[i as usize])
    }

    /// Stable bottom-up merge sort of the draw order by descending
    /// `view_distance`. Equal keys keep submission order.
    pub fn z_sort(&mut self) {
        let n = self.valid;
        let triangles = &self.triangles;
        let key = |i: u32| triangles[i as usize].view_distance;

        let mut in_order = true;
        let mut width = 1;
        while width < n {
            if in_order {
                merge_pass(&self.order[..n], &mut self.scratch[..n], width, &key);
            } else {
                merge_pass(&self.scratch[..n], &mut self.order[..n], width, &key);
            }
            in_order = !in_order;
            width *= 2;
        }
        if !in_order {
            self.order[..n].copy_from_slice(&self.scratch[..n]);
        }
    }
}

/// Merge adjacent sorted runs of `width` from `src` into `dst`
fn merge_pass(src: &[u32], dst: &mut [u32], width: usize, key: &impl Fn(u32) -> f32) {
    let n = src.len();
    let mut start = 0;
    while start < n {
        let mid = (start + width).min(n);
        let end = (start + 2 * width).min(n);
        let (mut l, mut r, mut o) = (start, mid, start);
        while l < mid && r < end {
            if key(src[l]) >= key(src[r]) {
                dst[o] = src[l];
                l += 1;
            } else {
                dst[o] = src[r];
                r += 1;
            }
            o += 1;
        }
        dst[o..o + (mid - l)].copy_from_slice(&src[l..mid]);
        o += mid - l;
        dst[o..o + (end - r)].copy_from_slice(&src[r..end]);
        start = end;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rasterizer::math::{mat4_translation, Vec3};

    fn tri_at(key: f32, texture: usize) -> Triangle {
        Triangle {
            view_distance: key,
            texture,
            ..Triangle::default()
        }
    }

    #[test]
    fn test_vertex_buffer_capacity() {
        let mut vb = VertexBuffer::new(4);
        let m = mat4_translation(Vec3::new(1.0, 0.0, 0.0));
        let r = vb.transform(&m, &[Vec3::ZERO, Vec3::ONE]).unwrap();
        assert_eq!(r, 0..2);
        assert_eq!(vb.get(1).unwrap().x, 2.0);
        assert!(vb.transform(&m, &[Vec3::ZERO; 3]).is_none());
        assert_eq!(vb.len(), 2);
        vb.reset();
        assert!(vb.transform(&m, &[Vec3::ZERO; 4]).is_some());
    }

    #[test]
    fn test_transform_from_iterator_appends() {
        let mut vb = VertexBuffer::new(3);
        let m = mat4_translation(Vec3::new(0.0, 0.0, 2.0));
        vb.transform(&m, &[Vec3::ZERO]).unwrap();
        let xs = (1..3).map(|i| Vec3::new(i as f32, 0.0, 0.0));
        assert_eq!(vb.transform_iter(&m, xs), Some(1..3));
        assert_eq!(vb.get(2).unwrap().x, 2.0);
        assert_eq!(vb.get(2).unwrap().z, 2.0);
        assert!(vb.transform_iter(&m, std::iter::once(Vec3::ZERO)).is_none());
    }

    #[test]
    fn test_allocate_until_full() {
        let mut list = TriangleList::new(2);
        assert_eq!(list.push(tri_at(1.0, 0)), Some(0));
        assert_eq!(list.allocate(), Some(1));
        assert_eq!(list.allocate(), None);
        assert_eq!(list.len_used(), 2);
        assert_eq!(list.len_valid(), 1);
        list.clear();
        assert_eq!(list.remaining(), 2);
        assert!(list.is_empty());
    }

    #[test]
    fn test_z_sort_descending() {
        let keys = [3.0, 9.0, 1.0, 4.0, 4.0, 7.5, 0.0, 12.0, 2.0];
        let mut list = TriangleList::new(16);
        for (i, k) in keys.iter().enumerate() {
            list.push(tri_at(*k, i));
        }
        list.z_sort();
        let sorted: Vec<f32> = list.iter_valid().map(|t| t.view_distance).collect();
        for pair in sorted.windows(2) {
            assert!(pair[0] >= pair[1], "{:?}", sorted);
        }
        assert_eq!(sorted.len(), keys.len());
    }

    #[test]
    fn test_z_sort_stable_for_equal_keys() {
        let mut list = TriangleList::new(8);
        for i in 0..7 {
            list.push(tri_at(if i % 2 == 0 { 5.0 } else { 1.0 }, i));
        }
        list.z_sort();
        let order: Vec<usize> = list.iter_valid().map(|t| t.texture).collect();
        assert_eq!(order, vec![0, 2, 4, 6, 1, 3, 5]);
    }

    #[test]
    fn test_z_sort_ignores_unqueued_slots() {
        let mut list = TriangleList::new(4);
        list.push(tri_at(1.0, 0));
        let hidden = list.allocate().unwrap();
        *list.triangle_mut(hidden) = tri_at(100.0, 1);
        list.push(tri_at(2.0, 2));
        list.z_sort();
        assert_eq!(list.valid_indices(), &[2, 0]);
    }

    #[test]
    fn test_view_distance_includes_offset() {
        let mut t = Triangle::default();
        t.vertices[0] = TriVertex::new(1.0, 0.0, 1.0, 0.0, 0.0);
        t.vertices[1] = TriVertex::new(0.0, 1.0, 1.0, 0.0, 0.0);
        t.vertices[2] = TriVertex::new(0.0, 0.0, 1.0, 0.0, 0.0);
        t.view_offset = 0.5;
        t.update_view_distance();
        assert!((t.view_distance - (1.0 + 1.0 + 9.0 + 0.5)).abs() < 1e-6);
    }
}
