//! Caller-owned geometry the renderer consumes
//!
//! A `Mesh` or `BillboardSet` carries its own object matrix. Callers edit
//! `transform` and call `update_matrix`, or write `matrix` directly.

use serde::{Deserialize, Serialize};

use super::math::{compose_transform, mat4_identity, Mat4, Vec2, Vec3};
use super::types::{Color, RenderFlags};

/// Position / scale / angle (degrees) of an object
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub scale: Vec3,
    pub angle: Vec3,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        position: Vec3::ZERO,
        scale: Vec3::ONE,
        angle: Vec3::ZERO,
    };

    pub fn from_position(position: Vec3) -> Self {
        Self { position, ..Self::IDENTITY }
    }

    pub fn to_matrix(&self) -> Mat4 {
        compose_transform(self.position, self.scale, self.angle)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// One mesh face: indices into the mesh's vertex and texcoord arrays
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeshTriangle {
    pub vertices: [u32; 3],
    pub texcoords: [u32; 3],
    pub texture: usize,
    pub color: Color,
}

impl MeshTriangle {
    pub fn new(vertices: [u32; 3], texcoords: [u32; 3], texture: usize) -> Self {
        Self { vertices, texcoords, texture, color: Color::WHITE }
    }
}

/// Indexed triangle mesh
#[derive(Debug, Clone)]
pub struct Mesh {
    pub name: String,
    pub vertices: Vec<Vec3>,
    pub texcoords: Vec<Vec2>,
    pub triangles: Vec<MeshTriangle>,
    /// Optional per-triangle colour written by a lighting pass; when it has
    /// one entry per triangle it overrides `MeshTriangle::color`
    pub shades: Vec<Color>,
    pub flags: RenderFlags,
    pub transform: Transform,
    pub matrix: Mat4,
    /// Added to every triangle's sort key
    pub view_offset: f32,
}

impl Mesh {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vertices: Vec::new(),
            texcoords: Vec::new(),
            triangles: Vec::new(),
            shades: Vec::new(),
            flags: RenderFlags::TEXTURED,
            transform: Transform::IDENTITY,
            matrix: mat4_identity(),
            view_offset: 0.0,
        }
    }

    pub fn update_matrix(&mut self) {
        self.matrix = self.transform.to_matrix();
    }

    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
        self.update_matrix();
    }

    /// Square in the XY plane facing -Z, centred on the origin
    pub fn quad(half: f32, texture: usize) -> Self {
        let mut mesh = Self::new("quad");
        mesh.vertices = vec![
            Vec3::new(-half, -half, 0.0),
            Vec3::new(half, -half, 0.0),
            Vec3::new(half, half, 0.0),
            Vec3::new(-half, half, 0.0),
        ];
        mesh.texcoords = vec![
            Vec2::new(0.0, 1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 0.0),
        ];
        mesh.triangles = vec![
            MeshTriangle::new([0, 1, 2], [0, 1, 2], texture),
            MeshTriangle::new([0, 2, 3], [0, 2, 3], texture),
        ];
        mesh
    }

    /// Axis-aligned cube with outward-facing, separately textured faces
    pub fn cube(half: f32, texture: usize) -> Self {
        let x = Vec3::new(1.0, 0.0, 0.0);
        let y = Vec3::new(0.0, 1.0, 0.0);
        let z = Vec3::new(0.0, 0.0, 1.0);
        // (outward normal, s, t) with s x t = -normal so faces wind CCW from outside
        let faces = [
            (-z, x, y),
            (z, -x, y),
            (x, z, y),
            (-x, -z, y),
            (y, x, z),
            (-y, x, -z),
        ];

        let mut mesh = Self::new("cube");
        mesh.texcoords = vec![
            Vec2::new(0.0, 1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 0.0),
        ];
        for (n, s, t) in faces {
            let base = mesh.vertices.len() as u32;
            let c = n * half;
            let (s, t) = (s * half, t * half);
            mesh.vertices.push(c - s - t);
            mesh.vertices.push(c + s - t);
            mesh.vertices.push(c + s + t);
            mesh.vertices.push(c - s + t);
            mesh.triangles.push(MeshTriangle::new([base, base + 1, base + 2], [0, 1, 2], texture));
            mesh.triangles.push(MeshTriangle::new([base, base + 2, base + 3], [0, 2, 3], texture));
        }
        mesh
    }
}

/// Camera-facing sprite, expanded to two triangles in view space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Billboard {
    pub position: Vec3,
    pub half_size: Vec2,
    pub texture: usize,
    pub color: Color,
}

impl Billboard {
    pub fn new(position: Vec3, half_size: f32, texture: usize) -> Self {
        Self {
            position,
            half_size: Vec2::new(half_size, half_size),
            texture,
            color: Color::WHITE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BillboardSet {
    pub name: String,
    pub billboards: Vec<Billboard>,
    pub flags: RenderFlags,
    pub transform: Transform,
    pub matrix: Mat4,
    pub view_offset: f32,
}

impl BillboardSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            billboards: Vec::new(),
            flags: RenderFlags::TEXTURED,
            transform: Transform::IDENTITY,
            matrix: mat4_identity(),
            view_offset: 0.0,
        }
    }

    pub fn update_matrix(&mut self) {
        self.matrix = self.transform.to_matrix();
    }

    pub fn push(&mut self, billboard: Billboard) {
        self.billboards.push(billboard);
    }

    pub fn len(&self) -> usize {
        self.billboards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.billboards.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_faces_wind_outward() {
        let cube = Mesh::cube(1.0, 0);
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.triangles.len(), 12);
        for tri in &cube.triangles {
            let [a, b, c] = tri.vertices.map(|i| cube.vertices[i as usize]);
            let n = (b - a).cross(c - a);
            let centre = (a + b + c) * (1.0 / 3.0);
            // CCW from outside means the right-handed normal points inward
            assert!(n.dot(centre) < 0.0, "{:?}", tri);
        }
    }

    #[test]
    fn test_quad_layout() {
        let quad = Mesh::quad(2.0, 3);
        assert_eq!(quad.triangles.len(), 2);
        assert!(quad.triangles.iter().all(|t| t.texture == 3));
        assert_eq!(quad.vertices[2], Vec3::new(2.0, 2.0, 0.0));
        assert_eq!(quad.texcoords[2], Vec2::new(1.0, 0.0));
    }

    #[test]
    fn test_update_matrix_uses_transform() {
        let mut mesh = Mesh::quad(1.0, 0);
        mesh.set_transform(Transform::from_position(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(mesh.matrix[0][3], 1.0);
        assert_eq!(mesh.matrix[1][3], 2.0);
        assert_eq!(mesh.matrix[2][3], 3.0);
    }
}
