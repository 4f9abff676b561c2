//! Vector math for 3D rendering
//!
//! Pure value types and free functions, no state. Matrices are row-major
//! `[[f32; 4]; 4]` applied to column vectors (`p' = M * p`).

use std::ops::{Add, Mul, Neg, Sub};
use serde::{Deserialize, Serialize};

/// 3D Vector
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };
    pub const ONE: Vec3 = Vec3 { x: 1.0, y: 1.0, z: 1.0 };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, other: Vec3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Vec3) -> Vec3 {
        Vec3 {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    pub fn len(self) -> f32 {
        self.dot(self).sqrt()
    }

    pub fn scale(self, s: f32) -> Vec3 {
        Vec3 {
            x: self.x * s,
            y: self.y * s,
            z: self.z * s,
        }
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    fn add(self, other: Vec3) -> Vec3 {
        Vec3 {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
        }
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, other: Vec3) -> Vec3 {
        Vec3 {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
        }
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;
    fn mul(self, s: f32) -> Vec3 {
        self.scale(s)
    }
}

impl Neg for Vec3 {
    type Output = Vec3;
    fn neg(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}

/// 2D Vector (texture coordinates, billboard extents)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Homogeneous vertex. `w` defaults to 1 for points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec4 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Vec4 {
    pub fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    pub fn from_point(p: Vec3) -> Self {
        Self { x: p.x, y: p.y, z: p.z, w: 1.0 }
    }
}

impl Default for Vec4 {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0, z: 0.0, w: 1.0 }
    }
}

/// Oriented plane `normal . p + d = 0`; the positive side is "inside".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub d: f32,
}

impl Plane {
    pub const fn new(normal: Vec3, d: f32) -> Self {
        Self { normal, d }
    }

    /// Signed distance (unnormalized when `normal` is not unit length)
    #[inline]
    pub fn distance(&self, x: f32, y: f32, z: f32) -> f32 {
        self.normal.x * x + self.normal.y * y + self.normal.z * z + self.d
    }
}

// =============================================================================
// 4x4 Matrix operations (for transforms)
// =============================================================================

/// 4x4 transformation matrix type
pub type Mat4 = [[f32; 4]; 4];

/// Identity matrix
pub fn mat4_identity() -> Mat4 {
    [
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ]
}

/// Create translation matrix
pub fn mat4_translation(t: Vec3) -> Mat4 {
    [
        [1.0, 0.0, 0.0, t.x],
        [0.0, 1.0, 0.0, t.y],
        [0.0, 0.0, 1.0, t.z],
        [0.0, 0.0, 0.0, 1.0],
    ]
}

/// Create non-uniform scale matrix
pub fn mat4_scale(s: Vec3) -> Mat4 {
    [
        [s.x, 0.0, 0.0, 0.0],
        [0.0, s.y, 0.0, 0.0],
        [0.0, 0.0, s.z, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ]
}

/// Rotation about X (degrees)
pub fn mat4_rotation_x(degrees: f32) -> Mat4 {
    let (s, c) = degrees.to_radians().sin_cos();
    [
        [1.0, 0.0, 0.0, 0.0],
        [0.0, c, -s, 0.0],
        [0.0, s, c, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ]
}

/// Rotation about Y (degrees)
pub fn mat4_rotation_y(degrees: f32) -> Mat4 {
    let (s, c) = degrees.to_radians().sin_cos();
    [
        [c, 0.0, s, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [-s, 0.0, c, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ]
}

/// Rotation about Z (degrees)
pub fn mat4_rotation_z(degrees: f32) -> Mat4 {
    let (s, c) = degrees.to_radians().sin_cos();
    [
        [c, -s, 0.0, 0.0],
        [s, c, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ]
}

/// Multiply two 4x4 matrices
pub fn mat4_mul(a: &Mat4, b: &Mat4) -> Mat4 {
    let mut result = [[0.0; 4]; 4];
    for i in 0..4 {
        for j in 0..4 {
            for k in 0..4 {
                result[i][j] += a[i][k] * b[k][j];
            }
        }
    }
    result
}

pub fn mat4_transpose(m: &Mat4) -> Mat4 {
    let mut result = [[0.0; 4]; 4];
    for i in 0..4 {
        for j in 0..4 {
            result[i][j] = m[j][i];
        }
    }
    result
}

/// Transform a point by a 4x4 matrix (w assumed 1, result w dropped)
pub fn mat4_transform_point(m: &Mat4, p: Vec3) -> Vec3 {
    Vec3::new(
        m[0][0] * p.x + m[0][1] * p.y + m[0][2] * p.z + m[0][3],
        m[1][0] * p.x + m[1][1] * p.y + m[1][2] * p.z + m[1][3],
        m[2][0] * p.x + m[2][1] * p.y + m[2][2] * p.z + m[2][3],
    )
}

/// Full homogeneous transform
pub fn mat4_transform_vec4(m: &Mat4, v: Vec4) -> Vec4 {
    Vec4::new(
        m[0][0] * v.x + m[0][1] * v.y + m[0][2] * v.z + m[0][3] * v.w,
        m[1][0] * v.x + m[1][1] * v.y + m[1][2] * v.z + m[1][3] * v.w,
        m[2][0] * v.x + m[2][1] * v.y + m[2][2] * v.z + m[2][3] * v.w,
        m[3][0] * v.x + m[3][1] * v.y + m[3][2] * v.z + m[3][3] * v.w,
    )
}

/// General inverse by Gauss-Jordan elimination with partial pivoting.
/// Returns None for singular matrices.
pub fn mat4_inverse(m: &Mat4) -> Option<Mat4> {
    let mut a = *m;
    let mut inv = mat4_identity();

    for col in 0..4 {
        let pivot = (col..4)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        inv.swap(col, pivot);

        let p = 1.0 / a[col][col];
        for j in 0..4 {
            a[col][j] *= p;
            inv[col][j] *= p;
        }

        for row in 0..4 {
            if row == col {
                continue;
            }
            let f = a[row][col];
            if f == 0.0 {
                continue;
            }
            for j in 0..4 {
                a[row][j] -= f * a[col][j];
                inv[row][j] -= f * inv[col][j];
            }
        }
    }

    Some(inv)
}

/// Object orientation shared by every entity type.
///
/// Order is fixed: scale, then rotate about Y, then Z, then X, then
/// translate, i.e. `T * Rx * Rz * Ry * S`. Angles in degrees.
pub fn compose_transform(position: Vec3, scale: Vec3, angle: Vec3) -> Mat4 {
    let rotation = mat4_mul(
        &mat4_rotation_x(angle.x),
        &mat4_mul(&mat4_rotation_z(angle.z), &mat4_rotation_y(angle.y)),
    );
    let scaled = mat4_mul(&rotation, &mat4_scale(scale));
    mat4_mul(&mat4_translation(position), &scaled)
}
