//! Camera for 3D rendering
//!
//! The camera is a rigid transform: yaw about world Y, then pitch about the
//! yawed X axis, then roll, so pitching never tilts the horizon. The view
//! matrix is its inverse.

use super::math::{
    mat4_mul, mat4_rotation_x, mat4_rotation_y, mat4_rotation_z, mat4_transform_point,
    mat4_translation, mat4_transpose, Mat4, Vec3,
};

/// Camera state for 3D rendering. Looks down +Z when unrotated.
#[derive(Clone, Debug)]
pub struct Camera {
    pub position: Vec3,
    /// Pitch (x), yaw (y), roll (z) in degrees
    pub rotation: Vec3,
}

impl Camera {
    pub fn new() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
        }
    }

    pub fn at(position: Vec3) -> Self {
        Self { position, rotation: Vec3::ZERO }
    }

    /// World-space rotation only: `Ry · Rx · Rz`
    pub fn orientation(&self) -> Mat4 {
        let pitch_roll = mat4_mul(&mat4_rotation_x(self.rotation.x), &mat4_rotation_z(self.rotation.z));
        mat4_mul(&mat4_rotation_y(self.rotation.y), &pitch_roll)
    }

    /// World -> view transform
    pub fn view_matrix(&self) -> Mat4 {
        let inv_rot = mat4_transpose(&self.orientation());
        mat4_mul(&inv_rot, &mat4_translation(-self.position))
    }

    pub fn forward(&self) -> Vec3 {
        mat4_transform_point(&self.orientation(), Vec3::new(0.0, 0.0, 1.0))
    }

    /// Turn by the given pitch/yaw deltas (degrees); pitch stays short of vertical
    pub fn rotate(&mut self, d_pitch: f32, d_yaw: f32) {
        self.rotation.y += d_yaw;
        self.rotation.x = (self.rotation.x + d_pitch).clamp(-89.0, 89.0);
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}
