//! Per-instance transforms for point-instanced (glyph) geometry.
//!
//! A glyph instance is placed by a position, rotated by a quaternion stored
//! in IJKW order (real component last) and scaled either uniformly or per
//! axis.

use glam::{Mat4, Quat, Vec3};

use crate::Aabb;

/// Scale applied to a single instance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InstanceScale {
    Uniform(f32),
    PerAxis(Vec3),
}

impl InstanceScale {
    /// Scale as a per-axis vector.
    pub fn to_vec3(self) -> Vec3 {
        match self {
            InstanceScale::Uniform(s) => Vec3::splat(s),
            InstanceScale::PerAxis(v) => v,
        }
    }
}

impl Default for InstanceScale {
    fn default() -> Self {
        InstanceScale::Uniform(1.0)
    }
}

/// Transform components of one instance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InstanceTransform {
    pub position: Vec3,
    pub orientation: Quat,
    pub scale: InstanceScale,
}

impl Default for InstanceTransform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            scale: InstanceScale::default(),
        }
    }
}

impl InstanceTransform {
    /// Instance placed at `position` with no rotation and unit scale.
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Build a quaternion from IJKW components.
    ///
    /// Degenerate (zero-length) input falls back to the identity rotation.
    pub fn quat_from_ijkw(ijkw: [f32; 4]) -> Quat {
        let q = Quat::from_xyzw(ijkw[0], ijkw[1], ijkw[2], ijkw[3]);
        if q.length_squared() > 0.0 {
            q.normalize()
        } else {
            Quat::IDENTITY
        }
    }

    /// Convert to a 4x4 transformation matrix.
    ///
    /// Order: Scale -> Rotate -> Translate (SRT)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale.to_vec3(), self.orientation, self.position)
    }

    /// World bounds of a unit-sized shape (`[-1, 1]^3`) placed by this transform.
    pub fn unit_shape_bounds(&self) -> Aabb {
        Aabb::from_points(Vec3::splat(-1.0), Vec3::splat(1.0)).transformed(&self.to_matrix())
    }
}
