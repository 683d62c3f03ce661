use serde::{Deserialize, Serialize};

use crate::util::vec3::Vec3;

/// Rotation quaternion (x, y, z, w)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quat {
    pub const IDENTITY: Quat = Quat { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };

    #[inline]
    pub fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Build a rotation of `angle` radians around a unit axis
    pub fn from_axis_angle(axis: Vec3, angle: f32) -> Self {
        let half = angle * 0.5;
        let s = half.sin();
        Self {
            x: axis.x * s,
            y: axis.y * s,
            z: axis.z * s,
            w: half.cos(),
        }
    }

    #[inline]
    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt()
    }

    pub fn normalize(&self) -> Self {
        let len = self.length();
        if len > 0.0 {
            Self {
                x: self.x / len,
                y: self.y / len,
                z: self.z / len,
                w: self.w / len,
            }
        } else {
            Self::IDENTITY
        }
    }

    /// Rotate a vector by this quaternion (assumed unit length)
    pub fn rotate(&self, v: Vec3) -> Vec3 {
        // v' = v + 2w(q × v) + 2(q × (q × v))
        let q = Vec3::new(self.x, self.y, self.z);
        let t = q.cross(v) * 2.0;
        v + t * self.w + q.cross(t)
    }

    /// Forward direction of an entity carrying this rotation
    #[inline]
    pub fn forward(&self) -> Vec3 {
        self.rotate(Vec3::UNIT_X)
    }
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}
