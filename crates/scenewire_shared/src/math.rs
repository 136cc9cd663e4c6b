//! Geometric primitives carried inside payloads.
//!
//! These are the canonical wire representations. Each is a `Pod` struct whose
//! in-memory layout is the (little-endian) wire layout.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// 3D vector - position, scale, bounds.
///
/// Wire layout: 3 × `f32` (12 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
}

impl Vec3 {
    /// Size in bytes.
    pub const SIZE: usize = 12;

    /// Zero vector
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// All-ones vector (unit scale)
    pub const ONE: Self = Self::new(1.0, 1.0, 1.0);

    /// Creates a new Vec3
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Converts to array
    #[must_use]
    pub const fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    /// Creates from array
    #[must_use]
    pub const fn from_array(arr: [f32; 3]) -> Self {
        Self::new(arr[0], arr[1], arr[2])
    }

    /// Dot product
    #[must_use]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Length squared (avoids sqrt)
    #[must_use]
    pub fn length_squared(self) -> f32 {
        self.dot(self)
    }

    /// Distance to another point
    #[must_use]
    pub fn distance(self, other: Self) -> f32 {
        (self - other).length_squared().sqrt()
    }
}

impl std::ops::Add for Vec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

/// Rotation quaternion. Basis coefficients in `xyz`, scalar in `w`.
///
/// Must be unit-norm on the wire.
///
/// Wire layout: 4 × `f32` (16 bytes), `x, y, z, w`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct UnitQuat {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
    /// W component (scalar)
    pub w: f32,
}

impl UnitQuat {
    /// Size in bytes.
    pub const SIZE: usize = 16;

    /// Identity rotation
    pub const IDENTITY: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    /// Creates a new quaternion. No normalization is performed.
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Rotation of `angle` radians around a unit `axis`.
    #[must_use]
    pub fn from_axis_angle(axis: Vec3, angle: f32) -> Self {
        let (s, c) = (angle * 0.5).sin_cos();
        Self::new(axis.x * s, axis.y * s, axis.z * s, c)
    }

    /// Components in `x, y, z, w` order.
    #[must_use]
    pub const fn to_array(self) -> [f32; 4] {
        [self.x, self.y, self.z, self.w]
    }

    /// Creates from `x, y, z, w` components.
    #[must_use]
    pub const fn from_array(arr: [f32; 4]) -> Self {
        Self::new(arr[0], arr[1], arr[2], arr[3])
    }

    /// Four-component dot product.
    #[must_use]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z + self.w * other.w
    }

    /// Squared norm.
    #[must_use]
    pub fn norm_squared(self) -> f32 {
        self.dot(self)
    }

    /// Returns the quaternion scaled to unit norm. A zero quaternion is
    /// returned unchanged.
    #[must_use]
    pub fn normalized(self) -> Self {
        let n2 = self.norm_squared();
        if n2 <= 0.0 {
            return self;
        }
        let inv = n2.sqrt().recip();
        Self::new(self.x * inv, self.y * inv, self.z * inv, self.w * inv)
    }

    /// Angle in radians of the rotation taking `self` to `other`.
    ///
    /// `q` and `-q` are the same rotation, so the result is always in `[0, π]`.
    #[must_use]
    pub fn angle_to(self, other: Self) -> f32 {
        let (a, b) = (self.normalized().to_array(), other.normalized().to_array());
        let d: f64 = a
            .iter()
            .zip(b.iter())
            .map(|(x, y)| f64::from(*x) * f64::from(*y))
            .sum();
        (2.0 * d.abs().min(1.0).acos()) as f32
    }
}

impl Default for UnitQuat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl std::ops::Neg for UnitQuat {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z, -self.w)
    }
}

/// 128-bit identifier.
///
/// Wire layout: 4 × `u32` (16 bytes).
#[repr(C)]
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize,
)]
pub struct Uuid(pub [u32; 4]);

impl Uuid {
    /// Size in bytes.
    pub const SIZE: usize = 16;

    /// The all-zero id.
    pub const NIL: Self = Self([0; 4]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_sizes() {
        assert_eq!(std::mem::size_of::<Vec3>(), Vec3::SIZE);
        assert_eq!(std::mem::size_of::<UnitQuat>(), UnitQuat::SIZE);
        assert_eq!(std::mem::size_of::<Uuid>(), Uuid::SIZE);
    }

    #[test]
    fn test_vec3_operations() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);

        let sum = a + b;
        assert_eq!(sum, Vec3::new(5.0, 7.0, 9.0));
        assert_eq!(a.dot(b), 32.0);
        assert_eq!((b - a).to_array(), [3.0, 3.0, 3.0]);
    }

    #[test]
    fn test_quat_normalize() {
        let q = UnitQuat::new(0.0, 0.0, 0.0, 2.0).normalized();
        assert_eq!(q, UnitQuat::IDENTITY);

        let zero = UnitQuat::new(0.0, 0.0, 0.0, 0.0);
        assert_eq!(zero.normalized(), zero);
    }

    #[test]
    fn test_quat_angle_ignores_double_cover() {
        let q = UnitQuat::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), 1.0);
        assert!(q.angle_to(-q) < 2e-3);
        assert!((UnitQuat::IDENTITY.angle_to(q) - 1.0).abs() < 2e-3);
    }
}
