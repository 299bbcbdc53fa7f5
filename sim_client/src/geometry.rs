//! Geometry value types in the simulator's wire shape.
//!
//! The simulator uses a left-handed, y-up world. Rotations travel as Euler
//! angles in degrees: x = pitch, y = yaw, z = roll, composed as Y · X · Z.
//! [`Transform::orientation`] performs that composition with nalgebra so the
//! rest of the workspace never touches raw trigonometry.

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

// ---------------------------------------------------------------------------
// Vector
// ---------------------------------------------------------------------------

/// A point or direction in world space (meters).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector {
    pub const ZERO: Vector = Vector::new(0.0, 0.0, 0.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn dot(&self, other: &Vector) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn magnitude(&self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Vector) -> f64 {
        (*self - *other).magnitude()
    }

    /// Sum of absolute per-axis differences.
    pub fn manhattan_distance(&self, other: &Vector) -> f64 {
        (self.x - other.x).abs() + (self.y - other.y).abs() + (self.z - other.z).abs()
    }

    fn from_na(v: Vector3<f64>) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl Add for Vector {
    type Output = Vector;
    fn add(self, rhs: Vector) -> Vector {
        Vector::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vector {
    fn add_assign(&mut self, rhs: Vector) {
        *self = *self + rhs;
    }
}

impl Sub for Vector {
    type Output = Vector;
    fn sub(self, rhs: Vector) -> Vector {
        Vector::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl SubAssign for Vector {
    fn sub_assign(&mut self, rhs: Vector) {
        *self = *self - rhs;
    }
}

impl Neg for Vector {
    type Output = Vector;
    fn neg(self) -> Vector {
        Vector::new(-self.x, -self.y, -self.z)
    }
}

impl Mul<f64> for Vector {
    type Output = Vector;
    fn mul(self, k: f64) -> Vector {
        Vector::new(self.x * k, self.y * k, self.z * k)
    }
}

impl Mul<Vector> for f64 {
    type Output = Vector;
    fn mul(self, v: Vector) -> Vector {
        v * self
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vector({}, {}, {})", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Transform
// ---------------------------------------------------------------------------

/// Pose of a simulated object: position plus Euler rotation (degrees).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vector,
    pub rotation: Vector,
}

impl Transform {
    pub fn new(position: Vector, rotation: Vector) -> Self {
        Self { position, rotation }
    }

    /// Rotation as a unit quaternion (yaw, then pitch, then roll).
    pub fn orientation(&self) -> UnitQuaternion<f64> {
        let r = self.rotation;
        let yaw = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), r.y.to_radians());
        let pitch = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), r.x.to_radians());
        let roll = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), r.z.to_radians());
        yaw * pitch * roll
    }

    /// Unit vector the object is facing. `(0, 0, 1)` for a zero rotation.
    pub fn forward(&self) -> Vector {
        Vector::from_na(self.orientation() * Vector3::z())
    }

    /// Unit vector to the object's right. `(1, 0, 0)` for a zero rotation.
    pub fn right(&self) -> Vector {
        Vector::from_na(self.orientation() * Vector3::x())
    }

    /// Same rotation, position moved by `offset`.
    pub fn translated(&self, offset: Vector) -> Self {
        Self {
            position: self.position + offset,
            rotation: self.rotation,
        }
    }

    pub fn quaternion(&self) -> Quaternion {
        Quaternion::from(self.orientation())
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Transform(position={}, rotation={})",
            self.position, self.rotation
        )
    }
}

// ---------------------------------------------------------------------------
// Quaternion / BoundingBox
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl From<UnitQuaternion<f64>> for Quaternion {
    fn from(q: UnitQuaternion<f64>) -> Self {
        let c = q.into_inner().coords;
        Self {
            x: c.x,
            y: c.y,
            z: c.z,
            w: c.w,
        }
    }
}

/// Axis-aligned bounds of an agent in its local frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Vector,
    pub max: Vector,
}

impl BoundingBox {
    pub fn center(&self) -> Vector {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vector {
        self.max - self.min
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
