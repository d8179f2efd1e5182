use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Neg, Sub};

/// Immutable 2D vector carrying both its cartesian and polar forms.
///
/// Whichever form is supplied at construction is kept exactly; the other one
/// is derived once, so reading either representation never recomputes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "Cartesian", into = "Cartesian")]
pub struct Vector2 {
    x: f64,
    y: f64,
    angle: f64,
    magnitude: f64,
}

/// Wire form: only x/y travel, the polar form is rebuilt on decode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct Cartesian {
    x: f64,
    y: f64,
}

impl From<Cartesian> for Vector2 {
    fn from(c: Cartesian) -> Self {
        Vector2::cartesian(c.x, c.y)
    }
}

impl From<Vector2> for Cartesian {
    fn from(v: Vector2) -> Self {
        Cartesian { x: v.x, y: v.y }
    }
}

impl Default for Vector2 {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Vector2 {
    pub const ZERO: Vector2 = Vector2 {
        x: 0.0,
        y: 0.0,
        angle: 0.0,
        magnitude: 0.0,
    };

    #[inline]
    pub fn cartesian(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            angle: y.atan2(x),
            magnitude: (x * x + y * y).sqrt(),
        }
    }

    /// Negative magnitudes are folded into the angle so `magnitude()` is never negative.
    #[inline]
    pub fn polar(angle: f64, magnitude: f64) -> Self {
        let (angle, magnitude) = if magnitude < 0.0 {
            (angle + std::f64::consts::PI, -magnitude)
        } else {
            (angle, magnitude)
        };
        Self {
            x: angle.cos() * magnitude,
            y: angle.sin() * magnitude,
            angle,
            magnitude,
        }
    }

    /// Unit vector pointing along `angle`
    #[inline]
    pub fn from_angle(angle: f64) -> Self {
        Self::polar(angle, 1.0)
    }

    #[inline]
    pub fn x(&self) -> f64 {
        self.x
    }

    #[inline]
    pub fn y(&self) -> f64 {
        self.y
    }

    #[inline]
    pub fn angle(&self) -> f64 {
        self.angle
    }

    #[inline]
    pub fn magnitude(&self) -> f64 {
        self.magnitude
    }

    #[inline]
    pub fn magnitude_sq(&self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    /// Explicit (x, y) pair
    #[inline]
    pub fn to_cartesian(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    /// Explicit (angle, magnitude) pair
    #[inline]
    pub fn to_polar(&self) -> (f64, f64) {
        (self.angle, self.magnitude)
    }

    /// Same direction, new length
    pub fn with_magnitude(&self, magnitude: f64) -> Self {
        Self::polar(self.angle, magnitude)
    }

    pub fn normalize(&self) -> Self {
        if self.magnitude > 0.0 {
            Self::polar(self.angle, 1.0)
        } else {
            Self::ZERO
        }
    }

    #[inline]
    pub fn dot(&self, other: Vector2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// 2D cross product (returns scalar z-component)
    #[inline]
    pub fn cross(&self, other: Vector2) -> f64 {
        self.x * other.y - self.y * other.x
    }

    #[inline]
    pub fn distance_to(&self, other: Vector2) -> f64 {
        (*self - other).magnitude()
    }

    pub fn clamp_magnitude(&self, max: f64) -> Self {
        if self.magnitude > max {
            self.with_magnitude(max)
        } else {
            *self
        }
    }

    /// Component of `self` along `axis`
    pub fn project_onto(&self, axis: Vector2) -> Self {
        let len_sq = axis.magnitude_sq();
        if len_sq == 0.0 {
            return Self::ZERO;
        }
        axis * (self.dot(axis) / len_sq)
    }

    /// Component of `self` perpendicular to `axis`
    pub fn reject_from(&self, axis: Vector2) -> Self {
        *self - self.project_onto(axis)
    }

    /// Mirror across a surface with the given unit normal
    pub fn reflect(&self, normal: Vector2) -> Self {
        *self - normal * (2.0 * self.dot(normal))
    }

    pub fn rotate(&self, angle: f64) -> Self {
        Self::polar(self.angle + angle, self.magnitude)
    }

    /// Counter-clockwise perpendicular
    pub fn perpendicular(&self) -> Self {
        Self::cartesian(-self.y, self.x)
    }

    pub fn lerp(&self, other: Vector2, t: f64) -> Self {
        *self + (other - *self) * t
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn approx_eq(&self, other: Vector2, epsilon: f64) -> bool {
        (self.x - other.x).abs() < epsilon && (self.y - other.y).abs() < epsilon
    }
}

/// Smallest signed difference `to - from`, wrapped into [-PI, PI]
pub fn angle_delta(from: f64, to: f64) -> f64 {
    use std::f64::consts::{PI, TAU};
    let mut delta = (to - from) % TAU;
    if delta > PI {
        delta -= TAU;
    } else if delta < -PI {
        delta += TAU;
    }
    delta
}

impl Add for Vector2 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::cartesian(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vector2 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::cartesian(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vector2 {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self {
        Self::cartesian(self.x * rhs, self.y * rhs)
    }
}

impl Mul<Vector2> for f64 {
    type Output = Vector2;
    fn mul(self, rhs: Vector2) -> Vector2 {
        rhs * self
    }
}

impl Neg for Vector2 {
    type Output = Self;
    fn neg(self) -> Self {
        Self::cartesian(-self.x, -self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    const EPSILON: f64 = 1e-9;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn test_cartesian_derives_polar() {
        let v = Vector2::cartesian(3.0, 4.0);
        assert!(approx_eq(v.magnitude(), 5.0));
        assert!(approx_eq(v.angle(), (4.0f64).atan2(3.0)));
    }

    #[test]
    fn test_polar_derives_cartesian() {
        let v = Vector2::polar(PI / 2.0, 2.0);
        assert!(approx_eq(v.x(), 0.0));
        assert!(approx_eq(v.y(), 2.0));
        assert_eq!(v.to_polar(), (PI / 2.0, 2.0));
    }

    #[test]
    fn test_negative_magnitude_folds_into_angle() {
        let v = Vector2::polar(0.0, -1.0);
        assert!(approx_eq(v.magnitude(), 1.0));
        assert!(approx_eq(v.x(), -1.0));
    }

    #[test]
    fn test_normalize_zero() {
        assert_eq!(Vector2::ZERO.normalize(), Vector2::ZERO);
        assert!(approx_eq(Vector2::cartesian(3.0, 4.0).normalize().magnitude(), 1.0));
    }

    #[test]
    fn test_dot_and_cross() {
        let a = Vector2::cartesian(1.0, 0.0);
        let b = Vector2::cartesian(0.0, 1.0);
        assert!(approx_eq(a.dot(b), 0.0));
        assert!(approx_eq(a.cross(b), 1.0));
        assert!(approx_eq(b.cross(a), -1.0));
    }

    #[test]
    fn test_projection_and_rejection_sum_to_original() {
        let v = Vector2::cartesian(2.0, 3.0);
        let axis = Vector2::cartesian(1.0, 1.0);
        let p = v.project_onto(axis);
        let r = v.reject_from(axis);
        assert!((p + r).approx_eq(v, EPSILON));
        assert!(approx_eq(r.dot(axis), 0.0));
    }

    #[test]
    fn test_reflect() {
        let v = Vector2::cartesian(1.0, -1.0);
        let reflected = v.reflect(Vector2::cartesian(0.0, 1.0));
        assert!(reflected.approx_eq(Vector2::cartesian(1.0, 1.0), EPSILON));
    }

    #[test]
    fn test_clamp_magnitude() {
        let v = Vector2::cartesian(6.0, 8.0);
        assert!(approx_eq(v.clamp_magnitude(5.0).magnitude(), 5.0));
        assert_eq!(v.clamp_magnitude(20.0), v);
    }

    #[test]
    fn test_rotate() {
        let v = Vector2::cartesian(1.0, 0.0).rotate(PI / 2.0);
        assert!(v.approx_eq(Vector2::cartesian(0.0, 1.0), EPSILON));
    }

    #[test]
    fn test_angle_delta_wraps() {
        assert!(approx_eq(angle_delta(0.1, 2.0 * PI - 0.1), -0.2));
        assert!(approx_eq(angle_delta(-PI + 0.1, PI - 0.1), -0.2));
        assert!(approx_eq(angle_delta(0.0, 1.0), 1.0));
    }

    #[test]
    fn test_serde_keeps_cartesian_form() {
        let v = Vector2::polar(0.7, 0.25);
        let encoded = bincode::serde::encode_to_vec(v, bincode::config::standard()).unwrap();
        let (decoded, _): (Vector2, usize) =
            bincode::serde::decode_from_slice(&encoded, bincode::config::standard()).unwrap();
        assert!(decoded.approx_eq(v, EPSILON));
        assert!(approx_eq(decoded.magnitude(), 0.25));
    }
}
