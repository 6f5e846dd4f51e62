//! Quaternion helpers on `glam::DQuat`.
//!
//! Angles are in degrees. Euler conversions use the ZYX convention with
//! pitch about X, yaw about Y and roll about Z.

use crate::types::EulerAngles;
use glam::{DQuat, DVec3};

/// Below this dot product slerp falls back to normalized lerp.
const SLERP_DOT_THRESHOLD: f64 = 0.9995;

/// Hamilton product `a * b`.
///
/// Written out instead of using `Mul` so that non-unit operands (pure
/// quaternions built from gyro rates) are accepted.
pub fn multiply(a: DQuat, b: DQuat) -> DQuat {
    DQuat::from_xyzw(
        a.w * b.x + a.x * b.w + a.y * b.z - a.z * b.y,
        a.w * b.y - a.x * b.z + a.y * b.w + a.z * b.x,
        a.w * b.z + a.x * b.y - a.y * b.x + a.z * b.w,
        a.w * b.w - a.x * b.x - a.y * b.y - a.z * b.z,
    )
}

/// Inverse of a unit quaternion (its conjugate).
pub fn inverse(q: DQuat) -> DQuat {
    DQuat::from_xyzw(-q.x, -q.y, -q.z, q.w)
}

/// Rotate `p` by `q` as `q * (0, p) * q⁻¹`.
pub fn rotate_point(p: DVec3, q: DQuat) -> DVec3 {
    let pure = DQuat::from_xyzw(p.x, p.y, p.z, 0.0);
    let rotated = multiply(multiply(q, pure), inverse(q));
    DVec3::new(rotated.x, rotated.y, rotated.z)
}

pub fn euler_to_quaternion(angles: EulerAngles) -> DQuat {
    let (sp, cp) = (angles.pitch.to_radians() * 0.5).sin_cos();
    let (sy, cy) = (angles.yaw.to_radians() * 0.5).sin_cos();
    let (sr, cr) = (angles.roll.to_radians() * 0.5).sin_cos();

    DQuat::from_xyzw(
        cy * sp * cr - sy * cp * sr,
        sy * cp * cr + cy * sp * sr,
        cy * cp * sr - sy * sp * cr,
        cy * cp * cr + sy * sp * sr,
    )
}

/// Yaw is clamped at the singularity and reads ±90°.
pub fn quaternion_to_euler(q: DQuat) -> EulerAngles {
    let pitch = (2.0 * (q.w * q.x + q.y * q.z)).atan2(1.0 - 2.0 * (q.x * q.x + q.y * q.y));
    let yaw = (2.0 * (q.w * q.y - q.z * q.x)).clamp(-1.0, 1.0).asin();
    let roll = (2.0 * (q.w * q.z + q.x * q.y)).atan2(1.0 - 2.0 * (q.y * q.y + q.z * q.z));

    EulerAngles::new(pitch.to_degrees(), yaw.to_degrees(), roll.to_degrees())
}

/// Normalize, or `None` for a zero (or non-finite) quaternion.
pub fn try_normalize(q: DQuat) -> Option<DQuat> {
    let norm = q.length();
    if norm > 0.0 && norm.is_finite() {
        Some(q / norm)
    } else {
        None
    }
}

/// Spherical interpolation from `q1` (t = 0) to `q2` (t = 1) along the
/// shortest path.
///
/// Inputs are normalized first. A zero-norm input is used as-is and yields a
/// degenerate result; callers reject zero quaternions before getting here.
pub fn slerp(q1: DQuat, q2: DQuat, t: f64) -> DQuat {
    let q1 = try_normalize(q1).unwrap_or(q1);
    let mut q2 = try_normalize(q2).unwrap_or(q2);

    let mut dot = q1.dot(q2);
    if dot < 0.0 {
        q2 = -q2;
        dot = -dot;
    }

    if dot > SLERP_DOT_THRESHOLD {
        let lerped = q1 + (q2 - q1) * t;
        return try_normalize(lerped).unwrap_or(lerped);
    }

    let theta_0 = dot.acos();
    let theta = theta_0 * t;
    let sin_theta = theta.sin();
    let sin_theta_0 = theta_0.sin();

    let s0 = theta.cos() - dot * sin_theta / sin_theta_0;
    let s1 = sin_theta / sin_theta_0;

    q1 * s0 + q2 * s1
}

/// Angle in degrees between two rotations.
pub fn angle_between(a: DQuat, b: DQuat) -> f64 {
    let dot = a.dot(b).abs().min(1.0);
    (2.0 * dot.acos()).to_degrees()
}
