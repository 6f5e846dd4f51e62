use crate::quat;
use glam::{DQuat, DVec3};

/// Accelerometer magnitude tolerance (g) for treating the controller as still.
const STATIONARY_TOLERANCE_G: f64 = 0.1;

/// Gradient-descent attitude filter (Madgwick IMU variant) with gyro bias
/// estimation.
///
/// Gyro input is rad/s, accelerometer input is in g.
#[derive(Debug, Clone)]
pub struct OrientationEstimator {
    /// Current orientation, always unit length.
    pub quaternion: DQuat,
    /// Estimated gyro offset (rad/s), subtracted before integration.
    pub gyro_bias: DVec3,
    /// Seconds between samples, refreshed by the caller every update.
    pub sample_period: f64,
    /// Algorithm gain.
    pub beta: f64,
    /// Bias correction gain. Zero disables bias estimation.
    pub zeta: f64,
    /// Only accumulate bias while the accelerometer reads ~1 g.
    pub correct_drift_when_still: bool,
}

impl OrientationEstimator {
    pub fn new(home: DQuat, sample_period: f64, beta: f64, zeta: f64) -> Self {
        Self {
            quaternion: quat::try_normalize(home).unwrap_or(DQuat::IDENTITY),
            gyro_bias: DVec3::ZERO,
            sample_period,
            beta,
            zeta,
            correct_drift_when_still: true,
        }
    }

    /// Gravity direction in the sensor frame implied by the current orientation.
    pub fn estimated_gravity(&self) -> DVec3 {
        let q = self.quaternion;
        DVec3::new(
            2.0 * (q.x * q.z - q.w * q.y),
            2.0 * (q.w * q.x + q.y * q.z),
            q.w * q.w - q.x * q.x - q.y * q.y + q.z * q.z,
        )
    }

    /// Fuse one gyro + accelerometer sample.
    ///
    /// A zero accelerometer vector leaves the state untouched.
    pub fn update(&mut self, gyro: DVec3, accel: DVec3) {
        let accel_magnitude = accel.length();
        if accel_magnitude == 0.0 || !accel_magnitude.is_finite() {
            return;
        }
        let measured = accel / accel_magnitude;

        let q = self.quaternion;
        let (q0, q1, q2, q3) = (q.w, q.x, q.y, q.z);
        let estimated = self.estimated_gravity();
        let f = estimated - measured;

        if self.zeta > 0.0 {
            let is_stationary = (accel_magnitude - 1.0).abs() < STATIONARY_TOLERANCE_G;
            if !self.correct_drift_when_still || is_stationary {
                self.gyro_bias += estimated.cross(measured) * self.zeta * self.sample_period;
            }
        }

        let gyro = gyro - self.gyro_bias;

        // Jacobian of f with respect to (q0, q1, q2, q3):
        //   [-2q2,  2q3, -2q0, 2q1]
        //   [ 2q1,  2q0,  2q3, 2q2]
        //   [   0, -4q1, -4q2,   0]
        // step = Jᵀ f
        let step = DQuat::from_xyzw(
            2.0 * q3 * f.x + 2.0 * q0 * f.y - 4.0 * q1 * f.z,
            -2.0 * q0 * f.x + 2.0 * q3 * f.y - 4.0 * q2 * f.z,
            2.0 * q1 * f.x + 2.0 * q2 * f.y,
            -2.0 * q2 * f.x + 2.0 * q1 * f.y,
        );
        let step = quat::try_normalize(step).unwrap_or(step);

        let rate = DQuat::from_xyzw(gyro.x, gyro.y, gyro.z, 0.0);
        let q_dot = quat::multiply(q, rate) * 0.5 - step * self.beta;

        let integrated = q + q_dot * self.sample_period;
        if let Some(normalized) = quat::try_normalize(integrated) {
            self.quaternion = normalized;
        }
    }

    /// Replace the orientation. Zero quaternions are rejected.
    pub fn set_orientation(&mut self, q: DQuat) -> bool {
        match quat::try_normalize(q) {
            Some(normalized) => {
                self.quaternion = normalized;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator() -> OrientationEstimator {
        OrientationEstimator::new(DQuat::IDENTITY, 1.0 / 200.0, 0.1, 0.0)
    }

    #[test]
    fn stays_unit_length_under_motion() {
        let mut est = OrientationEstimator::new(
            DQuat::from_xyzw(0.65, 0.0, 0.0, 0.75),
            1.0 / 200.0,
            0.1,
            0.05,
        );
        for i in 0..2000 {
            let t = i as f64 * 0.01;
            let gyro = DVec3::new(t.sin() * 2.0, (t * 0.7).cos(), -0.5);
            let accel = DVec3::new(0.2 * t.cos(), 0.1, 0.95 + 0.3 * (t * 3.0).sin());
            est.update(gyro, accel);
            assert!((est.quaternion.length() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn zero_accel_is_a_no_op() {
        let mut est = estimator();
        est.quaternion = DQuat::from_rotation_x(0.4);
        let before = est.quaternion;
        est.update(DVec3::new(1.0, 2.0, 3.0), DVec3::ZERO);
        assert_eq!(est.quaternion, before);
        assert_eq!(est.gyro_bias, DVec3::ZERO);
    }

    #[test]
    fn level_and_still_stays_put() {
        let mut est = estimator();
        for _ in 0..500 {
            est.update(DVec3::ZERO, DVec3::Z);
        }
        assert!(quat::angle_between(est.quaternion, DQuat::IDENTITY) < 1e-6);
    }

    #[test]
    fn converges_toward_measured_gravity() {
        // Start tilted 30 degrees about X with the sensor reading level.
        let mut est = estimator();
        est.quaternion = DQuat::from_rotation_x(30_f64.to_radians());
        let start = quat::angle_between(est.quaternion, DQuat::IDENTITY);
        for _ in 0..2000 {
            est.update(DVec3::ZERO, DVec3::Z);
        }
        let end = quat::angle_between(est.quaternion, DQuat::IDENTITY);
        assert!(end < start / 2.0, "start {start}, end {end}");
    }

    #[test]
    fn integrates_gyro_rate() {
        let mut est = OrientationEstimator::new(DQuat::IDENTITY, 0.01, 0.0, 0.0);
        // 90 deg/s about Z for one second.
        for _ in 0..100 {
            est.update(DVec3::new(0.0, 0.0, std::f64::consts::FRAC_PI_2), DVec3::Z);
        }
        let expected = DQuat::from_rotation_z(std::f64::consts::FRAC_PI_2);
        assert!(quat::angle_between(est.quaternion, expected) < 0.5);
    }

    #[test]
    fn bias_only_moves_when_still_if_gated() {
        let mut est = estimator();
        est.zeta = 0.5;
        est.quaternion = DQuat::from_rotation_x(0.3);

        // 1.5 g: not stationary, gated correction skips.
        est.update(DVec3::ZERO, DVec3::Z * 1.5);
        assert_eq!(est.gyro_bias, DVec3::ZERO);

        est.correct_drift_when_still = false;
        est.update(DVec3::ZERO, DVec3::Z * 1.5);
        assert!(est.gyro_bias.length() > 0.0);
    }

    #[test]
    fn bias_is_subtracted_before_integration() {
        let mut est = OrientationEstimator::new(DQuat::IDENTITY, 0.01, 0.0, 0.0);
        est.gyro_bias = DVec3::new(0.0, 0.0, 0.2);
        for _ in 0..100 {
            est.update(DVec3::new(0.0, 0.0, 0.2), DVec3::Z);
        }
        assert!(quat::angle_between(est.quaternion, DQuat::IDENTITY) < 1e-9);
    }

    #[test]
    fn set_orientation_rejects_zero() {
        let mut est = estimator();
        assert!(!est.set_orientation(DQuat::from_xyzw(0.0, 0.0, 0.0, 0.0)));
        assert_eq!(est.quaternion, DQuat::IDENTITY);
        assert!(est.set_orientation(DQuat::from_xyzw(0.0, 0.0, 0.0, -3.0)));
        assert!((est.quaternion.length() - 1.0).abs() < 1e-12);
    }
}
