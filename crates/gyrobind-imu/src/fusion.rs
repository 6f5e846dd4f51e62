use crate::axis_lock;
use crate::estimator::OrientationEstimator;
use crate::filters::{LowPass3, MovingAverage3};
use crate::quat;
use crate::types::{FilterTuning, GyroChannel, RawImuSample, SensorFrame, SmoothedSample};
use glam::{DQuat, DVec3};

/// Per-sample processing: calibration, smoothing, orientation fusion, axis
/// lock and tip computation.
///
/// Owned by the sensor thread; other threads reach it only through
/// [`crate::SensorCommand`].
pub struct MotionPipeline {
    estimator: OrientationEstimator,
    calibration: CalibrationState,
    /// Bias measured during calibration, restored on recenter / go home.
    initial_bias: DVec3,
    default_home: DQuat,
    accel_lpf: LowPass3,
    gyro_average: MovingAverage3,
    accel_average: MovingAverage3,
}

enum CalibrationState {
    Collecting { samples: Vec<DVec3>, target: usize },
    Calibrated,
}

impl MotionPipeline {
    pub fn new(default_home: DQuat, calibration_samples: u32, tuning: &FilterTuning) -> Self {
        let default_home = quat::try_normalize(default_home).unwrap_or(DQuat::IDENTITY);
        let mut estimator =
            OrientationEstimator::new(default_home, 1.0 / 200.0, tuning.beta, tuning.zeta);
        estimator.correct_drift_when_still = tuning.correct_drift_when_still;

        Self {
            estimator,
            calibration: collecting(calibration_samples),
            initial_bias: DVec3::ZERO,
            default_home,
            accel_lpf: LowPass3::new(tuning.accel_alpha),
            gyro_average: MovingAverage3::new(tuning.smoothing_window),
            accel_average: MovingAverage3::new(tuning.smoothing_window),
        }
    }

    /// Process a raw sample taken `dt` seconds after the previous one.
    ///
    /// Returns `None` while calibration is still collecting samples.
    pub fn update(
        &mut self,
        sample: &RawImuSample,
        dt: f64,
        tuning: &FilterTuning,
    ) -> Option<SensorFrame> {
        if let CalibrationState::Collecting { samples, target } = &mut self.calibration {
            samples.push(sample.gyro);
            if samples.len() >= *target {
                let sum: DVec3 = samples.iter().copied().sum();
                self.initial_bias = sum / samples.len() as f64;
                self.estimator.gyro_bias = self.initial_bias;
                self.calibration = CalibrationState::Calibrated;
                tracing::info!(
                    bias_x = self.initial_bias.x,
                    bias_y = self.initial_bias.y,
                    bias_z = self.initial_bias.z,
                    "IMU calibration complete"
                );
            }
            return None;
        }

        self.estimator.sample_period = dt;
        self.estimator.beta = tuning.beta;
        self.estimator.zeta = tuning.zeta;
        self.estimator.correct_drift_when_still = tuning.correct_drift_when_still;
        self.accel_lpf.set_alpha(tuning.accel_alpha);
        self.gyro_average.set_capacity(tuning.smoothing_window);
        self.accel_average.set_capacity(tuning.smoothing_window);

        let accel_filtered = self.accel_lpf.update(sample.accel);
        self.estimator.update(sample.gyro, sample.accel);

        let lock = axis_lock::apply(self.estimator.quaternion, &tuning.axis_lock);
        if tuning.axis_lock.is_active() {
            self.estimator.set_orientation(lock.corrected);
        }

        let q = self.estimator.quaternion;
        let euler = quat::quaternion_to_euler(q);
        let gyro_channel = match tuning.gyro_channel {
            GyroChannel::Orientation => euler.as_vec3(),
            GyroChannel::Rate => {
                let rate = sample.gyro - self.estimator.gyro_bias;
                DVec3::new(
                    rate.x.to_degrees(),
                    rate.y.to_degrees(),
                    rate.z.to_degrees(),
                )
            }
        };
        let smoothed = SmoothedSample {
            gyro: self.gyro_average.update(gyro_channel),
            accel: self.accel_average.update(accel_filtered),
        };

        Some(SensorFrame {
            quaternion: q,
            euler,
            raw_gyro: sample.gyro,
            raw_accel: sample.accel,
            accel_filtered,
            smoothed,
            tip: quat::rotate_point(DVec3::new(0.0, 0.0, tuning.distance_offset), q),
            gyro_bias: self.estimator.gyro_bias,
            unintended_movement: lock.unintended,
            sample_period: dt,
        })
    }

    /// Return to the default home orientation.
    pub fn recenter(&mut self) {
        self.estimator.quaternion = self.default_home;
        self.estimator.gyro_bias = self.initial_bias;
        tracing::info!("Orientation recentered");
    }

    /// Jump to a saved home orientation. Zero quaternions are rejected.
    pub fn go_home(&mut self, home: DQuat) -> bool {
        if !self.estimator.set_orientation(home) {
            tracing::warn!("Ignoring zero home orientation");
            return false;
        }
        self.estimator.gyro_bias = self.initial_bias;
        tracing::info!("Orientation reset to home position");
        true
    }

    /// Restart gyro bias calibration.
    pub fn recalibrate(&mut self, samples: u32) {
        self.calibration = collecting(samples);
        self.estimator.gyro_bias = DVec3::ZERO;
        self.gyro_average.clear();
        self.accel_average.clear();
        tracing::info!(samples, "Recalibration started");
    }

    pub fn is_calibrated(&self) -> bool {
        matches!(self.calibration, CalibrationState::Calibrated)
    }

    pub fn orientation(&self) -> DQuat {
        self.estimator.quaternion
    }

    pub fn gyro_bias(&self) -> DVec3 {
        self.estimator.gyro_bias
    }

    pub fn initial_bias(&self) -> DVec3 {
        self.initial_bias
    }
}

fn collecting(samples: u32) -> CalibrationState {
    // A zero-sample calibration completes on the first reading.
    let target = samples.max(1) as usize;
    CalibrationState::Collecting {
        samples: Vec::with_capacity(target),
        target,
    }
}
