//! Validation and conversion of settings into the runtime parameter structs.

use crate::types::AppConfig;
use glam::DQuat;
use gyrobind_imu::quat;
use gyrobind_imu::types::{AxisLock, EulerAngles, FilterTuning};
use gyrobind_imu::LoopOptions;
use gyrobind_match::TickParams;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SettingsError {
    #[error("{field}: '{value}' is not a number")]
    NotANumber { field: &'static str, value: String },
    #[error("{field}: {value} is outside {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("orientation cannot be all zeros")]
    ZeroQuaternion,
}

/// Accepted range of one numeric setting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limit {
    pub field: &'static str,
    pub min: f64,
    pub max: f64,
}

impl Limit {
    const fn new(field: &'static str, min: f64, max: f64) -> Self {
        Self { field, min, max }
    }

    pub fn check(&self, value: f64) -> Result<f64, SettingsError> {
        if value.is_nan() || value < self.min || value > self.max {
            return Err(SettingsError::OutOfRange {
                field: self.field,
                value,
                min: self.min,
                max: self.max,
            });
        }
        Ok(value)
    }

    pub fn parse(&self, text: &str) -> Result<f64, SettingsError> {
        parse_number(self.field, text, self.min, self.max)
    }
}

pub mod limits {
    use super::Limit;

    pub const BETA: Limit = Limit::new("imu.beta", 0.01, 1.0);
    pub const ZETA: Limit = Limit::new("imu.zeta", 0.0, 0.5);
    pub const ACCEL_SMOOTHING: Limit = Limit::new("imu.accel_smoothing", 0.01, 1.0);
    pub const CALIBRATION_SAMPLES: Limit = Limit::new("imu.calibration_samples", 1.0, 10_000.0);
    pub const SAMPLE_RATE_HZ: Limit = Limit::new("imu.sample_rate_hz", 1.0, 2000.0);
    pub const RECONNECT_DELAY_MS: Limit = Limit::new("imu.reconnect_delay_ms", 0.0, 60_000.0);
    pub const SMOOTHING_WINDOW: Limit = Limit::new("smoothing.window", 1.0, 500.0);
    pub const LOCK_ANGLE: Limit = Limit::new("axis_lock.lock_to", -180.0, 180.0);
    pub const LOCK_STRENGTH: Limit = Limit::new("axis_lock.strength", 0.0, 1.0);
    pub const HIT_TOLERANCE: Limit = Limit::new("points.hit_tolerance", 0.01, 1.0);
    pub const DISTANCE_OFFSET: Limit = Limit::new("points.distance_offset", 0.0, 2.0);
    pub const GROUP_GRACE_S: Limit = Limit::new("points.group_grace_period_s", 0.0, 10.0);
    pub const GROUP_COOLDOWN_MS: Limit = Limit::new("points.group_cooldown_ms", 5.0, 3000.0);
    pub const RECORD_POINTS: Limit = Limit::new("recording.num_points", 1.0, 1000.0);
    pub const RECORD_DURATION_MS: Limit = Limit::new("recording.duration_ms", 1.0, 60_000.0);
    pub const PADDING: Limit = Limit::new("recording.initial_padding", 0.0, 2500.0);
    pub const LOG_INTERVAL_MS: Limit = Limit::new("logging.interval_ms", 5.0, 1000.0);
    pub const TIME_WINDOW_MS: Limit = Limit::new("sequence.time_window_ms", 0.0, 20_000.0);
    pub const RESET_GRACE_MS: Limit = Limit::new("sequence.reset_grace_period_ms", 0.0, 1000.0);
}

/// Parse text typed into a numeric field, rejecting garbage and values
/// outside `min..=max`.
pub fn parse_number(field: &'static str, text: &str, min: f64, max: f64) -> Result<f64, SettingsError> {
    let value: f64 = text
        .trim()
        .parse()
        .map_err(|_| SettingsError::NotANumber {
            field,
            value: text.to_string(),
        })?;
    Limit::new(field, min, max).check(value)
}

/// Normalized quaternion from `[w, x, y, z]`; all zeros is rejected.
pub fn quaternion_from_values([w, x, y, z]: [f64; 4]) -> Result<DQuat, SettingsError> {
    quat::try_normalize(DQuat::from_xyzw(x, y, z, w)).ok_or(SettingsError::ZeroQuaternion)
}

/// Validate `new` and only then replace `current`. On error `current` is
/// left untouched.
pub fn apply_settings(current: &mut AppConfig, new: AppConfig) -> Result<(), SettingsError> {
    new.validate()?;
    *current = new;
    Ok(())
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), SettingsError> {
        use limits::*;

        BETA.check(self.imu.beta)?;
        ZETA.check(self.imu.zeta)?;
        ACCEL_SMOOTHING.check(self.imu.accel_smoothing)?;
        CALIBRATION_SAMPLES.check(f64::from(self.imu.calibration_samples))?;
        SAMPLE_RATE_HZ.check(self.imu.sample_rate_hz)?;
        RECONNECT_DELAY_MS.check(self.imu.reconnect_delay_ms as f64)?;
        quat::try_normalize(self.imu.default_home).ok_or(SettingsError::ZeroQuaternion)?;

        SMOOTHING_WINDOW.check(self.smoothing.window as f64)?;

        for angle in [
            self.axis_lock.lock_pitch_to,
            self.axis_lock.lock_yaw_to,
            self.axis_lock.lock_roll_to,
        ] {
            LOCK_ANGLE.check(angle)?;
        }
        LOCK_STRENGTH.check(self.axis_lock.strength)?;

        HIT_TOLERANCE.check(self.points.hit_tolerance)?;
        DISTANCE_OFFSET.check(self.points.distance_offset)?;
        GROUP_GRACE_S.check(self.points.group_grace_period_s)?;
        GROUP_COOLDOWN_MS.check(self.points.group_cooldown_ms as f64)?;

        RECORD_POINTS.check(f64::from(self.recording.num_points))?;
        RECORD_DURATION_MS.check(self.recording.duration_ms as f64)?;
        PADDING.check(self.recording.initial_padding)?;

        LOG_INTERVAL_MS.check(self.logging.interval_ms as f64)?;
        Ok(())
    }

    pub fn filter_tuning(&self) -> FilterTuning {
        FilterTuning {
            beta: self.imu.beta,
            zeta: self.imu.zeta,
            correct_drift_when_still: self.imu.correct_drift_when_still,
            accel_alpha: self.imu.accel_smoothing,
            smoothing_window: self.smoothing.window.max(1),
            gyro_channel: self.smoothing.gyro_channel,
            axis_lock: AxisLock {
                track_pitch: self.axis_lock.track_pitch,
                track_yaw: self.axis_lock.track_yaw,
                track_roll: self.axis_lock.track_roll,
                lock_to: EulerAngles::new(
                    self.axis_lock.lock_pitch_to,
                    self.axis_lock.lock_yaw_to,
                    self.axis_lock.lock_roll_to,
                ),
                strength: self.axis_lock.strength,
            },
            distance_offset: self.points.distance_offset,
            paused: self.imu.pause_updates,
            verbose: self.logging.verbose,
        }
    }

    pub fn loop_options(&self) -> LoopOptions {
        LoopOptions {
            sample_rate_hz: self.imu.sample_rate_hz,
            calibration_samples: self.imu.calibration_samples,
            default_home: quat::try_normalize(self.imu.default_home).unwrap_or(DQuat::IDENTITY),
            auto_reconnect: self.imu.auto_reconnect,
            reconnect_delay: Duration::from_millis(self.imu.reconnect_delay_ms),
            log_interval: self.log_interval(),
        }
    }

    pub fn tick_params(&self) -> TickParams {
        TickParams {
            hit_tolerance: self.points.hit_tolerance,
            grace_period: Duration::from_secs_f64(self.points.group_grace_period_s.max(0.0)),
            group_cooldown: Duration::from_millis(self.points.group_cooldown_ms),
            evaluation: self.points.group_evaluation,
        }
    }

    pub fn log_interval(&self) -> Duration {
        Duration::from_millis(self.logging.interval_ms)
    }
}
