use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw sensor reading from the controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawImuSample {
    /// Gyroscope angular velocity (rad/s).
    pub gyro: DVec3,
    /// Accelerometer linear acceleration (g).
    pub accel: DVec3,
}

impl RawImuSample {
    pub fn new(gyro: DVec3, accel: DVec3) -> Self {
        Self { gyro, accel }
    }

    /// A controller lying still and level.
    pub fn at_rest() -> Self {
        Self {
            gyro: DVec3::ZERO,
            accel: DVec3::Z,
        }
    }
}

/// Orientation as pitch (X), yaw (Y) and roll (Z) in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EulerAngles {
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
}

impl EulerAngles {
    pub fn new(pitch: f64, yaw: f64, roll: f64) -> Self {
        Self { pitch, yaw, roll }
    }

    pub fn as_vec3(&self) -> DVec3 {
        DVec3::new(self.pitch, self.yaw, self.roll)
    }
}

/// Per-axis smoothed values that feed the spatial matcher.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SmoothedSample {
    /// Pitch, yaw, roll channel (degrees or deg/s, see [`GyroChannel`]).
    pub gyro: DVec3,
    /// Accelerometer X, Y, Z (g).
    pub accel: DVec3,
}

/// What the gyro channel of a [`SmoothedSample`] carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GyroChannel {
    /// Fused orientation as Euler angles (degrees).
    #[default]
    Orientation,
    /// Bias-corrected angular rate (deg/s).
    Rate,
}

/// Axis locking: untracked axes are pulled toward a fixed angle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisLock {
    pub track_pitch: bool,
    pub track_yaw: bool,
    pub track_roll: bool,
    /// Target angles (degrees) for untracked axes.
    pub lock_to: EulerAngles,
    /// Slerp factor per sample: 0 leaves the filter alone, 1 snaps.
    pub strength: f64,
}

impl Default for AxisLock {
    fn default() -> Self {
        Self {
            track_pitch: true,
            track_yaw: true,
            track_roll: true,
            lock_to: EulerAngles::default(),
            strength: 0.1,
        }
    }
}

impl AxisLock {
    pub fn is_active(&self) -> bool {
        !(self.track_pitch && self.track_yaw && self.track_roll)
    }
}

/// Tunable parameters read by the sensor loop on every sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterTuning {
    /// Madgwick gain.
    pub beta: f64,
    /// Gyro bias correction gain. Zero disables bias estimation.
    pub zeta: f64,
    /// Only estimate bias while the controller is still.
    pub correct_drift_when_still: bool,
    /// Accelerometer low-pass alpha.
    pub accel_alpha: f64,
    /// Moving-average window for the matcher channels.
    pub smoothing_window: usize,
    pub gyro_channel: GyroChannel,
    pub axis_lock: AxisLock,
    /// Distance of the tracked tip from the controller origin.
    pub distance_offset: f64,
    /// Skip sensor updates entirely.
    pub paused: bool,
    /// Log orientation and bias at the logging interval.
    pub verbose: bool,
}

impl Default for FilterTuning {
    fn default() -> Self {
        Self {
            beta: 0.1,
            zeta: 0.05,
            correct_drift_when_still: true,
            accel_alpha: 0.5,
            smoothing_window: 5,
            gyro_channel: GyroChannel::Orientation,
            axis_lock: AxisLock::default(),
            distance_offset: 0.5,
            paused: false,
            verbose: false,
        }
    }
}

/// Everything the sensor loop computes for one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorFrame {
    /// Fused orientation (unit quaternion).
    pub quaternion: DQuat,
    /// `quaternion` as Euler angles.
    pub euler: EulerAngles,
    pub raw_gyro: DVec3,
    pub raw_accel: DVec3,
    /// Accelerometer after the low-pass filter.
    pub accel_filtered: DVec3,
    pub smoothed: SmoothedSample,
    /// Tracked tip position in world space.
    pub tip: DVec3,
    pub gyro_bias: DVec3,
    /// Locked axes (pitch, yaw, roll) that moved past the lock threshold.
    pub unintended_movement: [bool; 3],
    /// Seconds since the previous sample.
    pub sample_period: f64,
}

impl Default for SensorFrame {
    fn default() -> Self {
        Self {
            quaternion: DQuat::IDENTITY,
            euler: EulerAngles::default(),
            raw_gyro: DVec3::ZERO,
            raw_accel: DVec3::ZERO,
            accel_filtered: DVec3::ZERO,
            smoothed: SmoothedSample::default(),
            tip: DVec3::ZERO,
            gyro_bias: DVec3::ZERO,
            unintended_movement: [false; 3],
            sample_period: 0.0,
        }
    }
}

impl SensorFrame {
    pub fn any_unintended_movement(&self) -> bool {
        self.unintended_movement.iter().any(|&moved| moved)
    }
}

/// Connection status reported by the sensor loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Searching,
    Calibrating,
    Connected,
    Reconnecting,
    Disconnected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ConnectionState::Searching => "Searching for controller...",
            ConnectionState::Calibrating => "Calibrating... Keep controller still.",
            ConnectionState::Connected => "Controller connected",
            ConnectionState::Reconnecting => "Attempting reconnect...",
            ConnectionState::Disconnected => "Controller disconnected",
        };
        f.write_str(text)
    }
}
