use glam::DQuat;
use gyrobind_imu::types::GyroChannel;
use gyrobind_match::GroupEvaluation;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub imu: ImuConfig,
    pub smoothing: SmoothingConfig,
    pub axis_lock: AxisLockConfig,
    pub points: PointsConfig,
    pub actions: ActionsConfig,
    pub recording: RecordingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImuConfig {
    /// Madgwick filter gain. Higher converges faster and is noisier.
    pub beta: f64,
    /// Gyro drift correction gain. Zero disables bias estimation.
    pub zeta: f64,
    pub correct_drift_when_still: bool,
    /// Accelerometer low-pass alpha (1.0 = no smoothing).
    pub accel_smoothing: f64,
    /// Stationary samples averaged for the initial gyro bias.
    pub calibration_samples: u32,
    pub sample_rate_hz: f64,
    /// Orientation used on start and recenter, stored as `[w, x, y, z]`.
    #[serde(with = "quat_serde")]
    pub default_home: DQuat,
    pub pause_updates: bool,
    pub auto_reconnect: bool,
    pub reconnect_delay_ms: u64,
}

impl Default for ImuConfig {
    fn default() -> Self {
        Self {
            beta: 0.1,
            zeta: 0.05,
            correct_drift_when_still: true,
            accel_smoothing: 0.5,
            calibration_samples: 400,
            sample_rate_hz: 200.0,
            default_home: DQuat::from_xyzw(0.65, 0.0, 0.0, 0.75),
            pause_updates: false,
            auto_reconnect: true,
            reconnect_delay_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Moving-average window for the matcher inputs.
    pub window: usize,
    pub gyro_channel: GyroChannel,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            window: 5,
            gyro_channel: GyroChannel::Orientation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisLockConfig {
    pub track_pitch: bool,
    pub track_yaw: bool,
    pub track_roll: bool,
    /// Degrees.
    pub lock_pitch_to: f64,
    pub lock_yaw_to: f64,
    pub lock_roll_to: f64,
    pub strength: f64,
}

impl Default for AxisLockConfig {
    fn default() -> Self {
        Self {
            track_pitch: true,
            track_yaw: true,
            track_roll: true,
            lock_pitch_to: 0.0,
            lock_yaw_to: 0.0,
            lock_roll_to: 0.0,
            strength: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointsConfig {
    pub hit_tolerance: f64,
    /// Tip distance from the controller origin.
    pub distance_offset: f64,
    pub group_grace_period_s: f64,
    pub group_cooldown_ms: u64,
    pub group_evaluation: GroupEvaluation,
}

impl Default for PointsConfig {
    fn default() -> Self {
        Self {
            hit_tolerance: 0.15,
            distance_offset: 0.5,
            group_grace_period_s: 2.0,
            group_cooldown_ms: 500,
            group_evaluation: GroupEvaluation::OnNewHit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionsConfig {
    /// Queue group actions until the stockpile button releases them.
    pub stockpile_mode: bool,
    /// Text file holding the total number of completed group actions.
    pub action_count_file: Option<PathBuf>,
    pub home_button: Option<String>,
    pub stockpile_button: Option<String>,
    /// Starts a position recording.
    pub record_button: Option<String>,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            stockpile_mode: false,
            action_count_file: None,
            home_button: Some("a".into()),
            stockpile_button: None,
            record_button: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    pub num_points: u32,
    pub duration_ms: u64,
    pub initial_padding: f64,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            num_points: 20,
            duration_ms: 1000,
            initial_padding: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub verbose: bool,
    pub log_tip_position: bool,
    pub interval_ms: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            log_tip_position: false,
            interval_ms: 500,
        }
    }
}

// Quaternions are written scalar-first, `[w, x, y, z]`.
pub(crate) mod quat_serde {
    use glam::DQuat;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(q: &DQuat, s: S) -> Result<S::Ok, S::Error> {
        [q.w, q.x, q.y, q.z].serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DQuat, D::Error> {
        let [w, x, y, z] = <[f64; 4]>::deserialize(d)?;
        Ok(DQuat::from_xyzw(x, y, z, w))
    }
}
