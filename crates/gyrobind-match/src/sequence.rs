use crate::store::PositionStore;
use crate::types::{PositionId, SequenceId};
use glam::DVec3;
use gyrobind_input::{binding_serde, Action};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Minimum gap between two completions that fire side effects.
pub const ACTION_COOLDOWN: Duration = Duration::from_millis(500);

/// Directional constraint on one axis of a step. Stored but not yet
/// enforced by matching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Any,
    Positive,
    Negative,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GyroDirections {
    #[serde(rename = "Pitch", default)]
    pub pitch: Direction,
    #[serde(rename = "Yaw", default)]
    pub yaw: Direction,
    #[serde(rename = "Roll", default)]
    pub roll: Direction,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccelDirections {
    #[serde(rename = "X", default)]
    pub x: Direction,
    #[serde(rename = "Y", default)]
    pub y: Direction,
    #[serde(rename = "Z", default)]
    pub z: Direction,
}

/// One step of a motion: a reference to a saved position by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionStep {
    pub position_id: PositionId,
    #[serde(default)]
    pub gyro_directions: GyroDirections,
    #[serde(default)]
    pub accel_directions: AccelDirections,
}

impl MotionStep {
    pub fn new(position_id: PositionId) -> Self {
        Self {
            position_id,
            gyro_directions: GyroDirections::default(),
            accel_directions: AccelDirections::default(),
        }
    }
}

/// Runtime matching state; never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SequenceProgress {
    /// Always within `0..steps.len()` between ticks.
    pub current_index: usize,
    pub last_match: Option<Duration>,
    pub non_match_start: Option<Duration>,
    pub completed_this_frame: bool,
    pub last_action_trigger: Option<Duration>,
}

impl SequenceProgress {
    /// Back to the first step. The action cooldown survives.
    pub fn reset(&mut self) {
        self.current_index = 0;
        self.last_match = None;
        self.non_match_start = None;
    }
}

/// A completion that passed the cooldown.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceCompletion {
    pub action: Option<Action>,
    /// Counter file to read, increment and write back. When set, the
    /// in-memory count has not been touched yet.
    pub export: Option<PathBuf>,
}

fn default_time_window_ms() -> u64 {
    1000
}

/// An ordered list of positions to pass through within a time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionSequence {
    #[serde(default = "SequenceId::random")]
    pub id: SequenceId,
    pub name: String,
    #[serde(default)]
    pub steps: Vec<MotionStep>,
    #[serde(default = "default_time_window_ms")]
    pub time_window_ms: u64,
    #[serde(default)]
    pub repetition_count: u64,
    #[serde(default)]
    pub reset_grace_period_ms: u64,
    #[serde(default, with = "binding_serde")]
    pub action_binding: Option<Action>,
    #[serde(default)]
    pub export_reps_to_file: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_file_path: Option<PathBuf>,
    /// Older profiles list bare position ids instead of steps.
    #[serde(default, rename = "positions", skip_serializing)]
    legacy_positions: Vec<PositionId>,
    #[serde(skip)]
    pub progress: SequenceProgress,
}

impl MotionSequence {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: SequenceId::random(),
            name: name.into(),
            steps: Vec::new(),
            time_window_ms: default_time_window_ms(),
            repetition_count: 0,
            reset_grace_period_ms: 100,
            action_binding: None,
            export_reps_to_file: false,
            export_file_path: None,
            legacy_positions: Vec::new(),
            progress: SequenceProgress::default(),
        }
    }

    pub fn with_steps(mut self, positions: impl IntoIterator<Item = PositionId>) -> Self {
        self.set_steps(positions.into_iter().map(MotionStep::new).collect());
        self
    }

    /// Replace the steps and start over.
    pub fn set_steps(&mut self, steps: Vec<MotionStep>) {
        self.steps = steps;
        self.progress.reset();
    }

    /// Counter file in effect, if export is enabled and a path is set.
    pub fn export_path(&self) -> Option<&PathBuf> {
        self.export_file_path
            .as_ref()
            .filter(|_| self.export_reps_to_file)
    }

    /// Convert a legacy `positions` list into steps, dropping unknown ids.
    pub fn resolve_legacy_steps(&mut self, positions: &PositionStore) {
        if self.legacy_positions.is_empty() {
            return;
        }
        let legacy = std::mem::take(&mut self.legacy_positions);
        if !self.steps.is_empty() {
            return;
        }
        for id in legacy {
            if positions.contains(&id) {
                self.steps.push(MotionStep::new(id));
            } else {
                warn!(sequence = %self.name, position = %id, "Unknown position in legacy motion, skipping step");
            }
        }
    }

    /// Advance the state machine by one consumer tick.
    pub fn tick(
        &mut self,
        positions: &PositionStore,
        gyro: DVec3,
        accel: DVec3,
        now: Duration,
    ) -> Option<SequenceCompletion> {
        self.progress.completed_this_frame = false;
        let step = self.steps.get(self.progress.current_index)?;

        let Some(target) = positions.get(&step.position_id) else {
            if self.progress.current_index > 0 {
                warn!(sequence = %self.name, position = %step.position_id, "Motion step target missing, resetting");
            }
            self.progress.reset();
            return None;
        };

        if !target.matches(gyro, accel) {
            self.handle_non_match(now);
            return None;
        }

        let within_window = self.progress.current_index == 0
            || self.progress.last_match.map_or(true, |last| {
                now.saturating_sub(last) <= Duration::from_millis(self.time_window_ms)
            });
        if !within_window {
            debug!(sequence = %self.name, step = self.progress.current_index, "Motion timed out, resetting");
            self.progress.reset();
            return None;
        }

        debug!(sequence = %self.name, step = self.progress.current_index, position = %target.name, "Motion step matched");
        self.progress.last_match = Some(now);
        self.progress.non_match_start = None;
        self.progress.current_index += 1;

        if self.progress.current_index < self.steps.len() {
            return None;
        }
        self.complete(now)
    }

    fn handle_non_match(&mut self, now: Duration) {
        if self.progress.current_index == 0 {
            return;
        }
        match self.progress.non_match_start {
            None => self.progress.non_match_start = Some(now),
            Some(start) => {
                if now.saturating_sub(start) > Duration::from_millis(self.reset_grace_period_ms) {
                    debug!(sequence = %self.name, step = self.progress.current_index, "Motion grace period exceeded, resetting");
                    self.progress.reset();
                }
            }
        }
    }

    fn complete(&mut self, now: Duration) -> Option<SequenceCompletion> {
        let cooled_down = self
            .progress
            .last_action_trigger
            .map_or(true, |last| now.saturating_sub(last) > ACTION_COOLDOWN);
        let fire = !self.progress.completed_this_frame && cooled_down;

        self.progress.current_index = 0;
        self.progress.last_match = None;
        self.progress.completed_this_frame = true;

        if !fire {
            debug!(sequence = %self.name, "Motion completed during cooldown");
            return None;
        }
        self.progress.last_action_trigger = Some(now);

        let export = self.export_path().cloned();
        if export.is_none() {
            if self.export_reps_to_file {
                warn!(sequence = %self.name, "Rep export enabled without a file path, counting in memory");
            }
            self.repetition_count += 1;
            info!(sequence = %self.name, reps = self.repetition_count, "Motion completed");
        }

        Some(SequenceCompletion {
            action: self.action_binding,
            export,
        })
    }
}
