use crate::position::{DetectionAxes, RecordedPoint, SavedPosition};
use crate::EditError;
use gyrobind_imu::types::SmoothedSample;
use std::time::Duration;
use tracing::info;

/// Captures evenly spaced smoothed samples for a new position.
///
/// Driven from the consumer tick: call [`capture`](Self::capture) every tick
/// and it takes a sample whenever the next one is due.
#[derive(Debug, Clone)]
pub struct PositionRecorder {
    num_points: u32,
    interval: Duration,
    start: Duration,
    captured: Vec<RecordedPoint>,
}

impl PositionRecorder {
    pub fn new(num_points: u32, duration_ms: u64, start: Duration) -> Result<Self, EditError> {
        if num_points == 0 || duration_ms == 0 {
            return Err(EditError::InvalidRecording {
                num_points,
                duration_ms,
            });
        }
        let interval = if num_points > 1 {
            Duration::from_millis(duration_ms) / (num_points - 1)
        } else {
            Duration::ZERO
        };
        Ok(Self {
            num_points,
            interval,
            start,
            captured: Vec::with_capacity(num_points as usize),
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn captured(&self) -> usize {
        self.captured.len()
    }

    pub fn is_complete(&self) -> bool {
        self.captured.len() >= self.num_points as usize
    }

    /// Take at most one sample. Returns true once all points are in.
    pub fn capture(&mut self, sample: &SmoothedSample, now: Duration) -> bool {
        if self.is_complete() {
            return true;
        }
        let due = self.start + self.interval * self.captured.len() as u32;
        if now >= due {
            self.captured
                .push(RecordedPoint::new(sample.gyro, sample.accel));
        }
        self.is_complete()
    }

    /// Build `Position N` from what was captured, even if stopped early.
    pub fn finish(self, existing_positions: usize, padding: f64) -> Result<SavedPosition, EditError> {
        if self.captured.is_empty() {
            return Err(EditError::EmptyRecording);
        }
        let name = format!("Position {}", existing_positions + 1);
        info!(name = %name, points = self.captured.len(), "Position recorded");
        Ok(SavedPosition::new(
            name,
            self.captured,
            padding,
            DetectionAxes::default(),
        ))
    }
}
