//! Spatial position matching, motion sequences and reference-point groups.
//!
//! Everything here is driven by an external monotonic clock (`Duration` since
//! an arbitrary epoch) and performs no I/O. Side effects that need a file or
//! an input device are returned as [`engine::Effect`]s for the caller to run
//! after releasing any shared lock.

pub mod engine;
pub mod points;
pub mod position;
pub mod recorder;
pub mod sequence;
pub mod spatial;
pub mod store;
pub mod types;

pub use engine::{Effect, GroupEvaluation, MatchInput, MotionEngine, TickOutcome, TickParams};
pub use points::{PointField, PointGroup, ReferencePoint};
pub use position::{Axis, DetectionAxes, RecordedPoint, SavedPosition};
pub use recorder::PositionRecorder;
pub use sequence::{Direction, MotionSequence, MotionStep, SequenceProgress};
pub use store::PositionStore;
pub use types::{GroupId, PointId, PositionId, SequenceId};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EditError {
    #[error("no position with id {0}")]
    UnknownPosition(PositionId),
    #[error("no motion sequence with id {0}")]
    UnknownSequence(SequenceId),
    #[error("no reference point with id {0}")]
    UnknownPoint(PointId),
    #[error("no group with id {0}")]
    UnknownGroup(GroupId),
    #[error("reference point id {0} is already in use")]
    DuplicatePointId(PointId),
    #[error("at least one detection axis must stay enabled")]
    NoDetectionAxes,
    #[error("chaining {point} behind {parent} would create a cycle")]
    ChainCycle { point: PointId, parent: PointId },
    #[error("recording captured no samples")]
    EmptyRecording,
    #[error("invalid recording parameters: {num_points} points over {duration_ms} ms")]
    InvalidRecording { num_points: u32, duration_ms: u64 },
}
