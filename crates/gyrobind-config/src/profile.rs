use crate::counter;
use crate::types::quat_serde;
use glam::DQuat;
use gyrobind_match::{MotionEngine, MotionSequence, PointField, PointGroup, ReferencePoint, SavedPosition};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Saved orientation the home button returns to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomePosition {
    pub name: String,
    /// `[w, x, y, z]`.
    #[serde(with = "quat_serde")]
    pub orientation: DQuat,
}

impl HomePosition {
    pub fn new(orientation: DQuat) -> Self {
        Self {
            name: "Home".into(),
            orientation,
        }
    }
}

/// Every user-created entity, saved as one TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home: Option<HomePosition>,
    #[serde(default)]
    pub positions: Vec<SavedPosition>,
    #[serde(default)]
    pub sequences: Vec<MotionSequence>,
    #[serde(default)]
    pub reference_points: Vec<ReferencePoint>,
    #[serde(default)]
    pub groups: Vec<PointGroup>,
}

impl Profile {
    /// Snapshot the live entities for saving.
    pub fn capture(home: Option<&HomePosition>, engine: &MotionEngine) -> Self {
        Self {
            home: home.cloned(),
            positions: engine.positions().to_vec(),
            sequences: engine.sequences().to_vec(),
            reference_points: engine.points().points().to_vec(),
            groups: engine.points().groups().to_vec(),
        }
    }

    /// Sequences exporting to a counter file take their count from it.
    pub fn sync_repetition_counts(&mut self) {
        for sequence in &mut self.sequences {
            if let Some(path) = sequence.export_path() {
                let count = counter::read_count(path);
                debug!(sequence = %sequence.name, count, "Repetition count loaded from file");
                sequence.repetition_count = count;
            }
        }
    }

    pub fn into_engine(self) -> (Option<HomePosition>, MotionEngine) {
        let points = PointField::new(self.reference_points, self.groups);
        let engine = MotionEngine::new(self.positions, self.sequences, points);
        (self.home, engine)
    }
}
