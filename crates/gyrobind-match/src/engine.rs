use crate::points::PointField;
pub use crate::points::{GroupEvaluation, TickParams};
use crate::position::{Axis, SavedPosition};
use crate::sequence::{MotionSequence, MotionStep};
use crate::spatial::find_matching_position;
use crate::store::PositionStore;
use crate::types::{GroupId, PointId, PositionId, SequenceId};
use crate::EditError;
use glam::DVec3;
use gyrobind_imu::types::SensorFrame;
use gyrobind_input::Action;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// The live values a consumer tick matches against.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MatchInput {
    pub gyro: DVec3,
    pub accel: DVec3,
    pub tip: DVec3,
}

impl From<&SensorFrame> for MatchInput {
    fn from(frame: &SensorFrame) -> Self {
        Self {
            gyro: frame.smoothed.gyro,
            accel: frame.smoothed.accel,
            tip: frame.tip,
        }
    }
}

/// Work left for the caller once the shared lock is released.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    SequenceCompleted {
        sequence: SequenceId,
        name: String,
        action: Option<Action>,
        /// Counter file to increment; the count is already updated when `None`.
        export: Option<PathBuf>,
    },
    GroupCompleted {
        group: GroupId,
        name: String,
        action: Option<Action>,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickOutcome {
    /// Index of the first matching saved position.
    pub highlighted: Option<usize>,
    pub newly_hit: Vec<PointId>,
    pub effects: Vec<Effect>,
}

/// Positions, motion sequences and reference points, ticked together.
#[derive(Debug, Clone, Default)]
pub struct MotionEngine {
    positions: PositionStore,
    sequences: Vec<MotionSequence>,
    points: PointField,
}

impl MotionEngine {
    pub fn new(positions: Vec<SavedPosition>, sequences: Vec<MotionSequence>, points: PointField) -> Self {
        let positions = PositionStore::from_positions(positions);
        let mut sequences = sequences;
        for sequence in &mut sequences {
            sequence.resolve_legacy_steps(&positions);
        }
        Self {
            positions,
            sequences,
            points,
        }
    }

    pub fn positions(&self) -> &PositionStore {
        &self.positions
    }

    pub fn sequences(&self) -> &[MotionSequence] {
        &self.sequences
    }

    pub fn points(&self) -> &PointField {
        &self.points
    }

    pub fn points_mut(&mut self) -> &mut PointField {
        &mut self.points
    }

    pub fn tick(&mut self, input: &MatchInput, params: &TickParams, now: Duration) -> TickOutcome {
        let highlighted = find_matching_position(input.gyro, input.accel, self.positions.iter());

        let mut effects = Vec::new();
        for sequence in &mut self.sequences {
            if let Some(done) = sequence.tick(&self.positions, input.gyro, input.accel, now) {
                effects.push(Effect::SequenceCompleted {
                    sequence: sequence.id.clone(),
                    name: sequence.name.clone(),
                    action: done.action,
                    export: done.export,
                });
            }
        }

        let points = self.points.tick(input.tip, params, now);
        effects.extend(points.completed.into_iter().map(|group| Effect::GroupCompleted {
            group: group.group,
            name: group.name,
            action: group.action,
        }));

        TickOutcome {
            highlighted,
            newly_hit: points.newly_hit,
            effects,
        }
    }

    /// Forget mid-sequence progress, e.g. after a connectivity gap.
    pub fn reset_all_progress(&mut self) {
        for sequence in &mut self.sequences {
            sequence.progress.reset();
        }
    }

    fn position_mut(&mut self, id: &PositionId) -> Result<&mut SavedPosition, EditError> {
        self.positions
            .get_mut(id)
            .ok_or_else(|| EditError::UnknownPosition(id.clone()))
    }

    fn sequence_mut(&mut self, id: &SequenceId) -> Result<&mut MotionSequence, EditError> {
        self.sequences
            .iter_mut()
            .find(|s| &s.id == id)
            .ok_or_else(|| EditError::UnknownSequence(id.clone()))
    }

    pub fn sequence(&self, id: &SequenceId) -> Option<&MotionSequence> {
        self.sequences.iter().find(|s| &s.id == id)
    }

    pub fn add_position(&mut self, position: SavedPosition) -> PositionId {
        let id = position.id.clone();
        info!(position = %position.name, "Added position");
        self.positions.insert(position);
        id
    }

    pub fn rename_position(&mut self, id: &PositionId, name: impl Into<String>) -> Result<(), EditError> {
        self.position_mut(id)?.name = name.into();
        Ok(())
    }

    pub fn set_padding(&mut self, id: &PositionId, padding: f64) -> Result<(), EditError> {
        self.position_mut(id)?.padding_factor = padding;
        Ok(())
    }

    /// Toggle one detection axis; refuses to turn off the last one.
    pub fn set_detection_axis(&mut self, id: &PositionId, axis: Axis, enabled: bool) -> Result<(), EditError> {
        let position = self.position_mut(id)?;
        let mut axes = position.detection_axes;
        axes.set(axis, enabled);
        if !axes.any() {
            return Err(EditError::NoDetectionAxes);
        }
        position.detection_axes = axes;
        Ok(())
    }

    pub fn set_custom_averages(
        &mut self,
        id: &PositionId,
        gyro: Option<DVec3>,
        accel: Option<DVec3>,
    ) -> Result<(), EditError> {
        let position = self.position_mut(id)?;
        position.custom_avg_gyro = gyro;
        position.custom_avg_accel = accel;
        Ok(())
    }

    /// Delete a position and every step that points at it.
    pub fn remove_position(&mut self, id: &PositionId) -> Result<SavedPosition, EditError> {
        let removed = self
            .positions
            .remove(id)
            .ok_or_else(|| EditError::UnknownPosition(id.clone()))?;

        for sequence in &mut self.sequences {
            if sequence.steps.iter().any(|step| &step.position_id == id) {
                let steps = sequence
                    .steps
                    .iter()
                    .filter(|step| &step.position_id != id)
                    .cloned()
                    .collect();
                sequence.set_steps(steps);
            }
        }
        info!(position = %removed.name, "Deleted position");
        Ok(removed)
    }

    pub fn add_sequence(&mut self, sequence: MotionSequence) -> SequenceId {
        let id = sequence.id.clone();
        info!(sequence = %sequence.name, "Added motion");
        self.sequences.push(sequence);
        id
    }

    /// Replace the steps of a sequence. Every position must exist.
    pub fn set_steps(&mut self, id: &SequenceId, positions: &[PositionId]) -> Result<(), EditError> {
        if let Some(missing) = positions.iter().find(|p| !self.positions.contains(p)) {
            return Err(EditError::UnknownPosition(missing.clone()));
        }
        let steps = positions.iter().cloned().map(MotionStep::new).collect();
        self.sequence_mut(id)?.set_steps(steps);
        Ok(())
    }

    pub fn rename_sequence(&mut self, id: &SequenceId, name: impl Into<String>) -> Result<(), EditError> {
        self.sequence_mut(id)?.name = name.into();
        Ok(())
    }

    pub fn set_timing(
        &mut self,
        id: &SequenceId,
        time_window_ms: u64,
        reset_grace_period_ms: u64,
    ) -> Result<(), EditError> {
        let sequence = self.sequence_mut(id)?;
        sequence.time_window_ms = time_window_ms;
        sequence.reset_grace_period_ms = reset_grace_period_ms;
        Ok(())
    }

    pub fn set_action(&mut self, id: &SequenceId, action: Option<Action>) -> Result<(), EditError> {
        self.sequence_mut(id)?.action_binding = action;
        Ok(())
    }

    pub fn set_export(&mut self, id: &SequenceId, enabled: bool, path: Option<PathBuf>) -> Result<(), EditError> {
        let sequence = self.sequence_mut(id)?;
        sequence.export_reps_to_file = enabled;
        sequence.export_file_path = path;
        Ok(())
    }

    pub fn set_repetition_count(&mut self, id: &SequenceId, count: u64) -> Result<(), EditError> {
        self.sequence_mut(id)?.repetition_count = count;
        Ok(())
    }

    /// Zero the count. Returns the counter file to rewrite, if exporting.
    pub fn reset_repetitions(&mut self, id: &SequenceId) -> Result<Option<PathBuf>, EditError> {
        let sequence = self.sequence_mut(id)?;
        sequence.repetition_count = 0;
        Ok(sequence.export_path().cloned())
    }

    pub fn remove_sequence(&mut self, id: &SequenceId) -> Result<MotionSequence, EditError> {
        let index = self
            .sequences
            .iter()
            .position(|s| &s.id == id)
            .ok_or_else(|| EditError::UnknownSequence(id.clone()))?;
        Ok(self.sequences.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::{DetectionAxes, RecordedPoint};
    use gyrobind_input::{Key, MouseButton};

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn position_at(name: &str, pitch: f64) -> SavedPosition {
        SavedPosition::new(
            name,
            vec![RecordedPoint::new(DVec3::new(pitch, 0.0, 0.0), DVec3::Z)],
            5.0,
            DetectionAxes::default(),
        )
    }

    fn input(pitch: f64) -> MatchInput {
        MatchInput {
            gyro: DVec3::new(pitch, 0.0, 0.0),
            accel: DVec3::Z,
            tip: DVec3::new(0.0, 0.0, 10.0),
        }
    }

    fn engine() -> (MotionEngine, PositionId, PositionId, SequenceId) {
        let a = position_at("A", 0.0);
        let b = position_at("B", 45.0);
        let (a_id, b_id) = (a.id.clone(), b.id.clone());
        let mut seq = MotionSequence::new("Swing").with_steps([a_id.clone(), b_id.clone()]);
        seq.action_binding = Some(Action::KeyPress(Key::Char('s')));
        let seq_id = seq.id.clone();
        let engine = MotionEngine::new(vec![a, b], vec![seq], PointField::default());
        (engine, a_id, b_id, seq_id)
    }

    #[test]
    fn tick_reports_highlight_and_completion() {
        let (mut engine, _, _, seq_id) = engine();
        let params = TickParams::default();

        let first = engine.tick(&input(0.0), &params, ms(0));
        assert_eq!(first.highlighted, Some(0));
        assert!(first.effects.is_empty());

        let second = engine.tick(&input(45.0), &params, ms(400));
        assert_eq!(second.highlighted, Some(1));
        assert_eq!(
            second.effects,
            vec![Effect::SequenceCompleted {
                sequence: seq_id.clone(),
                name: "Swing".into(),
                action: Some(Action::KeyPress(Key::Char('s'))),
                export: None,
            }]
        );
        assert_eq!(engine.sequence(&seq_id).unwrap().repetition_count, 1);
        assert_eq!(engine.tick(&input(90.0), &params, ms(500)).highlighted, None);
    }

    #[test]
    fn group_completion_becomes_effect() {
        let (mut engine, ..) = engine();
        let points = engine.points_mut();
        points.add_point_with_id("tip".into(), DVec3::new(0.0, 0.0, 10.0)).unwrap();
        let group = points.create_group();
        points.assign_point(&"tip".into(), Some(&group)).unwrap();
        points
            .set_group_action(&group, Some(Action::MouseClick(MouseButton::Right)))
            .unwrap();

        let out = engine.tick(&input(90.0), &TickParams::default(), ms(0));
        assert_eq!(out.newly_hit, vec![PointId::from("tip")]);
        assert!(matches!(
            &out.effects[..],
            [Effect::GroupCompleted { action: Some(Action::MouseClick(MouseButton::Right)), .. }]
        ));
    }

    #[test]
    fn deleting_position_removes_steps_and_resets() {
        let (mut engine, a_id, b_id, seq_id) = engine();
        engine.tick(&input(0.0), &TickParams::default(), ms(0));
        assert_eq!(engine.sequence(&seq_id).unwrap().progress.current_index, 1);

        engine.remove_position(&a_id).unwrap();
        let seq = engine.sequence(&seq_id).unwrap();
        assert_eq!(seq.steps.len(), 1);
        assert_eq!(seq.steps[0].position_id, b_id);
        assert_eq!(seq.progress.current_index, 0);
        assert_eq!(engine.positions().len(), 1);
        assert!(matches!(
            engine.remove_position(&a_id),
            Err(EditError::UnknownPosition(_))
        ));
    }

    #[test]
    fn reset_all_progress_clears_mid_sequence_state() {
        let (mut engine, _, _, seq_id) = engine();
        engine.tick(&input(0.0), &TickParams::default(), ms(0));
        engine.reset_all_progress();
        let progress = engine.sequence(&seq_id).unwrap().progress;
        assert_eq!(progress.current_index, 0);
        assert_eq!(progress.last_match, None);
    }

    #[test]
    fn last_detection_axis_cannot_be_disabled() {
        let (mut engine, a_id, ..) = engine();
        for axis in [Axis::Pitch, Axis::Yaw, Axis::Roll, Axis::X, Axis::Y] {
            engine.set_detection_axis(&a_id, axis, false).unwrap();
        }
        assert_eq!(
            engine.set_detection_axis(&a_id, Axis::Z, false),
            Err(EditError::NoDetectionAxes)
        );
        assert!(engine.positions().get(&a_id).unwrap().detection_axes.z);
    }

    #[test]
    fn set_steps_validates_positions() {
        let (mut engine, a_id, _, seq_id) = engine();
        let ghost = PositionId::from("ghost");
        assert_eq!(
            engine.set_steps(&seq_id, &[a_id.clone(), ghost.clone()]),
            Err(EditError::UnknownPosition(ghost))
        );
        assert_eq!(engine.sequence(&seq_id).unwrap().steps.len(), 2);

        engine.set_steps(&seq_id, &[a_id]).unwrap();
        assert_eq!(engine.sequence(&seq_id).unwrap().steps.len(), 1);
    }

    #[test]
    fn reset_repetitions_reports_export_file() {
        let (mut engine, _, _, seq_id) = engine();
        engine.set_repetition_count(&seq_id, 12).unwrap();
        assert_eq!(engine.reset_repetitions(&seq_id).unwrap(), None);

        engine
            .set_export(&seq_id, true, Some(PathBuf::from("count.txt")))
            .unwrap();
        assert_eq!(
            engine.reset_repetitions(&seq_id).unwrap(),
            Some(PathBuf::from("count.txt"))
        );
        assert_eq!(engine.sequence(&seq_id).unwrap().repetition_count, 0);
        engine.remove_sequence(&seq_id).unwrap();
        assert!(engine.sequences().is_empty());
    }
}
