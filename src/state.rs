use gyrobind_config::{quaternion_from_values, AppConfig, HomePosition, Profile, SettingsError};
use gyrobind_imu::quat;
use gyrobind_imu::types::{ConnectionState, FilterTuning, SensorFrame};
use gyrobind_imu::{SensorCommand, SensorHub};
use gyrobind_input::queue::ActionQueue;
use gyrobind_input::Action;
use gyrobind_match::{Effect, MatchInput, MotionEngine, PositionRecorder, SequenceId};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Which button the next press gets bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingTarget {
    Home,
    Stockpile,
}

/// Work that must run with the state lock released.
#[derive(Debug, Clone, PartialEq)]
pub enum Deferred {
    Dispatch { source: String, action: Action },
    /// Read, increment and write a repetition counter file, then store the
    /// new value on the sequence.
    IncrementRepetitions {
        sequence: SequenceId,
        name: String,
        path: PathBuf,
    },
    WriteCount { path: PathBuf, count: u64 },
}

/// Everything the sensor thread and the consumer tick share, behind one mutex.
pub struct AppState {
    pub config: AppConfig,
    pub engine: MotionEngine,
    pub home: Option<HomePosition>,
    pub latest: Option<SensorFrame>,
    pub connection: ConnectionState,
    /// Index of the saved position currently matched.
    pub highlighted: Option<usize>,
    pub mapping: Option<MappingTarget>,
    pub recorder: Option<PositionRecorder>,
    pub stockpile: ActionQueue,
    pub total_actions_completed: u64,
    pub session_actions_completed: u64,
    record_requested: bool,
    pending: Vec<Deferred>,
    last_tip_log: Option<Duration>,
}

impl AppState {
    pub fn new(config: AppConfig, profile: Profile) -> Self {
        let (home, engine) = profile.into_engine();
        let total_actions_completed = config
            .actions
            .action_count_file
            .as_deref()
            .map_or(0, gyrobind_config::counter::read_count);
        Self {
            config,
            engine,
            home,
            latest: None,
            connection: ConnectionState::Searching,
            highlighted: None,
            mapping: None,
            recorder: None,
            stockpile: ActionQueue::new(),
            total_actions_completed,
            session_actions_completed: 0,
            record_requested: false,
            pending: Vec::new(),
            last_tip_log: None,
        }
    }

    pub fn profile(&self) -> Profile {
        Profile::capture(self.home.as_ref(), &self.engine)
    }

    /// Bind the next pressed button to `target`; asking again cancels.
    pub fn start_mapping(&mut self, target: MappingTarget) {
        self.mapping = if self.mapping == Some(target) {
            info!(?target, "Button mapping cancelled");
            None
        } else {
            info!(?target, "Press a controller button to map");
            Some(target)
        };
    }

    /// Command that returns the controller to home, or recenters without one.
    pub fn zero_orientation(&self) -> SensorCommand {
        match &self.home {
            Some(home) => SensorCommand::GoHome(home.orientation),
            None => SensorCommand::Recenter,
        }
    }

    /// Store the current orientation as home. False before the first frame.
    pub fn set_home(&mut self) -> bool {
        let Some(frame) = &self.latest else {
            return false;
        };
        self.home = Some(HomePosition::new(frame.quaternion));
        info!("Home position set");
        true
    }

    pub fn delete_home(&mut self) {
        if self.home.take().is_some() {
            info!("Home position deleted");
        }
    }

    /// Set home from typed `[w, x, y, z]` values, normalized.
    pub fn update_home_from_values(&mut self, name: &str, values: [f64; 4]) -> Result<(), SettingsError> {
        let orientation = quaternion_from_values(values)?;
        self.home = Some(HomePosition {
            name: name.to_string(),
            orientation,
        });
        info!(name, "Home position updated");
        Ok(())
    }

    /// Rotate all reference points by the change from the old home to the
    /// current orientation, which becomes the new home.
    pub fn rebase_home(&mut self) -> bool {
        let (Some(home), Some(frame)) = (self.home.as_mut(), self.latest.as_ref()) else {
            return false;
        };
        let current = frame.quaternion;
        let delta = quat::multiply(current, quat::inverse(home.orientation));
        self.engine.points_mut().rebase(delta);
        home.orientation = current;
        info!(points = self.engine.points().points().len(), "Home rebased, reference points moved");
        true
    }

    /// Zero the group action total. Returns the file rewrite to run.
    pub fn reset_action_count(&mut self) -> Option<Deferred> {
        self.total_actions_completed = 0;
        self.session_actions_completed = 0;
        self.action_count_write()
    }

    pub fn reset_repetitions(&mut self, sequence: &SequenceId) -> Option<Deferred> {
        match self.engine.reset_repetitions(sequence) {
            Ok(path) => path.map(|path| Deferred::WriteCount { path, count: 0 }),
            Err(e) => {
                warn!(error = %e, "Failed to reset repetitions");
                None
            }
        }
    }

    pub fn request_recording(&mut self) {
        self.record_requested = true;
    }

    fn action_count_write(&self) -> Option<Deferred> {
        self.config
            .actions
            .action_count_file
            .clone()
            .map(|path| Deferred::WriteCount {
                path,
                count: self.total_actions_completed,
            })
    }

    fn is_button(setting: &Option<String>, button: &str) -> bool {
        setting
            .as_deref()
            .is_some_and(|mapped| mapped.eq_ignore_ascii_case(button))
    }

    /// One consumer tick: recording, matching and trigger bookkeeping.
    /// Returns the work to run once the lock is released.
    pub fn tick(&mut self, now: Duration) -> Vec<Deferred> {
        let mut work = std::mem::take(&mut self.pending);
        let Some(frame) = self.latest else {
            return work;
        };

        self.advance_recording(&frame, now);
        self.log_tip(&frame, now);

        let params = self.config.tick_params();
        let outcome = self.engine.tick(&MatchInput::from(&frame), &params, now);
        if outcome.highlighted != self.highlighted {
            let name = outcome
                .highlighted
                .and_then(|i| self.engine.positions().iter().nth(i))
                .map(|p| p.name.clone());
            debug!(position = ?name, "Matched position changed");
            self.highlighted = outcome.highlighted;
        }

        for effect in outcome.effects {
            match effect {
                Effect::SequenceCompleted {
                    sequence,
                    name,
                    action,
                    export,
                } => {
                    if let Some(path) = export {
                        work.push(Deferred::IncrementRepetitions {
                            sequence,
                            name: name.clone(),
                            path,
                        });
                    }
                    if let Some(action) = action {
                        work.push(Deferred::Dispatch { source: name, action });
                    }
                }
                Effect::GroupCompleted { name, action, .. } => {
                    self.total_actions_completed += 1;
                    self.session_actions_completed += 1;
                    info!(
                        group = %name,
                        total = self.total_actions_completed,
                        session = self.session_actions_completed,
                        "Group action completed"
                    );
                    work.extend(self.action_count_write());

                    let Some(action) = action else {
                        continue;
                    };
                    if self.config.actions.stockpile_mode {
                        self.stockpile.push(name, action);
                    } else {
                        work.push(Deferred::Dispatch { source: name, action });
                    }
                }
            }
        }
        work
    }

    fn advance_recording(&mut self, frame: &SensorFrame, now: Duration) {
        if std::mem::take(&mut self.record_requested) && self.recorder.is_none() {
            let rec = &self.config.recording;
            match PositionRecorder::new(rec.num_points, rec.duration_ms, now) {
                Ok(recorder) => {
                    info!(points = rec.num_points, duration_ms = rec.duration_ms, "Recording position");
                    self.recorder = Some(recorder);
                }
                Err(e) => warn!(error = %e, "Cannot start recording"),
            }
        }

        let Some(recorder) = self.recorder.as_mut() else {
            return;
        };
        if !recorder.capture(&frame.smoothed, now) {
            return;
        }
        let Some(recorder) = self.recorder.take() else {
            return;
        };
        match recorder.finish(self.engine.positions().len(), self.config.recording.initial_padding) {
            Ok(position) => {
                self.engine.add_position(position);
            }
            Err(e) => warn!(error = %e, "Recording failed"),
        }
    }

    fn log_tip(&mut self, frame: &SensorFrame, now: Duration) {
        if !self.config.logging.log_tip_position {
            return;
        }
        let interval = self.config.log_interval();
        if self
            .last_tip_log
            .is_some_and(|last| now.saturating_sub(last) < interval)
        {
            return;
        }
        self.last_tip_log = Some(now);
        info!(
            x = format_args!("{:.2}", frame.tip.x),
            y = format_args!("{:.2}", frame.tip.y),
            z = format_args!("{:.2}", frame.tip.z),
            "Tip position"
        );
    }
}

impl SensorHub for AppState {
    fn tuning(&self) -> FilterTuning {
        self.config.filter_tuning()
    }

    fn publish(&mut self, frame: &SensorFrame) {
        self.latest = Some(*frame);
    }

    fn connection_changed(&mut self, state: ConnectionState) {
        if matches!(state, ConnectionState::Connected | ConnectionState::Reconnecting) {
            self.engine.reset_all_progress();
        }
        if state != ConnectionState::Connected {
            self.latest = None;
        }
        self.connection = state;
    }

    fn button_pressed(&mut self, button: &str) -> Option<SensorCommand> {
        if let Some(target) = self.mapping.take() {
            let slot = match target {
                MappingTarget::Home => &mut self.config.actions.home_button,
                MappingTarget::Stockpile => &mut self.config.actions.stockpile_button,
            };
            *slot = Some(button.to_string());
            info!(?target, button, "Button mapped");
            return None;
        }

        let actions = &self.config.actions;
        if Self::is_button(&actions.home_button, button) {
            info!(button, home = self.home.is_some(), "Returning to home");
            return Some(self.zero_orientation());
        }
        if Self::is_button(&actions.stockpile_button, button) {
            match self.stockpile.pop() {
                Some(queued) => {
                    info!(source = %queued.source, remaining = self.stockpile.len(), "Releasing stockpiled action");
                    self.pending.push(Deferred::Dispatch {
                        source: queued.source,
                        action: queued.action,
                    });
                }
                None => debug!("Stockpile is empty"),
            }
            return None;
        }
        if Self::is_button(&actions.record_button, button) {
            self.request_recording();
            return None;
        }
        debug!(button, "Unmapped button");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{DQuat, DVec3};
    use gyrobind_imu::types::{EulerAngles, SmoothedSample};
    use gyrobind_input::{Key, MouseButton};
    use gyrobind_match::{DetectionAxes, MotionSequence, RecordedPoint, SavedPosition};

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn frame(pitch: f64, tip: DVec3) -> SensorFrame {
        SensorFrame {
            quaternion: DQuat::IDENTITY,
            euler: EulerAngles::default(),
            raw_gyro: DVec3::ZERO,
            raw_accel: DVec3::Z,
            accel_filtered: DVec3::Z,
            smoothed: SmoothedSample {
                gyro: DVec3::new(pitch, 0.0, 0.0),
                accel: DVec3::Z,
            },
            tip,
            gyro_bias: DVec3::ZERO,
            unintended_movement: [false; 3],
            sample_period: 0.005,
        }
    }

    fn with_group(action: Action) -> AppState {
        let mut state = AppState::new(AppConfig::default(), Profile::default());
        let points = state.engine.points_mut();
        points.add_point_with_id("p".into(), DVec3::Z).unwrap();
        let group = points.create_group();
        points.assign_point(&"p".into(), Some(&group)).unwrap();
        points.set_group_action(&group, Some(action)).unwrap();
        state
    }

    #[test]
    fn group_action_is_deferred() {
        let mut state = with_group(Action::KeyPress(Key::Char('k')));
        state.publish(&frame(0.0, DVec3::Z));
        let work = state.tick(ms(0));
        assert_eq!(
            work,
            vec![Deferred::Dispatch {
                source: "New Group".into(),
                action: Action::KeyPress(Key::Char('k')),
            }]
        );
        assert_eq!(state.total_actions_completed, 1);
        assert_eq!(state.session_actions_completed, 1);
    }

    #[test]
    fn stockpile_mode_queues_until_button() {
        let mut state = with_group(Action::MouseClick(MouseButton::Left));
        state.config.actions.stockpile_mode = true;
        state.config.actions.stockpile_button = Some("b".into());
        state.config.actions.action_count_file = Some(PathBuf::from("count.txt"));

        state.publish(&frame(0.0, DVec3::Z));
        let work = state.tick(ms(0));
        assert_eq!(
            work,
            vec![Deferred::WriteCount {
                path: PathBuf::from("count.txt"),
                count: 1,
            }]
        );
        assert_eq!(state.stockpile.len(), 1);

        assert_eq!(state.button_pressed("B"), None);
        let released = state.tick(ms(16));
        assert!(matches!(
            released.as_slice(),
            [Deferred::Dispatch { action: Action::MouseClick(MouseButton::Left), .. }]
        ));
        assert!(state.stockpile.is_empty());
    }

    #[test]
    fn sequence_export_is_deferred() {
        let position = SavedPosition::new(
            "Still",
            vec![RecordedPoint::new(DVec3::ZERO, DVec3::Z)],
            5.0,
            DetectionAxes::default(),
        );
        let mut sequence = MotionSequence::new("Hold").with_steps([position.id.clone()]);
        sequence.export_reps_to_file = true;
        sequence.export_file_path = Some(PathBuf::from("reps.txt"));
        let seq_id = sequence.id.clone();
        let profile = Profile {
            positions: vec![position],
            sequences: vec![sequence],
            ..Profile::default()
        };
        let mut state = AppState::new(AppConfig::default(), profile);

        state.publish(&frame(0.0, DVec3::splat(9.0)));
        let work = state.tick(ms(0));
        assert_eq!(state.highlighted, Some(0));
        assert_eq!(
            work,
            vec![Deferred::IncrementRepetitions {
                sequence: seq_id,
                name: "Hold".into(),
                path: PathBuf::from("reps.txt"),
            }]
        );
    }

    #[test]
    fn home_button_goes_home_when_set() {
        let mut state = AppState::new(AppConfig::default(), Profile::default());
        assert_eq!(state.button_pressed("a"), Some(SensorCommand::Recenter));

        let q = DQuat::from_rotation_x(0.3);
        state.update_home_from_values("Desk", [q.w, q.x, q.y, q.z]).unwrap();
        assert!(matches!(state.button_pressed("A"), Some(SensorCommand::GoHome(h)) if h.abs_diff_eq(q, 1e-9)));

        assert_eq!(
            state.update_home_from_values("Zero", [0.0; 4]),
            Err(SettingsError::ZeroQuaternion)
        );
        assert_eq!(state.home.as_ref().unwrap().name, "Desk");
        state.delete_home();
        assert_eq!(state.zero_orientation(), SensorCommand::Recenter);
    }

    #[test]
    fn mapping_binds_next_button() {
        let mut state = AppState::new(AppConfig::default(), Profile::default());
        state.start_mapping(MappingTarget::Stockpile);
        state.start_mapping(MappingTarget::Stockpile);
        assert_eq!(state.mapping, None);

        state.start_mapping(MappingTarget::Home);
        assert_eq!(state.button_pressed("guide"), None);
        assert_eq!(state.config.actions.home_button.as_deref(), Some("guide"));
        assert_eq!(state.button_pressed("a"), None);
        assert_eq!(state.button_pressed("guide"), Some(SensorCommand::Recenter));
    }

    #[test]
    fn rebase_moves_points_with_home() {
        let mut state = AppState::new(AppConfig::default(), Profile::default());
        state.engine.points_mut().add_point_with_id("p".into(), DVec3::X).unwrap();
        assert!(!state.rebase_home());

        state.publish(&frame(0.0, DVec3::ZERO));
        assert!(state.set_home());
        let mut turned = frame(0.0, DVec3::ZERO);
        turned.quaternion = DQuat::from_rotation_z(std::f64::consts::FRAC_PI_2);
        state.publish(&turned);
        assert!(state.rebase_home());

        let moved = state.engine.points().points()[0].position;
        assert!((moved - DVec3::Y).length() < 1e-9);
        assert_eq!(state.home.as_ref().map(|h| h.orientation), Some(turned.quaternion));
    }

    #[test]
    fn record_button_captures_a_position() {
        let mut state = AppState::new(AppConfig::default(), Profile::default());
        state.config.actions.record_button = Some("x".into());
        state.config.recording.num_points = 3;
        state.config.recording.duration_ms = 100;

        state.publish(&frame(10.0, DVec3::ZERO));
        state.button_pressed("x");
        for t in [0, 50, 100] {
            state.tick(ms(t));
        }
        assert!(state.recorder.is_none());
        let position = state.engine.positions().iter().next().unwrap();
        assert_eq!(position.name, "Position 1");
        assert_eq!(position.recorded_points().len(), 3);
    }

    #[test]
    fn reconnect_resets_sequence_progress() {
        let a = SavedPosition::new("A", vec![RecordedPoint::new(DVec3::ZERO, DVec3::Z)], 5.0, DetectionAxes::default());
        let b = SavedPosition::new(
            "B",
            vec![RecordedPoint::new(DVec3::splat(40.0), DVec3::Z)],
            5.0,
            DetectionAxes::default(),
        );
        let sequence = MotionSequence::new("AB").with_steps([a.id.clone(), b.id.clone()]);
        let profile = Profile {
            positions: vec![a, b],
            sequences: vec![sequence],
            ..Profile::default()
        };
        let mut state = AppState::new(AppConfig::default(), profile);
        state.publish(&frame(0.0, DVec3::ZERO));
        state.tick(ms(0));
        assert_eq!(state.engine.sequences()[0].progress.current_index, 1);

        state.connection_changed(ConnectionState::Reconnecting);
        assert_eq!(state.engine.sequences()[0].progress.current_index, 0);
        assert!(state.latest.is_none());
        assert!(state.tick(ms(16)).is_empty());
    }
}
