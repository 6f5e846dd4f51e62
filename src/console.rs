use crate::state::{AppState, Deferred, MappingTarget};
use gyrobind_config::{parse_number, SettingsError};
use gyrobind_imu::SensorCommand;
use std::str::FromStr;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConsoleError {
    #[error("unknown command `{0}`, try `help`")]
    Unknown(String),
    #[error("`{command}` needs {what}")]
    MissingArgument {
        command: &'static str,
        what: &'static str,
    },
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Operator commands typed on stdin, one per line.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Help,
    Status,
    Recenter,
    Recalibrate,
    Reconnect,
    HomeSet,
    HomeDelete,
    HomeRebase,
    HomeValues { name: String, values: [f64; 4] },
    Map(MappingTarget),
    Record,
    ResetCount,
    ResetReps(String),
    ClearStockpile,
    Save,
    Quit,
}

pub const HELP: &str = "\
status                      connection, home and counters
recenter | recalibrate | reconnect
home set | home delete | home rebase
home values <w> <x> <y> <z> [name]
map home | map stockpile    bind the next controller button
record                      capture a new position
reset count                 zero the group action total
reset reps <motion name>
stockpile clear
save | quit";

impl FromStr for ConsoleCommand {
    type Err = ConsoleError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let command = match words.as_slice() {
            ["help"] | ["?"] => Self::Help,
            ["status"] => Self::Status,
            ["recenter"] => Self::Recenter,
            ["recalibrate"] => Self::Recalibrate,
            ["reconnect"] => Self::Reconnect,
            ["home", "set"] => Self::HomeSet,
            ["home", "delete"] => Self::HomeDelete,
            ["home", "rebase"] => Self::HomeRebase,
            ["home", "values", w, x, y, z, name @ ..] => {
                let mut values = [0.0; 4];
                for (slot, (field, text)) in values
                    .iter_mut()
                    .zip([("w", w), ("x", x), ("y", y), ("z", z)])
                {
                    *slot = parse_number(field, text, -1.0, 1.0)?;
                }
                let name = if name.is_empty() {
                    "Home".to_string()
                } else {
                    name.join(" ")
                };
                Self::HomeValues { name, values }
            }
            ["home", "values", ..] => {
                return Err(ConsoleError::MissingArgument {
                    command: "home values",
                    what: "four quaternion components",
                })
            }
            ["map", "home"] => Self::Map(MappingTarget::Home),
            ["map", "stockpile"] => Self::Map(MappingTarget::Stockpile),
            ["record"] => Self::Record,
            ["reset", "count"] => Self::ResetCount,
            ["reset", "reps", name @ ..] if !name.is_empty() => Self::ResetReps(name.join(" ")),
            ["reset", "reps"] => {
                return Err(ConsoleError::MissingArgument {
                    command: "reset reps",
                    what: "a motion name",
                })
            }
            ["stockpile", "clear"] => Self::ClearStockpile,
            ["save"] => Self::Save,
            ["quit"] | ["exit"] => Self::Quit,
            _ => return Err(ConsoleError::Unknown(line.trim().to_string())),
        };
        Ok(command)
    }
}

/// What the main loop must do after a command.
#[derive(Debug, Default, PartialEq)]
pub struct Reply {
    pub sensor: Option<SensorCommand>,
    pub work: Vec<Deferred>,
    pub save: bool,
    pub quit: bool,
}

impl ConsoleCommand {
    /// Apply to the shared state. Runs under the state lock.
    pub fn apply(self, state: &mut AppState) -> Reply {
        let mut reply = Reply::default();
        match self {
            Self::Help => println!("{HELP}"),
            Self::Status => log_status(state),
            Self::Recenter => reply.sensor = Some(SensorCommand::Recenter),
            Self::Recalibrate => {
                reply.sensor = Some(SensorCommand::Recalibrate(state.config.imu.calibration_samples))
            }
            Self::Reconnect => reply.sensor = Some(SensorCommand::Reconnect),
            Self::HomeSet => {
                if !state.set_home() {
                    warn!("No orientation yet, home not set");
                }
            }
            Self::HomeDelete => state.delete_home(),
            Self::HomeRebase => {
                if !state.rebase_home() {
                    warn!("Rebase needs a home position and a live orientation");
                }
            }
            Self::HomeValues { name, values } => {
                if let Err(e) = state.update_home_from_values(&name, values) {
                    warn!(error = %e, "Home not updated");
                }
            }
            Self::Map(target) => state.start_mapping(target),
            Self::Record => state.request_recording(),
            Self::ResetCount => reply.work.extend(state.reset_action_count()),
            Self::ResetReps(name) => {
                let id = state
                    .engine
                    .sequences()
                    .iter()
                    .find(|s| s.name.eq_ignore_ascii_case(&name))
                    .map(|s| s.id.clone());
                match id {
                    Some(id) => reply.work.extend(state.reset_repetitions(&id)),
                    None => warn!(name, "No motion with that name"),
                }
            }
            Self::ClearStockpile => {
                let dropped = state.stockpile.len();
                state.stockpile.clear();
                info!(dropped, "Stockpile cleared");
            }
            Self::Save => reply.save = true,
            Self::Quit => reply.quit = true,
        }
        reply
    }
}

fn log_status(state: &AppState) {
    let highlighted = state
        .highlighted
        .and_then(|i| state.engine.positions().iter().nth(i))
        .map(|p| p.name.as_str());
    info!(
        connection = %state.connection,
        home = state.home.as_ref().map(|h| h.name.as_str()),
        positions = state.engine.positions().len(),
        motions = state.engine.sequences().len(),
        points = state.engine.points().points().len(),
        groups = state.engine.points().groups().len(),
        matched = highlighted,
        recording = state.recorder.is_some(),
        mapping = ?state.mapping,
        stockpiled = state.stockpile.len(),
        total_actions = state.total_actions_completed,
        session_actions = state.session_actions_completed,
        "Status"
    );
    for sequence in state.engine.sequences() {
        info!(
            motion = %sequence.name,
            steps = sequence.steps.len(),
            step = sequence.progress.current_index,
            reps = sequence.repetition_count,
            "Motion"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gyrobind_config::{AppConfig, Profile};
    use gyrobind_match::MotionSequence;
    use std::path::PathBuf;

    fn state_with(sequences: Vec<MotionSequence>) -> AppState {
        let profile = Profile {
            sequences,
            ..Profile::default()
        };
        AppState::new(AppConfig::default(), profile)
    }

    #[test]
    fn parses_commands() {
        assert_eq!("home rebase".parse(), Ok(ConsoleCommand::HomeRebase));
        assert_eq!(
            "  map   stockpile ".parse(),
            Ok(ConsoleCommand::Map(MappingTarget::Stockpile))
        );
        assert_eq!(
            "reset reps Bicep Curl".parse(),
            Ok(ConsoleCommand::ResetReps("Bicep Curl".into()))
        );
        assert_eq!(
            "home values 1 0 0 0".parse(),
            Ok(ConsoleCommand::HomeValues {
                name: "Home".into(),
                values: [1.0, 0.0, 0.0, 0.0],
            })
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            "jump".parse::<ConsoleCommand>(),
            Err(ConsoleError::Unknown(_))
        ));
        assert!(matches!(
            "home values 1 0".parse::<ConsoleCommand>(),
            Err(ConsoleError::MissingArgument { .. })
        ));
        assert!(matches!(
            "home values 1 zero 0 0".parse::<ConsoleCommand>(),
            Err(ConsoleError::Settings(SettingsError::NotANumber { .. }))
        ));
        assert!(matches!(
            "home values 2 0 0 0".parse::<ConsoleCommand>(),
            Err(ConsoleError::Settings(SettingsError::OutOfRange { .. }))
        ));
    }

    #[test]
    fn sensor_commands_are_forwarded() {
        let mut state = state_with(Vec::new());
        let reply = ConsoleCommand::Recalibrate.apply(&mut state);
        assert_eq!(
            reply.sensor,
            Some(SensorCommand::Recalibrate(state.config.imu.calibration_samples))
        );
        assert!(ConsoleCommand::Quit.apply(&mut state).quit);
    }

    #[test]
    fn reset_reps_by_name_rewrites_the_file() {
        let path = PathBuf::from("reps.txt");
        let mut sequence = MotionSequence::new("Curl");
        sequence.repetition_count = 9;
        sequence.export_reps_to_file = true;
        sequence.export_file_path = Some(path.clone());
        let mut state = state_with(vec![sequence]);

        let reply = ConsoleCommand::ResetReps("curl".into()).apply(&mut state);
        assert_eq!(reply.work, vec![Deferred::WriteCount { path, count: 0 }]);
        assert_eq!(state.engine.sequences()[0].repetition_count, 0);

        let missing = ConsoleCommand::ResetReps("nope".into()).apply(&mut state);
        assert!(missing.work.is_empty());
    }

    #[test]
    fn home_values_create_a_normalized_home() {
        let mut state = state_with(Vec::new());
        let command: ConsoleCommand = "home values 0.5 0 0 0 Desk".parse().unwrap();
        command.apply(&mut state);
        let home = state.home.as_ref().unwrap();
        assert_eq!(home.name, "Desk");
        assert!((home.orientation.w - 1.0).abs() < 1e-12);
    }
}
