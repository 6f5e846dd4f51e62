mod console;
mod state;

use anyhow::{Context, Result};
use clap::Parser;
use console::ConsoleCommand;
use gyrobind_config::counter;
use gyrobind_imu::source::{MockSource, ReplaySource, SensorError, SensorSource};
use gyrobind_imu::SensorClient;
use gyrobind_input::sink::{ActionSink, LogSink};
use state::{AppState, Deferred};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

/// Consumer tick period (about 60 Hz).
const TICK_INTERVAL: Duration = Duration::from_millis(16);
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Motion-controller gesture triggers.
#[derive(Debug, Parser)]
#[command(name = "gyrobind", version, about)]
struct Args {
    /// Settings file (defaults to the platform config dir).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Positions, motions and reference points.
    #[arg(long)]
    profile: Option<PathBuf>,
    /// Replay a CSV recording (gx,gy,gz,ax,ay,az[,button]).
    #[arg(long, conflicts_with = "mock")]
    replay: Option<PathBuf>,
    /// Use a stationary simulated controller.
    #[arg(long)]
    mock: bool,
    /// Restart the replay when it ends.
    #[arg(long, requires = "replay")]
    loop_replay: bool,
}

fn open_source(args: &Args) -> Result<Box<dyn SensorSource>> {
    if let Some(path) = &args.replay {
        let source = ReplaySource::from_path(path, args.loop_replay)
            .with_context(|| format!("Failed to open replay {}", path.display()))?;
        return Ok(Box::new(source));
    }
    if args.mock {
        return Ok(Box::new(MockSource::new()));
    }
    Err(SensorError::NotFound).context("No controller source; pass --replay <CSV> or --mock")
}

fn open_sink() -> Box<dyn ActionSink> {
    #[cfg(all(target_os = "linux", feature = "uinput"))]
    match gyrobind_input::uinput_sink::UinputSink::new() {
        Ok(sink) => {
            info!("Injecting input through uinput");
            return Box::new(sink);
        }
        Err(e) => warn!(error = %e, "uinput not available, logging actions instead"),
    }
    Box::new(LogSink)
}

fn lock(state: &Mutex<AppState>) -> MutexGuard<'_, AppState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Run deferred work. Called with the state lock released.
fn run_deferred(work: Vec<Deferred>, state: &Mutex<AppState>, sink: &mut dyn ActionSink) {
    for item in work {
        match item {
            Deferred::Dispatch { source, action } => {
                if let Err(e) = sink.execute(&action) {
                    error!(%source, %action, error = %e, "Action failed");
                }
            }
            Deferred::IncrementRepetitions {
                sequence,
                name,
                path,
            } => match counter::increment(&path) {
                Ok(reps) => {
                    if let Err(e) = lock(state).engine.set_repetition_count(&sequence, reps) {
                        warn!(error = %e, "Motion removed before its count was stored");
                    }
                    info!(sequence = %name, reps, ?path, "Motion completed");
                }
                Err(e) => error!(sequence = %name, error = ?e, "Failed to sync repetition count"),
            },
            Deferred::WriteCount { path, count } => {
                if let Err(e) = counter::write_count(&path, count) {
                    error!(error = ?e, "Failed to write counter file");
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "gyrobind=info,gyrobind_imu=info,gyrobind_match=info,gyrobind_config=info,gyrobind_input=info"
                    .into()
            }),
        )
        .init();

    let args = Args::parse();
    info!("gyrobind starting");

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => gyrobind_config::config_path()?,
    };
    let config = gyrobind_config::load_config(&config_path);
    let profile_path = match &args.profile {
        Some(path) => path.clone(),
        None => gyrobind_config::profile_path()?,
    };
    let profile = gyrobind_config::load_profile(&profile_path)?;

    let source = open_source(&args)?;
    info!(source = source.name(), "Controller source opened");

    let options = config.loop_options();
    let state = Arc::new(Mutex::new(AppState::new(config, profile)));
    let mut sensor = SensorClient::spawn(source, Arc::clone(&state), options)?;
    let mut sink = open_sink();

    let start = Instant::now();
    let mut ticker = tokio::time::interval(TICK_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    info!("Type `help` for console commands");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let work = lock(&state).tick(start.elapsed());
                run_deferred(work, &state, sink.as_mut());
                if !sensor.is_running() {
                    warn!("Sensor thread exited, shutting down");
                    break;
                }
            }
            line = lines.next_line(), if stdin_open => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        stdin_open = false;
                        continue;
                    }
                    Err(e) => {
                        warn!(error = %e, "Console input closed");
                        stdin_open = false;
                        continue;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                let command = match line.parse::<ConsoleCommand>() {
                    Ok(command) => command,
                    Err(e) => {
                        warn!("{e}");
                        continue;
                    }
                };
                let reply = command.apply(&mut lock(&state));
                if let Some(command) = reply.sensor {
                    sensor.send(command);
                }
                run_deferred(reply.work, &state, sink.as_mut());
                if reply.save {
                    save_all(&state, &config_path, &profile_path);
                }
                if reply.quit {
                    info!("Shutting down");
                    break;
                }
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for Ctrl+C");
                }
                info!("Shutting down");
                break;
            }
        }
    }

    sensor.shutdown(SHUTDOWN_TIMEOUT);
    save_all(&state, &config_path, &profile_path);
    Ok(())
}

fn save_all(state: &Mutex<AppState>, config_path: &Path, profile_path: &Path) {
    let (profile, config) = {
        let state = lock(state);
        (state.profile(), state.config.clone())
    };
    if let Err(e) = gyrobind_config::save_profile(profile_path, &profile) {
        error!(?e, "Failed to save profile");
    }
    if let Err(e) = gyrobind_config::save_config(config_path, &config) {
        error!(?e, "Failed to save config");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gyrobind_config::{AppConfig, Profile};
    use gyrobind_input::sink::RecordingSink;
    use gyrobind_input::{Action, Key, MouseButton};
    use gyrobind_match::MotionSequence;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("gyrobind-main-{}-{name}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn failing_action_does_not_stop_later_work() {
        let state = Mutex::new(AppState::new(AppConfig::default(), Profile::default()));
        let count_file = temp_path("count.txt");
        let mut sink = RecordingSink::failing();
        let work = vec![
            Deferred::Dispatch {
                source: "first".into(),
                action: Action::MouseClick(MouseButton::Left),
            },
            Deferred::Dispatch {
                source: "second".into(),
                action: Action::KeyPress(Key::Char('z')),
            },
            Deferred::WriteCount {
                path: count_file.clone(),
                count: 7,
            },
        ];
        run_deferred(work, &state, &mut sink);
        assert_eq!(sink.executed().len(), 2);
        assert_eq!(counter::read_count(&count_file), 7);
        let _ = std::fs::remove_file(count_file);
    }

    #[test]
    fn repetition_file_is_authoritative() {
        let reps = temp_path("reps.txt");
        counter::write_count(&reps, 4).unwrap();
        let mut sequence = MotionSequence::new("Curl");
        sequence.repetition_count = 1;
        let id = sequence.id.clone();
        let profile = Profile {
            sequences: vec![sequence],
            ..Profile::default()
        };
        let state = Mutex::new(AppState::new(AppConfig::default(), profile));

        let work = vec![Deferred::IncrementRepetitions {
            sequence: id.clone(),
            name: "Curl".into(),
            path: reps.clone(),
        }];
        run_deferred(work, &state, &mut LogSink);
        assert_eq!(lock(&state).engine.sequence(&id).unwrap().repetition_count, 5);
        assert_eq!(counter::read_count(&reps), 5);
        let _ = std::fs::remove_file(reps);
    }

    #[test]
    fn no_source_is_an_init_error() {
        let args = Args::parse_from(["gyrobind"]);
        let err = open_source(&args).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<SensorError>(),
            Some(SensorError::NotFound)
        ));
        assert!(open_source(&Args::parse_from(["gyrobind", "--mock"])).is_ok());
    }
}
