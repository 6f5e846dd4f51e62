pub mod axis_lock;
pub mod estimator;
pub mod filters;
pub mod fusion;
pub mod quat;
pub mod source;
pub mod types;

use anyhow::{Context, Result};
use fusion::MotionPipeline;
use glam::DQuat;
use source::{SensorError, SensorSource};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use types::{ConnectionState, FilterTuning, SensorFrame};

/// Sleep while sensor updates are paused.
const PAUSED_SLEEP: Duration = Duration::from_millis(10);
/// Granularity of waits between reconnect attempts.
const RECONNECT_POLL: Duration = Duration::from_millis(20);

/// Requests handled by the sensor thread between samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorCommand {
    /// Reset to the default home orientation.
    Recenter,
    /// Reset to a saved home orientation.
    GoHome(DQuat),
    /// Restart gyro bias calibration with this many samples.
    Recalibrate(u32),
    /// Reopen the controller.
    Reconnect,
}

/// Shared state the sensor thread reads tuning from and publishes into.
///
/// Each call happens under the shared mutex and must return quickly.
pub trait SensorHub: Send + 'static {
    fn tuning(&self) -> FilterTuning;

    fn publish(&mut self, frame: &SensorFrame);

    fn connection_changed(&mut self, state: ConnectionState);

    /// A controller button was pressed. May ask the sensor loop to act on it.
    fn button_pressed(&mut self, button: &str) -> Option<SensorCommand>;
}

#[derive(Debug, Clone)]
pub struct LoopOptions {
    pub sample_rate_hz: f64,
    pub calibration_samples: u32,
    pub default_home: DQuat,
    pub auto_reconnect: bool,
    pub reconnect_delay: Duration,
    /// Minimum spacing of verbose orientation log lines.
    pub log_interval: Duration,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            sample_rate_hz: 200.0,
            calibration_samples: 400,
            default_home: DQuat::from_xyzw(0.65, 0.0, 0.0, 0.75),
            auto_reconnect: true,
            reconnect_delay: Duration::from_millis(2000),
            log_interval: Duration::from_millis(500),
        }
    }
}

/// Handle to the dedicated sensor thread.
///
/// Polls the source at the configured rate, runs the [`MotionPipeline`] and
/// publishes frames into the shared hub.
pub struct SensorClient {
    command_tx: mpsc::UnboundedSender<SensorCommand>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SensorClient {
    pub fn spawn<S, H>(source: S, hub: Arc<Mutex<H>>, options: LoopOptions) -> Result<Self>
    where
        S: SensorSource + 'static,
        H: SensorHub,
    {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let running = Arc::new(AtomicBool::new(true));

        tracing::info!(source = source.name(), rate = options.sample_rate_hz, "Starting sensor thread");
        let flag = running.clone();
        let handle = std::thread::Builder::new()
            .name("gyrobind-sensor".into())
            .spawn(move || sensor_loop(source, hub, command_rx, flag, options))
            .context("Failed to spawn sensor thread")?;

        Ok(Self {
            command_tx,
            running,
            handle: Some(handle),
        })
    }

    pub fn recenter(&self) {
        self.send(SensorCommand::Recenter);
    }

    pub fn go_home(&self, home: DQuat) {
        self.send(SensorCommand::GoHome(home));
    }

    pub fn recalibrate(&self, samples: u32) {
        self.send(SensorCommand::Recalibrate(samples));
    }

    pub fn reconnect(&self) {
        self.send(SensorCommand::Reconnect);
    }

    pub fn send(&self, command: SensorCommand) {
        if self.command_tx.send(command).is_err() {
            tracing::warn!(?command, "Sensor thread is not running");
        }
    }

    pub fn command_sender(&self) -> mpsc::UnboundedSender<SensorCommand> {
        self.command_tx.clone()
    }

    /// Whether the sensor thread is still alive.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the sensor thread, waiting at most `timeout`.
    ///
    /// Returns false if the thread did not stop in time; it is detached.
    pub fn shutdown(&mut self, timeout: Duration) -> bool {
        self.running.store(false, Ordering::Relaxed);
        let Some(handle) = self.handle.take() else {
            return true;
        };

        let deadline = Instant::now() + timeout;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                tracing::warn!(?timeout, "Sensor thread did not stop in time");
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        if handle.join().is_err() {
            tracing::error!("Sensor thread panicked");
        }
        true
    }
}

impl Drop for SensorClient {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

fn lock<H>(hub: &Mutex<H>) -> MutexGuard<'_, H> {
    hub.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn notify<H: SensorHub>(hub: &Mutex<H>, state: ConnectionState) {
    tracing::info!(%state, "Connection state changed");
    lock(hub).connection_changed(state);
}

/// Sensor thread body: poll, fuse, publish until `running` clears.
fn sensor_loop<S, H>(
    mut source: S,
    hub: Arc<Mutex<H>>,
    mut command_rx: mpsc::UnboundedReceiver<SensorCommand>,
    running: Arc<AtomicBool>,
    options: LoopOptions,
) where
    S: SensorSource,
    H: SensorHub,
{
    let period = Duration::from_secs_f64(1.0 / options.sample_rate_hz.max(1.0));
    let tuning = lock(&hub).tuning();
    let mut pipeline =
        MotionPipeline::new(options.default_home, options.calibration_samples, &tuning);

    let mut connected = source.is_connected();
    notify(
        &hub,
        if connected {
            ConnectionState::Calibrating
        } else {
            ConnectionState::Searching
        },
    );

    let mut last_sample = Instant::now();
    let mut last_reconnect_attempt: Option<Instant> = None;
    let mut last_verbose_log = Instant::now();
    let mut sample_count: u64 = 0;
    let mut button_commands: Vec<SensorCommand> = Vec::new();

    while running.load(Ordering::Relaxed) {
        let received = std::iter::from_fn(|| command_rx.try_recv().ok());
        let commands: Vec<SensorCommand> = button_commands.drain(..).chain(received).collect();
        for command in commands {
            match command {
                SensorCommand::Recenter => pipeline.recenter(),
                SensorCommand::GoHome(home) => {
                    pipeline.go_home(home);
                }
                SensorCommand::Recalibrate(samples) => {
                    pipeline.recalibrate(samples);
                    if connected {
                        notify(&hub, ConnectionState::Calibrating);
                    }
                }
                SensorCommand::Reconnect => {
                    tracing::info!("Manual reconnect requested");
                    if try_reconnect(&mut source, &mut pipeline, &hub, &options) {
                        connected = true;
                        last_sample = Instant::now();
                    }
                }
            }
        }

        if !connected || !source.is_connected() {
            if connected {
                connected = false;
                tracing::warn!(source = source.name(), "Controller connection lost");
                if options.auto_reconnect {
                    notify(&hub, ConnectionState::Reconnecting);
                }
            }
            if !options.auto_reconnect {
                notify(&hub, ConnectionState::Disconnected);
                break;
            }

            let due = last_reconnect_attempt
                .map_or(true, |at| at.elapsed() >= options.reconnect_delay);
            if due {
                last_reconnect_attempt = Some(Instant::now());
                if try_reconnect(&mut source, &mut pipeline, &hub, &options) {
                    connected = true;
                    last_sample = Instant::now();
                    continue;
                }
            }
            std::thread::sleep(RECONNECT_POLL);
            continue;
        }

        let now = Instant::now();
        let dt = now.duration_since(last_sample);
        if dt.is_zero() {
            std::thread::sleep(Duration::from_millis(1));
            continue;
        }
        last_sample = now;

        match source.read() {
            Ok(Some(sample)) => {
                let tuning = lock(&hub).tuning();
                if tuning.paused {
                    std::thread::sleep(PAUSED_SLEEP);
                    continue;
                }

                let was_calibrated = pipeline.is_calibrated();
                let frame = pipeline.update(&sample, dt.as_secs_f64(), &tuning);
                if !was_calibrated && pipeline.is_calibrated() {
                    notify(&hub, ConnectionState::Connected);
                }

                if let Some(frame) = frame {
                    lock(&hub).publish(&frame);
                    sample_count += 1;
                    if sample_count % 1000 == 0 {
                        tracing::debug!(sample_count, "IMU samples processed");
                    }
                    if tuning.verbose && last_verbose_log.elapsed() >= options.log_interval {
                        last_verbose_log = Instant::now();
                        tracing::info!(
                            pitch = frame.euler.pitch,
                            yaw = frame.euler.yaw,
                            roll = frame.euler.roll,
                            bias_x = frame.gyro_bias.x,
                            bias_y = frame.gyro_bias.y,
                            bias_z = frame.gyro_bias.z,
                            "Orientation"
                        );
                    }
                }
            }
            Ok(None) => {}
            Err(SensorError::Disconnected) => continue,
            Err(e) => tracing::warn!(error = %e, "Sensor read failed"),
        }

        for button in source.poll_buttons() {
            if let Some(command) = lock(&hub).button_pressed(&button) {
                button_commands.push(command);
            }
        }

        std::thread::sleep(period);
    }

    source.close();
    tracing::info!(sample_count, "Sensor thread stopped");
}

fn try_reconnect<S, H>(
    source: &mut S,
    pipeline: &mut MotionPipeline,
    hub: &Mutex<H>,
    options: &LoopOptions,
) -> bool
where
    S: SensorSource,
    H: SensorHub,
{
    match source.reconnect() {
        Ok(()) if source.is_connected() => {
            tracing::info!(source = source.name(), "Controller reconnected");
            pipeline.recalibrate(options.calibration_samples);
            notify(hub, ConnectionState::Calibrating);
            true
        }
        Ok(()) => false,
        Err(e) => {
            tracing::debug!(error = %e, "Reconnect attempt failed");
            false
        }
    }
}
