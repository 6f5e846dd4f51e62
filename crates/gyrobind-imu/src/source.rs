use crate::types::RawImuSample;
use glam::DVec3;
use serde::Deserialize;
use std::collections::VecDeque;
use std::io;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("no motion controller found")]
    NotFound,
    #[error("controller disconnected")]
    Disconnected,
    #[error("sensor read failed: {0}")]
    Read(String),
    #[error("replay data error: {0}")]
    Replay(String),
}

/// Supplier of raw motion samples and button presses.
///
/// All calls are non-blocking polls made from the sensor thread.
pub trait SensorSource: Send {
    /// Human-readable device name for status display.
    fn name(&self) -> &str;

    fn is_connected(&self) -> bool;

    /// Next sample, `Ok(None)` if nothing new is available yet.
    fn read(&mut self) -> Result<Option<RawImuSample>, SensorError>;

    /// Buttons pressed since the last poll, by controller button name.
    fn poll_buttons(&mut self) -> Vec<String>;

    fn reconnect(&mut self) -> Result<(), SensorError>;

    fn close(&mut self) {}
}

impl<T: SensorSource + ?Sized> SensorSource for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn read(&mut self) -> Result<Option<RawImuSample>, SensorError> {
        (**self).read()
    }

    fn poll_buttons(&mut self) -> Vec<String> {
        (**self).poll_buttons()
    }

    fn reconnect(&mut self) -> Result<(), SensorError> {
        (**self).reconnect()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Stationary, level controller that never disconnects.
#[derive(Debug, Default)]
pub struct MockSource {
    pending_buttons: VecDeque<String>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a button press for the next poll.
    pub fn press(&mut self, button: impl Into<String>) {
        self.pending_buttons.push_back(button.into());
    }
}

impl SensorSource for MockSource {
    fn name(&self) -> &str {
        "Mock controller"
    }

    fn is_connected(&self) -> bool {
        true
    }

    fn read(&mut self) -> Result<Option<RawImuSample>, SensorError> {
        Ok(Some(RawImuSample::at_rest()))
    }

    fn poll_buttons(&mut self) -> Vec<String> {
        self.pending_buttons.drain(..).collect()
    }

    fn reconnect(&mut self) -> Result<(), SensorError> {
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ReplayRow {
    gx: f64,
    gy: f64,
    gz: f64,
    ax: f64,
    ay: f64,
    az: f64,
    #[serde(default)]
    button: Option<String>,
}

/// Plays back samples recorded as CSV (`gx,gy,gz,ax,ay,az[,button]`, rad/s
/// and g), one row per read.
///
/// Without looping the source reports a disconnect after the last row;
/// reconnecting rewinds to the start.
pub struct ReplaySource {
    name: String,
    rows: Vec<(RawImuSample, Option<String>)>,
    cursor: usize,
    looping: bool,
    connected: bool,
    pending_buttons: Vec<String>,
}

impl ReplaySource {
    pub fn from_path(path: &Path, looping: bool) -> Result<Self, SensorError> {
        let file = std::fs::File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => SensorError::NotFound,
            _ => SensorError::Replay(format!("{}: {e}", path.display())),
        })?;
        let mut source = Self::from_reader(file, looping)?;
        source.name = format!("Replay {}", path.display());
        Ok(source)
    }

    pub fn from_reader<R: io::Read>(reader: R, looping: bool) -> Result<Self, SensorError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let mut rows = Vec::new();
        for (line, record) in csv_reader.deserialize::<ReplayRow>().enumerate() {
            let row = record.map_err(|e| SensorError::Replay(format!("row {}: {e}", line + 1)))?;
            let sample = RawImuSample::new(
                DVec3::new(row.gx, row.gy, row.gz),
                DVec3::new(row.ax, row.ay, row.az),
            );
            let button = row.button.filter(|b| !b.is_empty());
            rows.push((sample, button));
        }
        if rows.is_empty() {
            return Err(SensorError::Replay("no samples".into()));
        }

        tracing::info!(samples = rows.len(), looping, "Loaded replay data");
        Ok(Self {
            name: "Replay".into(),
            rows,
            cursor: 0,
            looping,
            connected: true,
            pending_buttons: Vec::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl SensorSource for ReplaySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn read(&mut self) -> Result<Option<RawImuSample>, SensorError> {
        if !self.connected {
            return Err(SensorError::Disconnected);
        }
        if self.cursor >= self.rows.len() {
            if self.looping {
                self.cursor = 0;
            } else {
                self.connected = false;
                tracing::info!("Replay finished");
                return Err(SensorError::Disconnected);
            }
        }

        let (sample, button) = &self.rows[self.cursor];
        self.cursor += 1;
        if let Some(button) = button {
            self.pending_buttons.push(button.clone());
        }
        Ok(Some(*sample))
    }

    fn poll_buttons(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pending_buttons)
    }

    fn reconnect(&mut self) -> Result<(), SensorError> {
        self.cursor = 0;
        self.connected = true;
        self.pending_buttons.clear();
        Ok(())
    }

    fn close(&mut self) {
        self.connected = false;
    }
}
