use crate::types::{opt_vec3_serde, PositionId};
use glam::DVec3;
use serde::{Deserialize, Serialize};

/// One of the six matchable channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Pitch,
    Yaw,
    Roll,
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 6] = [Axis::Pitch, Axis::Yaw, Axis::Roll, Axis::X, Axis::Y, Axis::Z];
}

/// Which channels a position is matched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionAxes {
    #[serde(rename = "Pitch")]
    pub pitch: bool,
    #[serde(rename = "Yaw")]
    pub yaw: bool,
    #[serde(rename = "Roll")]
    pub roll: bool,
    #[serde(rename = "X")]
    pub x: bool,
    #[serde(rename = "Y")]
    pub y: bool,
    #[serde(rename = "Z")]
    pub z: bool,
}

impl Default for DetectionAxes {
    fn default() -> Self {
        Self {
            pitch: true,
            yaw: true,
            roll: true,
            x: true,
            y: true,
            z: true,
        }
    }
}

impl DetectionAxes {
    pub fn none() -> Self {
        Self {
            pitch: false,
            yaw: false,
            roll: false,
            x: false,
            y: false,
            z: false,
        }
    }

    pub fn get(&self, axis: Axis) -> bool {
        match axis {
            Axis::Pitch => self.pitch,
            Axis::Yaw => self.yaw,
            Axis::Roll => self.roll,
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    pub fn set(&mut self, axis: Axis, enabled: bool) {
        let slot = match axis {
            Axis::Pitch => &mut self.pitch,
            Axis::Yaw => &mut self.yaw,
            Axis::Roll => &mut self.roll,
            Axis::X => &mut self.x,
            Axis::Y => &mut self.y,
            Axis::Z => &mut self.z,
        };
        *slot = enabled;
    }

    pub fn any(&self) -> bool {
        Axis::ALL.iter().any(|&axis| self.get(axis))
    }
}

/// One captured (gyro, accel) pair, stored as `[[p, y, r], [x, y, z]]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[[f64; 3]; 2]", into = "[[f64; 3]; 2]")]
pub struct RecordedPoint {
    pub gyro: DVec3,
    pub accel: DVec3,
}

impl RecordedPoint {
    pub fn new(gyro: DVec3, accel: DVec3) -> Self {
        Self { gyro, accel }
    }
}

impl From<[[f64; 3]; 2]> for RecordedPoint {
    fn from([g, a]: [[f64; 3]; 2]) -> Self {
        Self::new(DVec3::from_array(g), DVec3::from_array(a))
    }
}

impl From<RecordedPoint> for [[f64; 3]; 2] {
    fn from(p: RecordedPoint) -> Self {
        [p.gyro.to_array(), p.accel.to_array()]
    }
}

/// Inclusive per-axis bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisRanges {
    pub min_gyro: DVec3,
    pub max_gyro: DVec3,
    pub min_accel: DVec3,
    pub max_accel: DVec3,
}

impl AxisRanges {
    fn bounds(&self, axis: Axis) -> (f64, f64) {
        match axis {
            Axis::Pitch => (self.min_gyro.x, self.max_gyro.x),
            Axis::Yaw => (self.min_gyro.y, self.max_gyro.y),
            Axis::Roll => (self.min_gyro.z, self.max_gyro.z),
            Axis::X => (self.min_accel.x, self.max_accel.x),
            Axis::Y => (self.min_accel.y, self.max_accel.y),
            Axis::Z => (self.min_accel.z, self.max_accel.z),
        }
    }

    pub fn contains(&self, axis: Axis, value: f64) -> bool {
        let (min, max) = self.bounds(axis);
        min <= value && value <= max
    }
}

/// Statistics derived from the recorded points.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct RecordedStats {
    avg_gyro: DVec3,
    avg_accel: DVec3,
    raw_min_gyro: DVec3,
    raw_max_gyro: DVec3,
    raw_min_accel: DVec3,
    raw_max_accel: DVec3,
}

impl RecordedStats {
    fn from_points(points: &[RecordedPoint]) -> Self {
        let Some(first) = points.first() else {
            return Self::default();
        };
        let n = points.len() as f64;
        let mut stats = Self {
            avg_gyro: DVec3::ZERO,
            avg_accel: DVec3::ZERO,
            raw_min_gyro: first.gyro,
            raw_max_gyro: first.gyro,
            raw_min_accel: first.accel,
            raw_max_accel: first.accel,
        };
        for p in points {
            stats.avg_gyro += p.gyro;
            stats.avg_accel += p.accel;
            stats.raw_min_gyro = stats.raw_min_gyro.min(p.gyro);
            stats.raw_max_gyro = stats.raw_max_gyro.max(p.gyro);
            stats.raw_min_accel = stats.raw_min_accel.min(p.accel);
            stats.raw_max_accel = stats.raw_max_accel.max(p.accel);
        }
        stats.avg_gyro /= n;
        stats.avg_accel /= n;
        stats
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SavedPositionRecord {
    id: PositionId,
    name: String,
    #[serde(default)]
    recorded_points: Vec<RecordedPoint>,
    padding_factor: f64,
    #[serde(default)]
    detection_axes: DetectionAxes,
    #[serde(default, with = "opt_vec3_serde", skip_serializing_if = "Option::is_none")]
    custom_avg_gyro: Option<DVec3>,
    #[serde(default, with = "opt_vec3_serde", skip_serializing_if = "Option::is_none")]
    custom_avg_accel: Option<DVec3>,
}

/// A recorded controller pose to match against.
///
/// Averages and raw min/max are derived from the recorded points and
/// recomputed whenever they change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SavedPositionRecord", into = "SavedPositionRecord")]
pub struct SavedPosition {
    pub id: PositionId,
    pub name: String,
    recorded_points: Vec<RecordedPoint>,
    /// Added to each side of the recorded spread.
    pub padding_factor: f64,
    pub detection_axes: DetectionAxes,
    pub custom_avg_gyro: Option<DVec3>,
    pub custom_avg_accel: Option<DVec3>,
    stats: RecordedStats,
}

impl From<SavedPositionRecord> for SavedPosition {
    fn from(r: SavedPositionRecord) -> Self {
        let stats = RecordedStats::from_points(&r.recorded_points);
        Self {
            id: r.id,
            name: r.name,
            recorded_points: r.recorded_points,
            padding_factor: r.padding_factor,
            detection_axes: r.detection_axes,
            custom_avg_gyro: r.custom_avg_gyro,
            custom_avg_accel: r.custom_avg_accel,
            stats,
        }
    }
}

impl From<SavedPosition> for SavedPositionRecord {
    fn from(p: SavedPosition) -> Self {
        Self {
            id: p.id,
            name: p.name,
            recorded_points: p.recorded_points,
            padding_factor: p.padding_factor,
            detection_axes: p.detection_axes,
            custom_avg_gyro: p.custom_avg_gyro,
            custom_avg_accel: p.custom_avg_accel,
        }
    }
}

impl SavedPosition {
    pub fn new(
        name: impl Into<String>,
        recorded_points: Vec<RecordedPoint>,
        padding_factor: f64,
        detection_axes: DetectionAxes,
    ) -> Self {
        let stats = RecordedStats::from_points(&recorded_points);
        Self {
            id: PositionId::random(),
            name: name.into(),
            recorded_points,
            padding_factor,
            detection_axes,
            custom_avg_gyro: None,
            custom_avg_accel: None,
            stats,
        }
    }

    pub fn recorded_points(&self) -> &[RecordedPoint] {
        &self.recorded_points
    }

    pub fn set_recorded_points(&mut self, points: Vec<RecordedPoint>) {
        self.stats = RecordedStats::from_points(&points);
        self.recorded_points = points;
    }

    pub fn avg_gyro(&self) -> DVec3 {
        self.stats.avg_gyro
    }

    pub fn avg_accel(&self) -> DVec3 {
        self.stats.avg_accel
    }

    pub fn raw_min_gyro(&self) -> DVec3 {
        self.stats.raw_min_gyro
    }

    pub fn raw_max_gyro(&self) -> DVec3 {
        self.stats.raw_max_gyro
    }

    pub fn raw_min_accel(&self) -> DVec3 {
        self.stats.raw_min_accel
    }

    pub fn raw_max_accel(&self) -> DVec3 {
        self.stats.raw_max_accel
    }

    /// Matching center: the override if set, else the recorded average.
    pub fn center_gyro(&self) -> DVec3 {
        self.custom_avg_gyro.unwrap_or(self.stats.avg_gyro)
    }

    pub fn center_accel(&self) -> DVec3 {
        self.custom_avg_accel.unwrap_or(self.stats.avg_accel)
    }

    /// `center ± spread / 2 ± padding` on every axis.
    pub fn effective_ranges(&self) -> AxisRanges {
        let pad = DVec3::splat(self.padding_factor);
        let half_gyro = (self.stats.raw_max_gyro - self.stats.raw_min_gyro) / 2.0;
        let half_accel = (self.stats.raw_max_accel - self.stats.raw_min_accel) / 2.0;
        let center_gyro = self.center_gyro();
        let center_accel = self.center_accel();

        AxisRanges {
            min_gyro: center_gyro - half_gyro - pad,
            max_gyro: center_gyro + half_gyro + pad,
            min_accel: center_accel - half_accel - pad,
            max_accel: center_accel + half_accel + pad,
        }
    }

    /// All enabled axes within range. Never matches with no axis enabled.
    pub fn matches(&self, gyro: DVec3, accel: DVec3) -> bool {
        if !self.detection_axes.any() {
            return false;
        }
        let ranges = self.effective_ranges();
        Axis::ALL.iter().all(|&axis| {
            if !self.detection_axes.get(axis) {
                return true;
            }
            let value = match axis {
                Axis::Pitch => gyro.x,
                Axis::Yaw => gyro.y,
                Axis::Roll => gyro.z,
                Axis::X => accel.x,
                Axis::Y => accel.y,
                Axis::Z => accel.z,
            };
            ranges.contains(axis, value)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points() -> Vec<RecordedPoint> {
        vec![
            RecordedPoint::new(DVec3::new(10.0, 0.0, -5.0), DVec3::new(0.0, 0.1, 1.0)),
            RecordedPoint::new(DVec3::new(20.0, 4.0, -1.0), DVec3::new(0.2, 0.1, 0.8)),
        ]
    }

    #[test]
    fn derives_average_and_spread() {
        let pos = SavedPosition::new("Test", points(), 0.0, DetectionAxes::default());
        assert!((pos.avg_gyro() - DVec3::new(15.0, 2.0, -3.0)).length() < 1e-12);
        assert_eq!(pos.raw_min_gyro(), DVec3::new(10.0, 0.0, -5.0));
        assert_eq!(pos.raw_max_accel(), DVec3::new(0.2, 0.1, 1.0));
    }

    #[test]
    fn padding_expands_recorded_spread() {
        let pos = SavedPosition::new("Test", points(), 5.0, DetectionAxes::default());
        let ranges = pos.effective_ranges();
        // Pitch: center 15, spread 10 -> 15 ± 5 ± 5.
        assert!((ranges.min_gyro.x - 5.0).abs() < 1e-12);
        assert!((ranges.max_gyro.x - 25.0).abs() < 1e-12);
    }

    #[test]
    fn override_moves_center_not_spread() {
        let mut pos = SavedPosition::new("Test", points(), 1.0, DetectionAxes::default());
        pos.custom_avg_gyro = Some(DVec3::new(100.0, 0.0, 0.0));
        let ranges = pos.effective_ranges();
        assert!((ranges.min_gyro.x - 94.0).abs() < 1e-12);
        assert!((ranges.max_gyro.x - 106.0).abs() < 1e-12);
        // Accel keeps the recorded center.
        assert!((ranges.min_accel.z - (0.9 - 0.1 - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn bounds_are_inclusive() {
        let single = vec![RecordedPoint::new(DVec3::ZERO, DVec3::ZERO)];
        let pos = SavedPosition::new("Edge", single, 2.0, DetectionAxes::default());
        assert!(pos.matches(DVec3::splat(2.0), DVec3::splat(-2.0)));
        assert!(pos.matches(DVec3::new(-2.0, 2.0, 0.0), DVec3::ZERO));
        assert!(!pos.matches(DVec3::new(2.0 + 1e-9, 0.0, 0.0), DVec3::ZERO));
    }

    #[test]
    fn no_axes_never_matches() {
        let pos = SavedPosition::new("Off", points(), 1e9, DetectionAxes::none());
        assert!(!pos.matches(DVec3::ZERO, DVec3::ZERO));
        assert!(!pos.matches(DVec3::splat(15.0), DVec3::splat(0.5)));
    }

    #[test]
    fn disabled_axes_are_ignored() {
        let mut axes = DetectionAxes::none();
        axes.set(Axis::Z, true);
        let pos = SavedPosition::new("Z only", points(), 0.1, axes);
        assert!(pos.matches(DVec3::splat(-999.0), DVec3::new(50.0, -50.0, 0.9)));
        assert!(!pos.matches(DVec3::ZERO, DVec3::new(0.0, 0.0, 2.0)));
    }

    #[test]
    fn stats_recomputed_after_deserialize() {
        let pos = SavedPosition::new("Stored", points(), 5.0, DetectionAxes::default());
        let text = toml::to_string(&pos).unwrap();
        assert!(text.contains("Pitch = true"));
        let back: SavedPosition = toml::from_str(&text).unwrap();
        assert_eq!(back, pos);
        assert_eq!(back.avg_accel(), pos.avg_accel());
    }
}
