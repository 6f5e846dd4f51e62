use glam::DVec3;
use std::collections::VecDeque;

/// Single-pole exponential low-pass filter.
///
/// The first sample seeds the output; alpha can change at runtime without
/// resetting state.
#[derive(Debug, Clone)]
pub struct LowPassFilter {
    alpha: f64,
    last: Option<f64>,
}

impl LowPassFilter {
    pub fn new(alpha: f64) -> Self {
        Self { alpha, last: None }
    }

    pub fn update(&mut self, value: f64) -> f64 {
        let next = match self.last {
            None => value,
            Some(last) => self.alpha * value + (1.0 - self.alpha) * last,
        };
        self.last = Some(next);
        next
    }

    pub fn set_alpha(&mut self, alpha: f64) {
        self.alpha = alpha;
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// Mean of the last `capacity` samples.
///
/// A capacity of zero passes samples through unchanged.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    buffer: VecDeque<f64>,
    capacity: usize,
}

impl MovingAverage {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a raw sample and return the current mean.
    pub fn update(&mut self, value: f64) -> f64 {
        if self.capacity > 0 {
            if self.buffer.len() == self.capacity {
                self.buffer.pop_front();
            }
            self.buffer.push_back(value);
        }

        if self.buffer.is_empty() {
            return value;
        }
        self.buffer.iter().sum::<f64>() / self.buffer.len() as f64
    }

    /// Change the window, keeping the most recent samples that still fit.
    pub fn resize(&mut self, capacity: usize) {
        while self.buffer.len() > capacity {
            self.buffer.pop_front();
        }
        self.capacity = capacity;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// One [`LowPassFilter`] per axis.
#[derive(Debug, Clone)]
pub struct LowPass3 {
    axes: [LowPassFilter; 3],
}

impl LowPass3 {
    pub fn new(alpha: f64) -> Self {
        Self {
            axes: std::array::from_fn(|_| LowPassFilter::new(alpha)),
        }
    }

    pub fn update(&mut self, v: DVec3) -> DVec3 {
        DVec3::new(
            self.axes[0].update(v.x),
            self.axes[1].update(v.y),
            self.axes[2].update(v.z),
        )
    }

    pub fn set_alpha(&mut self, alpha: f64) {
        for axis in &mut self.axes {
            axis.set_alpha(alpha);
        }
    }
}

/// One [`MovingAverage`] per axis.
#[derive(Debug, Clone)]
pub struct MovingAverage3 {
    axes: [MovingAverage; 3],
}

impl MovingAverage3 {
    pub fn new(capacity: usize) -> Self {
        Self {
            axes: std::array::from_fn(|_| MovingAverage::new(capacity)),
        }
    }

    pub fn update(&mut self, v: DVec3) -> DVec3 {
        DVec3::new(
            self.axes[0].update(v.x),
            self.axes[1].update(v.y),
            self.axes[2].update(v.z),
        )
    }

    /// Resize all axes if the window changed.
    pub fn set_capacity(&mut self, capacity: usize) {
        if self.axes[0].capacity() != capacity {
            for axis in &mut self.axes {
                axis.resize(capacity);
            }
        }
    }

    pub fn clear(&mut self) {
        for axis in &mut self.axes {
            axis.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_pass_seeds_with_first_value() {
        let mut lpf = LowPassFilter::new(0.5);
        assert_eq!(lpf.update(4.0), 4.0);
        assert!((lpf.update(0.0) - 2.0).abs() < 1e-12);
        assert!((lpf.update(0.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn low_pass_alpha_change_keeps_state() {
        let mut lpf = LowPassFilter::new(0.5);
        lpf.update(10.0);
        lpf.set_alpha(1.0);
        assert_eq!(lpf.update(3.0), 3.0);
        lpf.set_alpha(0.0);
        assert_eq!(lpf.update(100.0), 3.0);
    }

    #[test]
    fn moving_average_of_identical_values() {
        let mut avg = MovingAverage::new(4);
        let mut out = 0.0;
        for _ in 0..4 {
            out = avg.update(2.5);
        }
        assert!((out - 2.5).abs() < 1e-12);
    }

    #[test]
    fn moving_average_first_value_passes_through() {
        for capacity in [0, 1, 7] {
            let mut avg = MovingAverage::new(capacity);
            assert_eq!(avg.update(-3.25), -3.25);
        }
    }

    #[test]
    fn moving_average_drops_oldest() {
        let mut avg = MovingAverage::new(2);
        avg.update(1.0);
        avg.update(3.0);
        assert!((avg.update(5.0) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn resize_keeps_most_recent_samples() {
        let mut avg = MovingAverage::new(4);
        for v in [1.0, 2.0, 3.0, 4.0] {
            avg.update(v);
        }
        avg.resize(2);
        assert_eq!(avg.len(), 2);
        // Buffer is now [3, 4]; pushing 5 gives [4, 5].
        assert!((avg.update(5.0) - 4.5).abs() < 1e-12);

        avg.resize(10);
        assert_eq!(avg.len(), 2);
        assert!((avg.update(6.0) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn three_axis_filters_are_independent() {
        let mut avg = MovingAverage3::new(2);
        avg.update(DVec3::new(1.0, 10.0, 100.0));
        let out = avg.update(DVec3::new(3.0, 30.0, 300.0));
        assert!((out - DVec3::new(2.0, 20.0, 200.0)).length() < 1e-12);
    }
}
