//! Fall classification for acceleration samples.
//!
//! Every sample is judged on its own: no hysteresis, no debouncing, no
//! history. A fall looks like low x, high y and low z on the wearable's axes.

use serde::{Deserialize, Serialize};

use crate::model::{AccelerationSample, FallAlert};

/// Threshold triple for the fall classifier.
///
/// A sample is a fall iff `x <= x_max`, `y >= y_min` and `z <= z_max`.
/// Any NaN axis fails its comparison and therefore classifies as no fall.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FallThresholds {
    pub x_max: f64,
    pub y_min: f64,
    pub z_max: f64,
}

impl Default for FallThresholds {
    fn default() -> Self {
        Self {
            x_max: 0.4,
            y_min: 0.6,
            z_max: 0.4,
        }
    }
}

impl FallThresholds {
    pub fn classify(&self, x: f64, y: f64, z: f64) -> bool {
        x <= self.x_max && y >= self.y_min && z <= self.z_max
    }

    /// Classify a sample, producing the alert to emit on a fall.
    pub fn check(&self, sample: &AccelerationSample) -> Option<FallAlert> {
        self.classify(sample.x, sample.y, sample.z)
            .then(|| FallAlert::from(sample))
    }
}

/// Classify with the default thresholds.
pub fn classify(x: f64, y: f64, z: f64) -> bool {
    FallThresholds::default().classify(x, y, z)
}
