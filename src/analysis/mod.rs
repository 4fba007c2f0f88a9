use std::fmt::Display;

use crate::signal::Sample;

mod pulse;
mod spo2;

pub use pulse::PulseEstimator;
pub use spo2::SpO2Estimator;

/// Outcome of one estimator cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Estimate {
    Value(f32),
    /// Not enough valid samples in the window yet, or no usable peak
    Waiting,
    /// The formula's denominator vanished (constant or dark channel);
    /// reported instead of a non-numeric value
    Undefined,
}

impl Display for Estimate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Estimate::Value(value) => write!(f, "{value:.1}"),
            Estimate::Waiting => write!(f, "waiting for data"),
            Estimate::Undefined => write!(f, "undefined"),
        }
    }
}

/// Sent once per estimator cycle to the presentation side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Report {
    Pulse(Estimate),
    SpO2(Estimate),
}

/// Missing samples are excluded from analysis; both estimators require a
/// full second of valid samples and report [`Estimate::Waiting`] below
/// that.
fn valid_values(window: &[Sample]) -> Vec<f32> {
    window.iter().filter_map(|sample| sample.voltage()).collect()
}
