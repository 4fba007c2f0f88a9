use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::Sender;

use crate::signal::{Sample, SampleBuffer};
use crate::task::{Lifecycle, TaskError};

use super::{valid_values, Estimate, Report};

/// Derives an oxygen-saturation estimate from the R and IR windows via
/// their AC/DC amplitude ratios: SpO2 = 110 - 25 * (ratio_R / ratio_IR).
/// The calibration constants are empirical and preserved as given.
pub struct SpO2Estimator {
    red: Arc<SampleBuffer>,
    infrared: Arc<SampleBuffer>,
    rate_hz: u32,
    interval: Duration,
    reports: Sender<Report>,
    lifecycle: Lifecycle,
}

impl SpO2Estimator {
    pub fn new(
        red: Arc<SampleBuffer>,
        infrared: Arc<SampleBuffer>,
        rate_hz: u32,
        interval: Duration,
        reports: Sender<Report>,
    ) -> Self {
        Self {
            red,
            infrared,
            rate_hz,
            interval,
            reports,
            lifecycle: Lifecycle::new("spo2-estimator"),
        }
    }

    pub fn start(&self) -> Result<(), TaskError> {
        let red = self.red.clone();
        let infrared = self.infrared.clone();
        let rate_hz = self.rate_hz;
        let interval = self.interval;
        let reports = self.reports.clone();

        self.lifecycle.start(move |flag| {
            while flag.is_running() {
                // The snapshots are taken one after the other; each is
                // internally consistent, which is all the ratio needs.
                let estimate = estimate_spo2(&red.snapshot(), &infrared.snapshot(), rate_hz);

                if reports.send(Report::SpO2(estimate)).is_err() {
                    // Nobody is listening anymore
                    break;
                }

                thread::sleep(interval);
            }
        })
    }

    /// Blocks until the estimator loop has exited.
    pub fn stop(&self) {
        self.lifecycle.stop();
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }
}

/// One analysis pass over both window snapshots.
fn estimate_spo2(red: &[Sample], infrared: &[Sample], rate_hz: u32) -> Estimate {
    let red = valid_values(red);
    let infrared = valid_values(infrared);

    let needed = rate_hz as usize;
    if red.len() < needed || infrared.len() < needed {
        return Estimate::Waiting;
    }

    let ratios = channel_ratio(&red).zip(channel_ratio(&infrared));

    match ratios {
        Some((red_ratio, infrared_ratio)) if infrared_ratio != 0. => {
            Estimate::Value(110. - 25. * (red_ratio / infrared_ratio))
        }
        _ => Estimate::Undefined,
    }
}

/// Peak-to-peak amplitude over mean ("AC over DC") for one channel, or
/// `None` when the mean vanishes.
fn channel_ratio(values: &[f32]) -> Option<f32> {
    let mean = values.iter().sum::<f32>() / values.len() as f32;

    let max = values.iter().fold(f32::MIN, |acc, v| acc.max(*v));
    let min = values.iter().fold(f32::MAX, |acc, v| acc.min(*v));

    (mean != 0.).then(|| (max - min) / mean)
}
