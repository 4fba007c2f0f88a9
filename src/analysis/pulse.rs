use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::Sender;

use crate::signal::{Sample, SampleBuffer};
use crate::task::{Lifecycle, TaskError};

use super::{valid_values, Estimate, Report};

/// Derives pulse rate from the R channel by autocorrelation peak
/// detection: mean-remove the window, autocorrelate, and take the first
/// local maximum above zero as the signal period.
pub struct PulseEstimator {
    buffer: Arc<SampleBuffer>,
    rate_hz: u32,
    interval: Duration,
    reports: Sender<Report>,
    lifecycle: Lifecycle,
}

impl PulseEstimator {
    pub fn new(
        buffer: Arc<SampleBuffer>,
        rate_hz: u32,
        interval: Duration,
        reports: Sender<Report>,
    ) -> Self {
        Self {
            buffer,
            rate_hz,
            interval,
            reports,
            lifecycle: Lifecycle::new("pulse-estimator"),
        }
    }

    pub fn start(&self) -> Result<(), TaskError> {
        let buffer = self.buffer.clone();
        let rate_hz = self.rate_hz;
        let interval = self.interval;
        let reports = self.reports.clone();

        self.lifecycle.start(move |flag| {
            while flag.is_running() {
                let estimate = estimate_pulse(&buffer.snapshot(), rate_hz);

                if reports.send(Report::Pulse(estimate)).is_err() {
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

/// One analysis pass over a window snapshot, in beats per minute.
fn estimate_pulse(window: &[Sample], rate_hz: u32) -> Estimate {
    let values = valid_values(window);

    if values.len() < rate_hz as usize {
        return Estimate::Waiting;
    }

    let acf = autocorrelate(&values);

    match first_peak(&acf) {
        Some(lag) => Estimate::Value(60. * rate_hz as f32 / lag as f32),
        None => Estimate::Waiting,
    }
}

/// Non-negative-lag half of the full autocorrelation of the mean-removed
/// window.
fn autocorrelate(values: &[f32]) -> Vec<f32> {
    let n = values.len();
    let mean = values.iter().sum::<f32>() / n as f32;
    let centered: Vec<f32> = values.iter().map(|v| v - mean).collect();

    (0..n)
        .map(|lag| {
            centered[lag..]
                .iter()
                .zip(&centered[..n - lag])
                .map(|(a, b)| a * b)
                .sum()
        })
        .collect()
}

/// First local maximum exceeding both neighbors and zero, scanning from
/// lag zero upward. Lag zero itself can never qualify, so a found lag is
/// always a real period.
fn first_peak(acf: &[f32]) -> Option<usize> {
    acf.windows(3)
        .position(|w| w[1] > w[0] && w[1] > w[2] && w[1] > 0.)
        .map(|i| i + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::f32::consts::TAU;

    fn sine_window(len: usize, period: usize) -> Vec<Sample> {
        (0..len)
            .map(|i| Sample::Voltage(2. + (TAU * i as f32 / period as f32).sin()))
            .collect()
    }

    #[test]
    fn periodic_signal_maps_to_its_rate() {
        // 100 samples of a period-20 sine at 25 Hz: 60 * 25 / 20 = 75 bpm
        let window = sine_window(100, 20);

        match estimate_pulse(&window, 25) {
            Estimate::Value(bpm) => assert!((bpm - 75.).abs() < 4., "got {bpm} bpm"),
            other => panic!("expected a value, got {other:?}"),
        }
    }

    #[test]
    fn noisy_periodic_signal_still_resolves() {
        let mut rng = rand::rng();

        let window: Vec<Sample> = (0..100)
            .map(|i| {
                let clean = (TAU * i as f32 / 20.).sin();
                Sample::Voltage(2. + clean + rng.random_range(-0.05..0.05))
            })
            .collect();

        match estimate_pulse(&window, 25) {
            Estimate::Value(bpm) => assert!((bpm - 75.).abs() < 10., "got {bpm} bpm"),
            other => panic!("expected a value, got {other:?}"),
        }
    }

    #[test]
    fn constant_window_has_no_peak() {
        let window = vec![Sample::Voltage(2.); 100];
        assert_eq!(estimate_pulse(&window, 25), Estimate::Waiting);
    }

    #[test]
    fn underfilled_window_waits() {
        let window = sine_window(20, 10);
        assert_eq!(estimate_pulse(&window, 25), Estimate::Waiting);
    }

    #[test]
    fn missing_samples_do_not_count_toward_the_window() {
        let mut window = sine_window(40, 10);
        window.extend(std::iter::repeat(Sample::Missing).take(60));

        // 40 valid entries is under the 50-sample requirement
        assert_eq!(estimate_pulse(&window, 50), Estimate::Waiting);
    }

    #[test]
    fn autocorrelation_peaks_at_zero_lag() {
        let values: Vec<f32> = (0..100).map(|i| (TAU * i as f32 / 20.).sin()).collect();
        let acf = autocorrelate(&values);

        assert_eq!(acf.len(), values.len());
        assert!(acf[1..].iter().all(|v| *v <= acf[0]));
    }

    #[test]
    fn first_peak_skips_the_zero_lag_maximum() {
        // Global maximum at index 0 must not be picked up
        assert_eq!(first_peak(&[5., 1., 3., 1.]), Some(2));
        assert_eq!(first_peak(&[5., 3., 1., 0.]), None);
    }

    #[test]
    fn peaks_at_or_below_zero_are_ignored() {
        assert_eq!(first_peak(&[1., -3., -1., -2., 4., 2.]), Some(4));
        assert_eq!(first_peak(&[1., -3., 0., -2.]), None);
    }
}
