use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{unbounded, Receiver};
use thiserror::Error;

use crate::analysis::{PulseEstimator, Report, SpO2Estimator};
use crate::config::Config;
use crate::signal::{
    AnalogFrontEnd, Sample, SampleBuffer, SamplingClock, SignalSource, ZeroSampleRate,
    BUFFER_CAPACITY,
};
use crate::task::TaskError;

/// Wires the sampler and both estimators to the shared channel windows
/// and drives their lifecycles as one unit.
pub struct Monitor {
    source: SignalSource,
    pulse: PulseEstimator,
    spo2: SpO2Estimator,

    red: Arc<SampleBuffer>,
    infrared: Arc<SampleBuffer>,

    reports: Receiver<Report>,
}

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error(transparent)]
    Clock(#[from] ZeroSampleRate),
}

impl Monitor {
    pub fn new(
        frontend: Box<dyn AnalogFrontEnd + Send>,
        config: &Config,
    ) -> Result<Self, MonitorError> {
        let clock = SamplingClock::from_rate(config.sample_rate_hz)?;
        let interval = Duration::from_secs_f32(config.calc_interval_secs);

        let red = Arc::new(SampleBuffer::new(BUFFER_CAPACITY));
        let infrared = Arc::new(SampleBuffer::new(BUFFER_CAPACITY));

        let (sender, receiver) = unbounded();

        let source = SignalSource::new(frontend, red.clone(), infrared.clone(), clock);

        let pulse = PulseEstimator::new(
            red.clone(),
            config.sample_rate_hz,
            interval,
            sender.clone(),
        );

        let spo2 = SpO2Estimator::new(
            red.clone(),
            infrared.clone(),
            config.sample_rate_hz,
            interval,
            sender,
        );

        Ok(Self {
            source,
            pulse,
            spo2,
            red,
            infrared,
            reports: receiver,
        })
    }

    /// Starts all three tasks. On a spawn failure the tasks already
    /// started are stopped again before the error surfaces.
    pub fn start(&self) -> Result<(), TaskError> {
        self.source.start()?;

        if let Err(err) = self.pulse.start() {
            self.source.stop();
            return Err(err);
        }

        if let Err(err) = self.spo2.start() {
            self.pulse.stop();
            self.source.stop();
            return Err(err);
        }

        Ok(())
    }

    /// Stops the sampler first, then both estimators; blocks until every
    /// loop has exited.
    pub fn stop(&self) {
        self.source.stop();
        self.pulse.stop();
        self.spo2.stop();
    }

    pub fn is_running(&self) -> bool {
        self.source.is_running() || self.pulse.is_running() || self.spo2.is_running()
    }

    pub fn reports(&self) -> &Receiver<Report> {
        &self.reports
    }

    /// Read-only window views for plotting
    pub fn red_window(&self) -> Vec<Sample> {
        self.red.snapshot()
    }

    pub fn infrared_window(&self) -> Vec<Sample> {
        self.infrared.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Estimate;
    use crate::signal::SyntheticFrontend;
    use std::time::Instant;

    fn test_config() -> Config {
        Config {
            sample_rate_hz: 100,
            calc_interval_secs: 0.02,
            ..Config::default()
        }
    }

    fn synthetic_monitor(config: &Config) -> Monitor {
        let frontend = SyntheticFrontend::new(config.sample_rate_hz);
        Monitor::new(Box::new(frontend), config).unwrap()
    }

    #[test]
    fn rejects_a_zero_sample_rate() {
        let config = Config {
            sample_rate_hz: 0,
            ..Config::default()
        };

        let frontend = SyntheticFrontend::new(10);
        assert!(Monitor::new(Box::new(frontend), &config).is_err());
    }

    #[test]
    fn reports_waiting_before_the_windows_fill() {
        let config = test_config();
        let monitor = synthetic_monitor(&config);

        monitor.start().unwrap();

        let first = monitor
            .reports()
            .recv_timeout(Duration::from_secs(1))
            .unwrap();

        monitor.stop();

        let estimate = match first {
            Report::Pulse(estimate) | Report::SpO2(estimate) => estimate,
        };
        assert_eq!(estimate, Estimate::Waiting);
    }

    #[test]
    fn pipeline_produces_both_estimates() {
        let config = test_config();
        let monitor = synthetic_monitor(&config);

        monitor.start().unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        let mut pulse = None;
        let mut spo2 = None;

        while (pulse.is_none() || spo2.is_none()) && Instant::now() < deadline {
            match monitor.reports().recv_timeout(Duration::from_secs(1)) {
                Ok(Report::Pulse(Estimate::Value(bpm))) => pulse = Some(bpm),
                Ok(Report::SpO2(Estimate::Value(percent))) => spo2 = Some(percent),
                Ok(_) => {}
                Err(_) => break,
            }
        }

        monitor.stop();

        // The synthetic waveform pulses at 1.2 Hz = 72 bpm
        let bpm = pulse.expect("pulse value within deadline");
        assert!((40. ..120.).contains(&bpm), "got {bpm} bpm");

        let percent = spo2.expect("spo2 value within deadline");
        assert!((70. ..110.).contains(&percent), "got {percent} %");
    }

    #[test]
    fn stop_halts_every_task_and_the_windows() {
        let config = test_config();
        let monitor = synthetic_monitor(&config);

        for _ in 0..3 {
            monitor.start().unwrap();
            assert!(monitor.is_running());

            std::thread::sleep(Duration::from_millis(50));
            monitor.stop();
            assert!(!monitor.is_running());

            let red_len = monitor.red_window().len();
            std::thread::sleep(Duration::from_millis(50));
            assert_eq!(monitor.red_window().len(), red_len);
        }
    }

    #[test]
    fn double_start_is_harmless() {
        let config = test_config();
        let monitor = synthetic_monitor(&config);

        monitor.start().unwrap();
        monitor.start().unwrap();
        assert!(monitor.is_running());

        monitor.stop();
        assert!(!monitor.is_running());
    }
}
