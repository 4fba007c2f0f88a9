use std::sync::Arc;
use std::thread;
use std::time::Instant;

use parking_lot::Mutex;

use crate::task::{Lifecycle, TaskError};

use super::{AnalogFrontEnd, Channel, Sample, SampleBuffer, SamplingClock, SharedFrontend};

/// Owns emitter and ADC access and keeps both channel windows fed.
///
/// Each cycle: emitter on, read R, emitter off, read IR, then sleep for
/// the remainder of the sampling period. A failed read is recorded as
/// [`Sample::Missing`] so cadence and channel alignment survive transient
/// hardware errors.
pub struct SignalSource {
    frontend: SharedFrontend,
    red: Arc<SampleBuffer>,
    infrared: Arc<SampleBuffer>,
    clock: SamplingClock,
    lifecycle: Lifecycle,
}

impl SignalSource {
    pub fn new(
        frontend: Box<dyn AnalogFrontEnd + Send>,
        red: Arc<SampleBuffer>,
        infrared: Arc<SampleBuffer>,
        clock: SamplingClock,
    ) -> Self {
        Self {
            frontend: Arc::new(Mutex::new(frontend)),
            red,
            infrared,
            clock,
            lifecycle: Lifecycle::new("sampler"),
        }
    }

    pub fn start(&self) -> Result<(), TaskError> {
        let frontend = self.frontend.clone();
        let red = self.red.clone();
        let infrared = self.infrared.clone();
        let period = self.clock.period();

        self.lifecycle.start(move |flag| {
            while flag.is_running() {
                let tick = Instant::now();

                {
                    let mut frontend = frontend.lock();

                    set_emitter(&mut **frontend, true);
                    red.push(read(&mut **frontend, Channel::Red));
                    set_emitter(&mut **frontend, false);
                    infrared.push(read(&mut **frontend, Channel::Infrared));
                }

                let elapsed = tick.elapsed();
                if elapsed < period {
                    thread::sleep(period - elapsed);
                }
            }
        })
    }

    /// Blocks until the sampling loop has exited.
    pub fn stop(&self) {
        self.lifecycle.stop();
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }
}

fn read(frontend: &mut dyn AnalogFrontEnd, channel: Channel) -> Sample {
    match frontend.read_channel(channel) {
        Ok(voltage) => Sample::Voltage(voltage),
        Err(err) => {
            log::warn!("{channel:?} read failed: {err}");
            Sample::Missing
        }
    }
}

fn set_emitter(frontend: &mut dyn AnalogFrontEnd, on: bool) {
    if let Err(err) = frontend.set_emitter(on) {
        log::warn!("emitter switch failed: {err}");
    }
}
