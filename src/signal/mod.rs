use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;

mod buffer;
mod frontend;
mod source;

pub use buffer::SampleBuffer;
#[cfg(feature = "rpi")]
pub use frontend::Mcp3201;
pub use frontend::{AnalogFrontEnd, Channel, FrontendError, SyntheticFrontend};
pub use source::SignalSource;

/// Most recent samples retained per channel
pub const BUFFER_CAPACITY: usize = 100;

pub type SharedFrontend = Arc<Mutex<Box<dyn AnalogFrontEnd + Send>>>;

/// A single photodetector reading.
///
/// Failed hardware reads stay in the window as `Missing` so the two
/// channels keep their alternating alignment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    Voltage(f32),
    Missing,
}

impl Sample {
    pub fn voltage(self) -> Option<f32> {
        match self {
            Sample::Voltage(volts) => Some(volts),
            Sample::Missing => None,
        }
    }
}

/// Fixed sampling cadence, Te = 1/fs.
#[derive(Debug, Clone, Copy)]
pub struct SamplingClock {
    rate_hz: u32,
    period: Duration,
}

#[derive(Debug, Error)]
#[error("sample rate must be greater than zero")]
pub struct ZeroSampleRate;

impl SamplingClock {
    pub fn from_rate(rate_hz: u32) -> Result<Self, ZeroSampleRate> {
        if rate_hz == 0 {
            return Err(ZeroSampleRate);
        }

        Ok(Self {
            rate_hz,
            period: Duration::from_secs_f64(1. / f64::from(rate_hz)),
        })
    }

    pub fn rate_hz(&self) -> u32 {
        self.rate_hz
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}
