use thiserror::Error;

/// Photodetector channel. Both channels share one ADC input on the
/// reference board; the emitter state selects which signal is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Red,
    Infrared,
}

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("adc transfer failed: {0}")]
    Transfer(String),
    #[error("emitter control failed: {0}")]
    Emitter(String),
    #[error("frontend setup failed: {0}")]
    Setup(String),
}

/// Hardware boundary of the sampler. Implementations own the ADC and the
/// emitter output; everything above this trait is hardware-agnostic.
pub trait AnalogFrontEnd {
    fn read_channel(&mut self, channel: Channel) -> Result<f32, FrontendError>;
    fn set_emitter(&mut self, on: bool) -> Result<(), FrontendError>;
}

/// Stand-in frontend producing a plausible pulsatile waveform, used when
/// the sensor board is not attached (or not compiled in).
pub struct SyntheticFrontend {
    rate_hz: f32,
    pulse_hz: f32,
    tick: u64,
}

impl SyntheticFrontend {
    /// 72 bpm
    const DEFAULT_PULSE_HZ: f32 = 1.2;

    pub fn new(rate_hz: u32) -> Self {
        Self {
            rate_hz: rate_hz as f32,
            pulse_hz: Self::DEFAULT_PULSE_HZ,
            tick: 0,
        }
    }
}

impl AnalogFrontEnd for SyntheticFrontend {
    fn read_channel(&mut self, channel: Channel) -> Result<f32, FrontendError> {
        let time = self.tick as f32 / self.rate_hz;
        let phase = std::f32::consts::TAU * self.pulse_hz * time;

        let (dc, ac) = match channel {
            Channel::Red => (2., 0.25),
            Channel::Infrared => {
                // The infrared read closes a sampling cycle
                self.tick += 1;
                (3.2, 0.5)
            }
        };

        Ok(dc + ac * phase.sin())
    }

    fn set_emitter(&mut self, _on: bool) -> Result<(), FrontendError> {
        Ok(())
    }
}

#[cfg(feature = "rpi")]
mod rpi {
    use rppal::gpio::{Gpio, OutputPin};
    use rppal::spi::{Bus, Mode, SlaveSelect, Spi};

    use super::{AnalogFrontEnd, Channel, FrontendError};

    /// 12-bit SPI ADC (MCP3201 wiring) with the R/IR emitter on a GPIO
    /// output.
    pub struct Mcp3201 {
        spi: Spi,
        emitter: OutputPin,
    }

    impl Mcp3201 {
        const READ_COMMAND: [u8; 3] = [6, 0, 0];
        const VREF: f32 = 5.;
        const FULL_SCALE: f32 = 4095.;

        pub fn new(
            bus: u8,
            slave: u8,
            clock_hz: u32,
            emitter_pin: u8,
        ) -> Result<Self, FrontendError> {
            let bus = match bus {
                0 => Bus::Spi0,
                1 => Bus::Spi1,
                other => {
                    return Err(FrontendError::Setup(format!("unsupported SPI bus {other}")))
                }
            };

            let slave = match slave {
                0 => SlaveSelect::Ss0,
                1 => SlaveSelect::Ss1,
                other => {
                    return Err(FrontendError::Setup(format!(
                        "unsupported slave select {other}"
                    )))
                }
            };

            let spi = Spi::new(bus, slave, clock_hz, Mode::Mode0)
                .map_err(|err| FrontendError::Setup(err.to_string()))?;

            let mut emitter = Gpio::new()
                .and_then(|gpio| gpio.get(emitter_pin))
                .map_err(|err| FrontendError::Setup(err.to_string()))?
                .into_output();

            emitter.set_low();

            Ok(Self { spi, emitter })
        }
    }

    impl AnalogFrontEnd for Mcp3201 {
        fn read_channel(&mut self, _channel: Channel) -> Result<f32, FrontendError> {
            let mut read = [0u8; 3];

            self.spi
                .transfer(&mut read, &Self::READ_COMMAND)
                .map_err(|err| FrontendError::Transfer(err.to_string()))?;

            let raw = ((read[1] as u16) << 8) + read[2] as u16;
            Ok(raw as f32 * Self::VREF / Self::FULL_SCALE)
        }

        fn set_emitter(&mut self, on: bool) -> Result<(), FrontendError> {
            if on {
                self.emitter.set_high();
            } else {
                self.emitter.set_low();
            }

            Ok(())
        }
    }
}

#[cfg(feature = "rpi")]
pub use rpi::Mcp3201;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_signal_is_periodic_and_offset() {
        let mut frontend = SyntheticFrontend::new(10);

        let mut red = Vec::new();
        let mut infrared = Vec::new();

        for _ in 0..100 {
            red.push(frontend.read_channel(Channel::Red).unwrap());
            infrared.push(frontend.read_channel(Channel::Infrared).unwrap());
        }

        // Both channels oscillate around their DC level
        assert!(red.iter().all(|v| (*v - 2.).abs() <= 0.25 + 1e-6));
        assert!(infrared.iter().all(|v| (*v - 3.2).abs() <= 0.5 + 1e-6));
        assert!(red.iter().any(|v| *v > 2.1));
        assert!(red.iter().any(|v| *v < 1.9));
    }
}
