use std::{fs::File, io::Read};

use serde::{Deserialize, Serialize};

/// Runtime settings, persisted as RON next to the binary.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Config {
    /// Samples per second taken from each channel (fs)
    pub sample_rate_hz: u32,
    /// Seconds between estimator passes (Tcalc)
    pub calc_interval_secs: f32,

    /// SPI bus and slave select the ADC answers on
    pub spi_bus: u8,
    pub spi_slave: u8,
    pub spi_clock_hz: u32,
    /// BCM pin driving the R/IR emitter
    pub emitter_pin: u8,
}

impl Config {
    const FILE_NAME: &'static str = "pulseox.ron";

    pub fn restore() -> Option<Self> {
        File::open(Self::FILE_NAME)
            .ok()
            .and_then(|mut file| {
                let mut contents = String::new();
                file.read_to_string(&mut contents).map(|_| contents).ok()
            })
            .and_then(|content| ron::from_str(&content).ok())
    }

    pub fn save(&self) {
        let result = ron::to_string(self)
            .map_err(|err| err.to_string())
            .and_then(|contents| {
                std::fs::write(Self::FILE_NAME, contents).map_err(|err| err.to_string())
            });

        if let Err(err) = result {
            log::error!("Config save failed: {err}");
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_rate_hz: 10,
            calc_interval_secs: 1.,
            spi_bus: 0,
            spi_slave: 0,
            spi_clock_hz: 100_000,
            emitter_pin: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_ron() {
        let config = Config {
            sample_rate_hz: 25,
            ..Config::default()
        };

        let serialized = ron::to_string(&config).unwrap();
        let restored: Config = ron::from_str(&serialized).unwrap();

        assert_eq!(restored.sample_rate_hz, 25);
        assert_eq!(restored.emitter_pin, config.emitter_pin);
    }
}
