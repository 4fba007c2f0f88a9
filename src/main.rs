use std::process::ExitCode;

use crossbeam::channel::bounded;

use crate::analysis::Report;
use crate::config::Config;
use crate::monitor::Monitor;
use crate::signal::{AnalogFrontEnd, FrontendError};

mod analysis;
mod config;
mod monitor;
mod signal;
mod task;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::restore().unwrap_or_else(|| {
        let config = Config::default();
        config.save();
        config
    });

    let frontend = match build_frontend(&config) {
        Ok(frontend) => frontend,
        Err(err) => {
            log::error!("Frontend setup failed: {err}");
            return ExitCode::FAILURE;
        }
    };

    let monitor = match Monitor::new(frontend, &config) {
        Ok(monitor) => monitor,
        Err(err) => {
            log::error!("Invalid configuration: {err}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = monitor.start() {
        log::error!("Startup failed: {err}");
        monitor.stop();
        return ExitCode::FAILURE;
    }

    log::info!(
        "Sampling at {} Hz, estimating every {} s",
        config.sample_rate_hz,
        config.calc_interval_secs
    );

    let (stop_sender, stop_receiver) = bounded(1);

    if let Err(err) = ctrlc::set_handler(move || {
        let _ = stop_sender.try_send(());
    }) {
        log::error!("Ctrl-C handler failed: {err}");
        monitor.stop();
        return ExitCode::FAILURE;
    }

    loop {
        crossbeam::select! {
            recv(monitor.reports()) -> report => match report {
                Ok(Report::Pulse(estimate)) => log::info!("Pulse: {estimate}"),
                Ok(Report::SpO2(estimate)) => log::info!("SpO2: {estimate}"),
                Err(_) => break,
            },
            recv(stop_receiver) -> _ => break,
        }
    }

    log::info!("Shutting down");
    monitor.stop();

    log::debug!(
        "{} red / {} infrared samples buffered at shutdown",
        monitor.red_window().len(),
        monitor.infrared_window().len()
    );

    ExitCode::SUCCESS
}

#[cfg(feature = "rpi")]
fn build_frontend(config: &Config) -> Result<Box<dyn AnalogFrontEnd + Send>, FrontendError> {
    use crate::signal::Mcp3201;

    let frontend = Mcp3201::new(
        config.spi_bus,
        config.spi_slave,
        config.spi_clock_hz,
        config.emitter_pin,
    )?;

    Ok(Box::new(frontend))
}

#[cfg(not(feature = "rpi"))]
fn build_frontend(config: &Config) -> Result<Box<dyn AnalogFrontEnd + Send>, FrontendError> {
    use crate::signal::SyntheticFrontend;

    log::info!("No hardware frontend compiled in, using the synthetic signal");
    Ok(Box::new(SyntheticFrontend::new(config.sample_rate_hz)))
}
