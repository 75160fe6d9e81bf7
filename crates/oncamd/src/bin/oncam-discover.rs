//! Probes the local network once and prints every ONVIF camera that answers.
//!
//! Accepts the same configuration layers as the daemon; only the probe and
//! device timeouts and the logging settings are used.

use std::io::{self, Write};
use std::process::ExitCode;

use oncam_config::Config;
use ortho_config::OrthoConfig;
use oncamd::{OnvifDeviceService, initialise_telemetry, write_discovery_report};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let mut stderr = io::stderr().lock();
    let config = match Config::load() {
        Ok(config) => config,
        Err(error) => {
            writeln!(stderr, "oncam-discover: {error}").ok();
            return ExitCode::FAILURE;
        }
    };
    if let Err(error) = initialise_telemetry(&config) {
        writeln!(stderr, "oncam-discover: {error}").ok();
        return ExitCode::FAILURE;
    }
    let service = match OnvifDeviceService::from_config(&config) {
        Ok(service) => service,
        Err(error) => {
            writeln!(stderr, "oncam-discover: {error}").ok();
            return ExitCode::FAILURE;
        }
    };

    let mut stdout = io::stdout().lock();
    match write_discovery_report(&service, &mut stdout).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(error) => {
            writeln!(stderr, "oncam-discover: {error}").ok();
            ExitCode::FAILURE
        }
    }
}
