// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

// Correctness
#![deny(clippy::indexing_slicing)]
#![deny(clippy::string_slice)]
#![deny(clippy::cast_possible_wrap)]
#![deny(clippy::undocumented_unsafe_blocks)]
// Panicking code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unimplemented)]
#![deny(clippy::todo)]
// Debug code that shouldn't be in production
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]

use anyhow::{Context, Result};
use clap::Parser;
use dd_hostsensor::config::{self, SensorConfig};
use dd_hostsensor::sensors::HostSensor;
use dd_hostsensor::SenseError;
use log::{debug, info};
use serde::Serialize;
use serde_json::{Value, json};

mod cli;

use cli::{Args, Sensor};

/// Wraps a sensor outcome the way it is reported: the value itself, or
/// `{"error": ...}` when the whole category is absent.
fn to_report<T: Serialize>(result: Result<T, SenseError>) -> Result<Value> {
    Ok(match result {
        Ok(value) => serde_json::to_value(value)?,
        Err(e) => {
            debug!("{e}");
            json!({ "error": e })
        }
    })
}

/// Raw file content is reported as text.
fn text(result: Result<Vec<u8>, SenseError>) -> Result<String, SenseError> {
    result.map(|content| String::from_utf8_lossy(&content).into_owned())
}

fn run_sensor(sensor: &HostSensor, which: Sensor) -> Result<Value> {
    match which {
        Sensor::Kubelet => to_report(sensor.kubelet_info()),
        Sensor::ControlPlane => to_report(sensor.control_plane_info()),
        Sensor::OsRelease => to_report(text(sensor.os_release())),
        Sensor::KernelVersion => to_report(text(sensor.kernel_version())),
        Sensor::SecurityHardening => Ok(serde_json::to_value(
            sensor.linux_security_hardening(),
        )?),
        Sensor::All => Ok(json!({
            "kubelet": run_sensor(sensor, Sensor::Kubelet)?,
            "controlPlane": run_sensor(sensor, Sensor::ControlPlane)?,
            "osRelease": run_sensor(sensor, Sensor::OsRelease)?,
            "kernelVersion": run_sensor(sensor, Sensor::KernelVersion)?,
            "linuxSecurityHardening": run_sensor(sensor, Sensor::SecurityHardening)?,
        })),
    }
}

#[allow(clippy::print_stdout)]
fn print_report(report: &Value) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    println!("{json}");
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let doc = config::load_config(args.config.as_deref())?;

    let mut config = SensorConfig::from_env_and_yaml(doc.as_ref());
    if let Some(host_root) = args.host_root {
        config.host_root = host_root;
    }
    if let Some(proc_root) = args.proc_root {
        config.proc_root = proc_root;
    }

    simple_logger::init_with_level(config.log_level)?;
    info!("Log level set to: {:?}", config.log_level);
    debug!("Running with {config:?}");

    let sensor = HostSensor::from_config(&config).with_context(|| {
        format!(
            "Failed to open host filesystem at {}",
            config.host_root.display()
        )
    })?;

    let report = run_sensor(&sensor, args.sensor)?;
    print_report(&report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_to_report_error() {
        let err: Result<String, SenseError> = Err(SenseError {
            message: "not a control plane node".to_string(),
            function: "control_plane_info".to_string(),
            code: 404,
        });
        let report = to_report(err).unwrap();
        assert_eq!(report["error"]["code"], 404);
        assert_eq!(report["error"]["function"], "control_plane_info");
    }

    #[test]
    fn test_to_report_text() {
        let report = to_report(text(Ok(b"ID=ubuntu\n\xff".to_vec()))).unwrap();
        assert_eq!(report, json!("ID=ubuntu\n\u{fffd}"));
    }
}
