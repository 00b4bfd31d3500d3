// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "host-sensor")]
#[command(about = "Collects Kubernetes node evidence from the host filesystem and process table", long_about = None)]
pub struct Args {
    /// Path to the YAML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Where the host filesystem is mounted (overrides HOST_ROOT)
    #[arg(long)]
    pub host_root: Option<PathBuf>,

    /// Where the host process table is mounted (overrides HOST_PROC)
    #[arg(long)]
    pub proc_root: Option<PathBuf>,

    /// Sensor to run
    #[arg(short, long, value_enum, default_value_t = Sensor::All)]
    pub sensor: Sensor,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sensor {
    Kubelet,
    ControlPlane,
    OsRelease,
    KernelVersion,
    SecurityHardening,
    All,
}
