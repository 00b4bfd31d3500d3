// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! Sensors compose the filesystem and process primitives into evidence
//! reports for one node subsystem each. Missing evidence is an absent field;
//! a SenseError is only returned when a whole subsystem is absent.

mod control_plane;
mod kubelet;
mod os;

use std::path::Path;

use log::warn;
use serde::Serialize;
use thiserror::Error;

use crate::config::SensorConfig;
use crate::fs::{FileInfo, HostFs};
use crate::procfs::ProcFs;

pub use control_plane::{ApiServerInfo, ControlPlaneInfo, K8sProcessInfo};
pub use kubelet::KubeletInfo;
pub use os::LinuxSecurityHardeningStatus;

const STATUS_NOT_FOUND: u16 = 404;

/// "We could not establish X" for an entire sensor category, e.g. the node is
/// not a control plane node.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{function}: {message}")]
pub struct SenseError {
    pub message: String,
    pub function: String,
    pub code: u16,
}

impl SenseError {
    fn not_found(function: &str, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            function: function.to_string(),
            code: STATUS_NOT_FOUND,
        }
    }
}

pub struct HostSensor {
    fs: HostFs,
    procfs: ProcFs,
}

impl HostSensor {
    pub fn new(fs: HostFs, procfs: ProcFs) -> Self {
        Self { fs, procfs }
    }

    pub fn from_config(config: &SensorConfig) -> std::io::Result<Self> {
        Ok(Self::new(config.host_fs()?, config.procfs()))
    }

    /// Inspects a host file, turning every failure into absent evidence.
    fn file_info(&self, path: &str, with_content: bool, component: &str) -> Option<FileInfo> {
        file_info_in(&self.fs, path, with_content, component)
    }

    /// Walks a host directory, returning None when nothing was found.
    fn dir_files(&self, path: &str, component: &str) -> Option<Vec<FileInfo>> {
        match self.fs.walk(path, true, None, 0) {
            Ok(walk) if !walk.files.is_empty() => Some(walk.files),
            Ok(_) => None,
            Err(e) => {
                warn!("{component}: skipping {path}: {e}");
                None
            }
        }
    }
}

fn file_info_in(fs: &HostFs, path: &str, with_content: bool, component: &str) -> Option<FileInfo> {
    if path.is_empty() {
        return None;
    }
    match fs.inspect(Path::new(path), with_content) {
        Ok(info) => info,
        Err(e) => {
            warn!("{component}: skipping {path}: {e}");
            None
        }
    }
}
