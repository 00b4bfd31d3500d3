// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use std::path::Path;

use log::{debug, warn};
use serde::Serialize;

use super::{HostSensor, SenseError};

const ETC_DIR: &str = "/etc";
const OS_RELEASE_SUFFIX: &str = "os-release";
const OS_RELEASE_FALLBACK: &str = "/usr/lib/os-release";
const KERNEL_VERSION_PATH: &str = "/proc/version";
const APP_ARMOR_PROFILES_PATH: &str = "/sys/kernel/security/apparmor/profiles";
const SE_LINUX_CONFIG_PATH: &str = "/etc/selinux/semanage.conf";

const APP_ARMOR_UNLOADED: &str = "unloaded";
const APP_ARMOR_STOPPED: &str = "stopped";
const APP_ARMOR_RUNNING: &str = "running";
const SE_LINUX_NOT_FOUND: &str = "not found";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinuxSecurityHardeningStatus {
    /// One of "unloaded", "stopped" or "running".
    pub app_armor: String,
    /// The SELinux semanage configuration, or "not found".
    #[serde(rename = "seLinux")]
    pub se_linux: String,
}

/// Picks the os-release file among the entries of /etc. The exact name wins,
/// then the first name ending in "os-release" in lexical order.
fn pick_os_release(mut names: Vec<String>) -> Option<String> {
    names.sort();
    if names.iter().any(|n| n == OS_RELEASE_SUFFIX) {
        return Some(OS_RELEASE_SUFFIX.to_string());
    }
    names.into_iter().find(|n| n.ends_with(OS_RELEASE_SUFFIX))
}

impl HostSensor {
    fn read_host_file(&self, path: &str) -> Option<Vec<u8>> {
        match self.fs.read_file(path) {
            Ok(content) => content,
            Err(e) => {
                warn!("skipping {path}: {e}");
                None
            }
        }
    }

    /// Returns the content of the host's os-release file.
    pub fn os_release(&self) -> Result<Vec<u8>, SenseError> {
        let names = match self.fs.list_names(ETC_DIR) {
            Ok(names) => names.unwrap_or_default(),
            Err(e) => {
                warn!("failed to list {ETC_DIR}: {e}");
                Vec::new()
            }
        };

        let candidate = pick_os_release(names).map(|name| {
            Path::new(ETC_DIR)
                .join(name)
                .to_string_lossy()
                .into_owned()
        });
        if let Some(path) = candidate {
            debug!("os release file found: {path}");
            if let Some(content) = self.read_host_file(&path) {
                return Ok(content);
            }
        }

        self.read_host_file(OS_RELEASE_FALLBACK).ok_or_else(|| {
            SenseError::not_found("os_release", "failed to find os-release file")
        })
    }

    /// Returns the content of the host's /proc/version.
    pub fn kernel_version(&self) -> Result<Vec<u8>, SenseError> {
        self.read_host_file(KERNEL_VERSION_PATH).ok_or_else(|| {
            SenseError::not_found("kernel_version", "failed to read kernel version")
        })
    }

    fn app_armor_status(&self) -> String {
        if self.file_info(APP_ARMOR_PROFILES_PATH, false, "apparmor").is_none() {
            return APP_ARMOR_UNLOADED.to_string();
        }
        match self.read_host_file(APP_ARMOR_PROFILES_PATH) {
            Some(content) if !content.is_empty() => APP_ARMOR_RUNNING.to_string(),
            _ => APP_ARMOR_STOPPED.to_string(),
        }
    }

    fn se_linux_status(&self) -> String {
        match self.read_host_file(SE_LINUX_CONFIG_PATH) {
            Some(content) if !content.is_empty() => String::from_utf8_lossy(&content).into_owned(),
            _ => SE_LINUX_NOT_FOUND.to_string(),
        }
    }

    /// Reports whether AppArmor and SELinux are active on the host. Never
    /// fails: an absent mechanism is a status of its own.
    pub fn linux_security_hardening(&self) -> LinuxSecurityHardeningStatus {
        LinuxSecurityHardeningStatus {
            app_armor: self.app_armor_status(),
            se_linux: self.se_linux_status(),
        }
    }
}
