// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use log::{debug, warn};
use serde::Serialize;
use yaml_rust2::YamlLoader;

use super::{HostSensor, SenseError};
use crate::config::get_yaml_string_option;
use crate::fs::FileInfo;

const KUBELET_PROCESS_SUFFIX: &str = "/kubelet";
const KUBELET_CONFIG_ARG: &str = "--config";
const KUBELET_KUBECONFIG_ARG: &str = "--kubeconfig";
const KUBELET_CLIENT_CA_ARG: &str = "--client-ca-file";

const KUBELET_CONFIG_DEFAULT_PATH: &str = "/var/lib/kubelet/config.yaml";
const KUBELET_KUBECONFIG_DEFAULT_PATH: &str = "/etc/kubernetes/kubelet.conf";

const KUBELET_UNIT_FILES: [&str; 3] = [
    "/etc/systemd/system/kubelet.service",
    "/usr/lib/systemd/system/kubelet.service",
    "/lib/systemd/system/kubelet.service",
];
const KUBELET_DROP_IN_DIRS: [&str; 3] = [
    "/etc/systemd/system/kubelet.service.d",
    "/usr/lib/systemd/system/kubelet.service.d",
    "/lib/systemd/system/kubelet.service.d",
];

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KubeletInfo {
    /// Systemd unit and drop-in files configuring the kubelet service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_files: Option<Vec<FileInfo>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<FileInfo>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub kube_config_file: Option<FileInfo>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "clientCAFile")]
    pub client_ca_file: Option<FileInfo>,

    pub cmd_line: String,
}

/// Extracts `authentication.x509.clientCAFile` from a kubelet config file.
fn extract_client_ca_file(content: &[u8]) -> Option<String> {
    let content = std::str::from_utf8(content).ok()?;
    let docs = match YamlLoader::load_from_str(content) {
        Ok(docs) => docs,
        Err(e) => {
            debug!("failed to parse kubelet config: {e}");
            return None;
        }
    };
    let doc = docs.into_iter().next()?;
    get_yaml_string_option(&doc, "authentication.x509.clientCAFile").filter(|s| !s.is_empty())
}

impl HostSensor {
    fn kubelet_service_files(&self) -> Option<Vec<FileInfo>> {
        let is_conf = |name: &str| name.ends_with(".conf");

        let mut files: Vec<FileInfo> = KUBELET_UNIT_FILES
            .iter()
            .filter_map(|path| self.file_info(path, false, "kubelet service"))
            .collect();

        for dir in KUBELET_DROP_IN_DIRS {
            match self.fs.walk(dir, false, Some(&is_conf), 0) {
                Ok(walk) => files.extend(walk.files),
                Err(e) => warn!("kubelet service: skipping {dir}: {e}"),
            }
        }

        (!files.is_empty()).then_some(files)
    }

    /// Collects the kubelet's service files, configuration, kubeconfig,
    /// client CA and command line.
    pub fn kubelet_info(&self) -> Result<KubeletInfo, SenseError> {
        let kubelet = self
            .procfs
            .locate_by_exe_suffix(KUBELET_PROCESS_SUFFIX)
            .map_err(|e| {
                SenseError::not_found(
                    "kubelet_info",
                    format!("failed to locate kubelet process: {e}"),
                )
            })?;

        let mut info = KubeletInfo {
            service_files: self.kubelet_service_files(),
            cmd_line: kubelet.raw_cmd(),
            ..Default::default()
        };

        let config_path = kubelet
            .get_arg(KUBELET_CONFIG_ARG)
            .filter(|p| !p.is_empty())
            .unwrap_or(KUBELET_CONFIG_DEFAULT_PATH);
        info.config_file = self.file_info(config_path, true, "kubelet config");

        let kube_config_path = kubelet
            .get_arg(KUBELET_KUBECONFIG_ARG)
            .filter(|p| !p.is_empty())
            .unwrap_or(KUBELET_KUBECONFIG_DEFAULT_PATH);
        info.kube_config_file = self.file_info(kube_config_path, false, "kubelet kubeconfig");

        let client_ca_path = match kubelet.get_arg(KUBELET_CLIENT_CA_ARG) {
            Some(path) => Some(path.to_string()),
            None => info
                .config_file
                .as_ref()
                .and_then(|config| config.content.as_deref())
                .and_then(extract_client_ca_file),
        };
        if let Some(path) = client_ca_path {
            info.client_ca_file = self.file_info(&path, false, "kubelet client ca");
        }

        Ok(info)
    }
}
