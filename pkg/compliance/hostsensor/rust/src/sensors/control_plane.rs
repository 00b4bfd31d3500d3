// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use log::{debug, error, warn};
use serde::Serialize;

use super::{HostSensor, SenseError, file_info_in};
use crate::fs::{FileInfo, HostFs};
use crate::host_path::HostRoot;
use crate::procfs::ProcessDetails;

const API_SERVER_EXE: &str = "/kube-apiserver";
const CONTROLLER_MANAGER_EXE: &str = "/kube-controller-manager";
const SCHEDULER_EXE: &str = "/kube-scheduler";
const ETCD_EXE: &str = "/etcd";
const KUBELET_EXE: &str = "/kubelet";

const ETCD_DATA_DIR_ARG: &str = "--data-dir";
const API_ENCRYPTION_PROVIDER_CONFIG_ARG: &str = "--encryption-provider-config";
const CNI_CONF_DIR_ARG: &str = "--cni-conf-dir";

// Default file locations of a kubeadm-style control plane, as listed by the
// CIS Kubernetes benchmark.
const API_SERVER_SPECS_PATH: &str = "/etc/kubernetes/manifests/kube-apiserver.yaml";
const CONTROLLER_MANAGER_SPECS_PATH: &str =
    "/etc/kubernetes/manifests/kube-controller-manager.yaml";
const CONTROLLER_MANAGER_CONFIG_PATH: &str = "/etc/kubernetes/controller-manager.conf";
const SCHEDULER_SPECS_PATH: &str = "/etc/kubernetes/manifests/kube-scheduler.yaml";
const SCHEDULER_CONFIG_PATH: &str = "/etc/kubernetes/scheduler.conf";
const ETCD_CONFIG_PATH: &str = "/etc/kubernetes/manifests/etcd.yaml";
const ADMIN_CONFIG_PATH: &str = "/etc/kubernetes/admin.conf";
const PKI_DIR: &str = "/etc/kubernetes/pki";
const CNI_CONF_DIR_DEFAULT: &str = "/etc/cni/net.d";

/// Files and command line of one Kubernetes component.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct K8sProcessInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specs_file: Option<FileInfo>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<FileInfo>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub kube_config_file: Option<FileInfo>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "clientCAFile")]
    pub client_ca_file: Option<FileInfo>,

    /// Only set when the component's process is running.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmd_line: Option<String>,
}

impl K8sProcessInfo {
    pub fn is_empty(&self) -> bool {
        self.specs_file.is_none()
            && self.config_file.is_none()
            && self.kube_config_file.is_none()
            && self.client_ca_file.is_none()
            && self.cmd_line.is_none()
    }
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiServerInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_provider_config_file: Option<FileInfo>,

    #[serde(flatten)]
    pub process: K8sProcessInfo,
}

impl ApiServerInfo {
    pub fn is_empty(&self) -> bool {
        self.encryption_provider_config_file.is_none() && self.process.is_empty()
    }
}

#[derive(Debug, Default, Serialize)]
pub struct ControlPlaneInfo {
    #[serde(rename = "APIServerInfo", skip_serializing_if = "Option::is_none")]
    pub api_server_info: Option<ApiServerInfo>,

    #[serde(rename = "controllerManagerInfo", skip_serializing_if = "Option::is_none")]
    pub controller_manager_info: Option<K8sProcessInfo>,

    #[serde(rename = "schedulerInfo", skip_serializing_if = "Option::is_none")]
    pub scheduler_info: Option<K8sProcessInfo>,

    #[serde(rename = "etcdConfigFile", skip_serializing_if = "Option::is_none")]
    pub etcd_config_file: Option<FileInfo>,

    #[serde(rename = "etcdDataDir", skip_serializing_if = "Option::is_none")]
    pub etcd_data_dir: Option<FileInfo>,

    #[serde(rename = "adminConfigFile", skip_serializing_if = "Option::is_none")]
    pub admin_config_file: Option<FileInfo>,

    #[serde(rename = "PKIDir", skip_serializing_if = "Option::is_none")]
    pub pki_dir: Option<FileInfo>,

    #[serde(rename = "PKIFiles", skip_serializing_if = "Option::is_none")]
    pub pki_files: Option<Vec<FileInfo>>,

    #[serde(rename = "CNIConfigFiles", skip_serializing_if = "Option::is_none")]
    pub cni_config_files: Option<Vec<FileInfo>>,

    #[serde(rename = "CNIConfigPath", skip_serializing_if = "Option::is_none")]
    pub cni_config_path: Option<String>,
}

impl ControlPlaneInfo {
    /// True when no control plane evidence at all was found. Neither the CNI
    /// path (always known) nor an encryption provider config alone is
    /// evidence; the API server counts through its manifest or process.
    pub fn is_empty(&self) -> bool {
        self.api_server_info
            .as_ref()
            .is_none_or(|api_server| api_server.process.is_empty())
            && self.controller_manager_info.is_none()
            && self.scheduler_info.is_none()
            && self.etcd_config_file.is_none()
            && self.etcd_data_dir.is_none()
            && self.admin_config_file.is_none()
            && self.pki_dir.is_none()
            && self.pki_files.is_none()
            && self.cni_config_files.is_none()
    }
}

impl HostSensor {
    fn locate(&self, suffix: &str) -> Option<ProcessDetails> {
        match self.procfs.locate_by_exe_suffix(suffix) {
            Ok(process) => Some(process),
            Err(e) => {
                debug!("control plane: {e}");
                None
            }
        }
    }

    fn k8s_process_info(
        &self,
        process: Option<&ProcessDetails>,
        specs_path: &str,
        config_path: &str,
    ) -> Option<K8sProcessInfo> {
        let info = K8sProcessInfo {
            specs_file: self.file_info(specs_path, false, "specs"),
            config_file: self.file_info(config_path, false, "config"),
            cmd_line: process.map(ProcessDetails::raw_cmd),
            ..Default::default()
        };

        (!info.is_empty()).then_some(info)
    }

    /// The encryption provider config usually lives inside the API server's
    /// container, so it is looked up through the process's root filesystem
    /// first and on the host second.
    fn encryption_provider_config_file(&self, api_server: &ProcessDetails) -> Option<FileInfo> {
        let Some(path) = api_server
            .get_arg(API_ENCRYPTION_PROVIDER_CONFIG_ARG)
            .filter(|p| !p.is_empty())
        else {
            warn!("failed to find encryption provider config path");
            return None;
        };

        let process_root = self.procfs.process_root(api_server.pid());
        match HostFs::new(HostRoot::new(&process_root)) {
            Ok(fs) => {
                let fs = fs.with_max_file_size(self.fs.max_file_size());
                if let Some(info) = file_info_in(&fs, path, true, "encryption provider config") {
                    return Some(info);
                }
            }
            Err(e) => debug!(
                "cannot open root of process {}: {e}",
                api_server.pid()
            ),
        }

        self.file_info(path, true, "encryption provider config")
    }

    fn etcd_data_dir(&self, etcd: Option<&ProcessDetails>) -> Option<FileInfo> {
        let data_dir = etcd?.get_arg(ETCD_DATA_DIR_ARG).filter(|p| !p.is_empty());
        match data_dir {
            Some(data_dir) => self.file_info(data_dir, false, "etcd data dir"),
            None => {
                error!("failed to find etcd data-dir");
                None
            }
        }
    }

    fn cni_conf_dir(&self) -> String {
        self.locate(KUBELET_EXE)
            .and_then(|kubelet| {
                kubelet
                    .get_arg(CNI_CONF_DIR_ARG)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| CNI_CONF_DIR_DEFAULT.to_string())
    }

    /// Collects evidence about the control plane components running on this
    /// node. Fails only when nothing at all was found, which means the node
    /// is not a control plane node.
    pub fn control_plane_info(&self) -> Result<ControlPlaneInfo, SenseError> {
        let api_server = self.locate(API_SERVER_EXE);
        let controller_manager = self.locate(CONTROLLER_MANAGER_EXE);
        let scheduler = self.locate(SCHEDULER_EXE);
        let etcd = self.locate(ETCD_EXE);

        let api_server_info = ApiServerInfo {
            encryption_provider_config_file: api_server
                .as_ref()
                .and_then(|p| self.encryption_provider_config_file(p)),
            process: self
                .k8s_process_info(api_server.as_ref(), API_SERVER_SPECS_PATH, "")
                .unwrap_or_default(),
        };

        let cni_config_path = self.cni_conf_dir();

        let info = ControlPlaneInfo {
            api_server_info: (!api_server_info.is_empty()).then_some(api_server_info),
            controller_manager_info: self.k8s_process_info(
                controller_manager.as_ref(),
                CONTROLLER_MANAGER_SPECS_PATH,
                CONTROLLER_MANAGER_CONFIG_PATH,
            ),
            scheduler_info: self.k8s_process_info(
                scheduler.as_ref(),
                SCHEDULER_SPECS_PATH,
                SCHEDULER_CONFIG_PATH,
            ),
            etcd_config_file: self.file_info(ETCD_CONFIG_PATH, false, "etcd config"),
            etcd_data_dir: self.etcd_data_dir(etcd.as_ref()),
            admin_config_file: self.file_info(ADMIN_CONFIG_PATH, false, "admin config"),
            pki_dir: self.file_info(PKI_DIR, false, "pki dir"),
            pki_files: self.dir_files(PKI_DIR, "pki files"),
            cni_config_files: self.dir_files(&cni_config_path, "cni config files"),
            cni_config_path: Some(cni_config_path),
        };

        if info.is_empty() {
            return Err(SenseError::not_found(
                "control_plane_info",
                "not a control plane node",
            ));
        }

        Ok(info)
    }
}
