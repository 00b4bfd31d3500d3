// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use std::env;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::warn;
use yaml_rust2::{Yaml, YamlLoader};

use crate::fs::{DEFAULT_MAX_FILE_SIZE, DEFAULT_MAX_RECURSION_DEPTH, HostFs};
use crate::host_path::HostRoot;
use crate::procfs::ProcFs;

const DEFAULT_CONFIG_PATH: &str = "/etc/host-sensor/host-sensor.yaml";

/// Settings shared by every sensor. Built once at startup and passed down
/// explicitly; nothing reads it from global state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorConfig {
    pub host_root: PathBuf,
    pub proc_root: PathBuf,
    pub max_recursion_depth: usize,
    pub max_file_size: u64,
    pub log_level: log::Level,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            host_root: PathBuf::from("/"),
            proc_root: PathBuf::from("/proc"),
            max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            log_level: log::Level::Info,
        }
    }
}

impl SensorConfig {
    /// Builds the configuration from the environment and the optional YAML
    /// document. Environment variables take precedence over YAML keys.
    pub fn from_env_and_yaml(doc: Option<&Yaml>) -> Self {
        let defaults = Self::default();

        let host_root = env::var("HOST_ROOT")
            .ok()
            .or_else(|| doc.and_then(|doc| get_yaml_string_option(doc, "host_root")))
            .filter(|root| !root.is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.host_root);

        let proc_root = env::var("HOST_PROC")
            .ok()
            .or_else(|| doc.and_then(|doc| get_yaml_string_option(doc, "proc_root")))
            .filter(|root| !root.is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.proc_root);

        let max_recursion_depth = get_number(
            "HOST_SENSOR_MAX_RECURSION_DEPTH",
            "max_recursion_depth",
            doc,
        )
        .and_then(|depth| usize::try_from(depth).ok())
        .unwrap_or(defaults.max_recursion_depth);

        let max_file_size = get_number("HOST_SENSOR_MAX_FILE_SIZE", "max_file_size", doc)
            .unwrap_or(defaults.max_file_size);

        Self {
            host_root,
            proc_root,
            max_recursion_depth,
            max_file_size,
            log_level: get_log_level(doc),
        }
    }

    /// Opens the host filesystem described by this configuration.
    pub fn host_fs(&self) -> std::io::Result<HostFs> {
        Ok(HostFs::new(HostRoot::new(&self.host_root))?
            .with_max_recursion_depth(self.max_recursion_depth)
            .with_max_file_size(self.max_file_size))
    }

    pub fn procfs(&self) -> ProcFs {
        ProcFs::new(&self.proc_root)
    }
}

/// Loads the YAML config file if it exists
pub fn load_config(config_path: Option<&Path>) -> Result<Option<Yaml>> {
    let path = config_path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));

    // A missing file is fine, env vars and defaults might be sufficient.
    if path.exists() {
        let mut file = File::open(path).context("Failed to open host-sensor config file")?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .context("Failed to read host-sensor config file")?;

        let docs = YamlLoader::load_from_str(&contents).context("Failed to parse YAML config")?;
        Ok(docs.into_iter().next())
    } else {
        warn!(
            "Config file not found at {}. Checking environment variables only.",
            path.display()
        );
        Ok(None)
    }
}

/// Walks a dotted key through nested mappings.
fn get_yaml_value<'a>(doc: &'a Yaml, key: &str) -> Option<&'a Yaml> {
    let mut current = doc;
    for part in key.split('.') {
        current = &current[part];
        if current.is_badvalue() {
            return None;
        }
    }
    Some(current)
}

/// Get string value from YAML, returning Option<String> instead of defaulting to empty string
/// This allows us to distinguish between an empty string and "not set"
pub fn get_yaml_string_option(doc: &Yaml, key: &str) -> Option<String> {
    get_yaml_value(doc, key)?.as_str().map(|s| s.to_string())
}

fn get_yaml_u64_option(doc: &Yaml, key: &str) -> Option<u64> {
    get_yaml_value(doc, key)?
        .as_i64()
        .and_then(|n| u64::try_from(n).ok())
}

/// Reads a non-negative number, from the environment first. Values that do
/// not parse are ignored with a warning.
fn get_number(env_var: &str, yaml_key: &str, doc: Option<&Yaml>) -> Option<u64> {
    if let Ok(val) = env::var(env_var) {
        match val.trim().parse::<u64>() {
            Ok(n) => return Some(n),
            Err(e) => warn!("Ignoring invalid value {val:?} for {env_var}: {e}"),
        }
    }

    doc.and_then(|doc| get_yaml_u64_option(doc, yaml_key))
}

/// Parse a Go log level string into a log::Level
/// Unknown levels silently default to Info
fn parse_log_level(level: &str) -> log::Level {
    match level.to_lowercase().as_str() {
        "trace" => log::Level::Trace,
        "debug" => log::Level::Debug,
        "info" => log::Level::Info,
        "warn" | "warning" => log::Level::Warn,
        "error" | "critical" => log::Level::Error,
        "off" => log::Level::Error, // Rust log crate doesn't have "off", use Error as minimal logging
        _ => log::Level::Info,
    }
}

/// Gets the log level from configuration.
/// Priority: DD_LOG_LEVEL > LOG_LEVEL > YAML config > default Info
fn get_log_level(doc: Option<&Yaml>) -> log::Level {
    if let Ok(level) = env::var("DD_LOG_LEVEL") {
        return parse_log_level(&level);
    }

    if let Ok(level) = env::var("LOG_LEVEL") {
        return parse_log_level(&level);
    }

    doc.and_then(|doc| get_yaml_string_option(doc, "log_level"))
        .map(|level| parse_log_level(&level))
        .unwrap_or(log::Level::Info)
}
