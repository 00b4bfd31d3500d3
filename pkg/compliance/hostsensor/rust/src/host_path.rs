// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! Translation of host-view paths into the host filesystem as mounted inside
//! the agent's container.

use std::path::{Component, Path, PathBuf};

use normalize_path::NormalizePath;

use crate::errors::Error;

/// HostRoot is the prefix under which the host filesystem is reachable. It is
/// always stored absolute and normalized so that containment can be checked
/// component-wise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRoot(PathBuf);

impl Default for HostRoot {
    fn default() -> Self {
        Self(PathBuf::from("/"))
    }
}

/// Drops the root (and any prefix) component so that the path can be joined
/// under another directory instead of replacing it.
fn strip_root(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
        .collect()
}

impl HostRoot {
    /// Creates a HostRoot. An empty path means the filesystem root.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref();
        if root.as_os_str().is_empty() {
            return Self::default();
        }
        let absolute = std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf());
        Self(absolute.normalize())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Resolves a logical host path to the real path under the root. The
    /// result is lexically normalized; `..` segments that climb above the root
    /// are rejected. No filesystem access is performed.
    pub fn resolve<P: AsRef<Path>>(&self, logical: P) -> Result<PathBuf, Error> {
        let logical = logical.as_ref();
        let resolved = self.0.join(strip_root(logical)).normalize();
        if !resolved.starts_with(&self.0) {
            return Err(Error::InvalidPath {
                path: logical.display().to_string(),
                root: self.0.clone(),
            });
        }
        Ok(resolved)
    }

    /// Like resolve(), but returns the path relative to the root, suitable for
    /// operations on a directory handle opened at the root. The root itself
    /// is returned as ".".
    pub fn relative<P: AsRef<Path>>(&self, logical: P) -> Result<PathBuf, Error> {
        let logical = logical.as_ref();
        let resolved = self.resolve(logical)?;
        let relative = resolved
            .strip_prefix(&self.0)
            .map_err(|_| Error::InvalidPath {
                path: logical.display().to_string(),
                root: self.0.clone(),
            })?;
        Ok(if relative.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            relative.to_path_buf()
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_under_root() {
        let root = HostRoot::new("/host");
        assert_eq!(
            root.resolve("/etc/kubelet.conf").unwrap(),
            PathBuf::from("/host/etc/kubelet.conf")
        );
        assert_eq!(
            root.resolve("etc/kubelet.conf").unwrap(),
            PathBuf::from("/host/etc/kubelet.conf")
        );
        assert_eq!(
            root.resolve("//etc/./kubernetes//pki/").unwrap(),
            PathBuf::from("/host/etc/kubernetes/pki")
        );
    }

    #[test]
    fn test_resolve_rejects_escape() {
        let root = HostRoot::new("/host");
        for path in [
            "/../etc/shadow",
            "../etc/shadow",
            "/etc/../../etc/shadow",
            "/var/lib/kubelet/../../../../root",
        ] {
            let err = root.resolve(path).unwrap_err();
            assert!(
                matches!(err, Error::InvalidPath { .. }),
                "{path} should be rejected, got {err:?}"
            );
        }
    }

    #[test]
    fn test_resolve_dotdot_inside_root() {
        let root = HostRoot::new("/host");
        assert_eq!(
            root.resolve("/etc/kubernetes/../kubelet.conf").unwrap(),
            PathBuf::from("/host/etc/kubelet.conf")
        );
        // Climbing out and back in still ends up under the root.
        assert_eq!(
            root.resolve("/etc/../../host/etc").unwrap(),
            PathBuf::from("/host/etc")
        );
        assert_eq!(root.resolve("/").unwrap(), PathBuf::from("/host"));
    }

    #[test]
    fn test_resolve_sibling_prefix_is_not_contained() {
        let root = HostRoot::new("/host");
        assert!(root.resolve("/../hostile/etc").is_err());
    }

    #[test]
    fn test_default_root() {
        let root = HostRoot::new("");
        assert_eq!(root.path(), Path::new("/"));
        assert_eq!(
            root.resolve("/etc/os-release").unwrap(),
            PathBuf::from("/etc/os-release")
        );
        // Nothing can climb above "/".
        assert_eq!(
            root.resolve("/../etc/os-release").unwrap(),
            PathBuf::from("/etc/os-release")
        );
    }

    #[test]
    fn test_root_is_normalized() {
        let root = HostRoot::new("/host/./fs/");
        assert_eq!(root.path(), Path::new("/host/fs"));
        assert_eq!(
            root.resolve("/etc").unwrap(),
            PathBuf::from("/host/fs/etc")
        );
    }

    #[test]
    fn test_relative() {
        let root = HostRoot::new("/host");
        assert_eq!(
            root.relative("/etc/kubernetes/pki").unwrap(),
            PathBuf::from("etc/kubernetes/pki")
        );
        assert_eq!(root.relative("/").unwrap(), PathBuf::from("."));
        assert!(root.relative("/../etc").is_err());
    }
}
