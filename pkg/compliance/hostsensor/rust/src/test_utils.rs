// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! Test utilities for building fake host filesystems and process tables
#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::fs::HostFs;
use crate::host_path::HostRoot;
use crate::procfs::ProcFs;

/// A temporary directory standing in for the host filesystem mounted into the
/// agent's container. Paths passed to the helpers are host-view paths.
pub struct TestHost {
    temp_dir: TempDir,
}

impl TestHost {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    pub fn root(&self) -> HostRoot {
        HostRoot::new(self.temp_dir.path())
    }

    pub fn fs(&self) -> HostFs {
        HostFs::new(self.root()).unwrap()
    }

    /// Real location of a host-view path.
    pub fn real_path<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.root().resolve(path).unwrap()
    }

    pub fn write<P: AsRef<Path>>(&self, path: P, content: &[u8]) {
        let real = self.real_path(path);
        if let Some(parent) = real.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(real, content).unwrap();
    }

    pub fn mkdir<P: AsRef<Path>>(&self, path: P) {
        std::fs::create_dir_all(self.real_path(path)).unwrap();
    }

    /// Creates a symbolic link at `link` pointing to `target` verbatim.
    pub fn symlink<P: AsRef<Path>>(&self, target: &str, link: P) {
        let real = self.real_path(link);
        if let Some(parent) = real.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::os::unix::fs::symlink(target, real).unwrap();
    }
}

/// A fake /proc: one directory per PID with an `exe` symlink (which does not
/// need to point to an existing file) and a `cmdline` file.
pub struct FakeProc {
    temp_dir: TempDir,
}

impl FakeProc {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    pub fn procfs(&self) -> ProcFs {
        ProcFs::new(self.temp_dir.path())
    }

    pub fn add(&self, pid: i32, exe: &str, args: &[&str]) {
        self.add_exe_only(pid, exe);
        let mut cmdline = args.join("\0");
        cmdline.push('\0');
        std::fs::write(
            self.temp_dir.path().join(pid.to_string()).join("cmdline"),
            cmdline,
        )
        .unwrap();
    }

    pub fn add_exe_only(&self, pid: i32, exe: &str) {
        let dir = self.temp_dir.path().join(pid.to_string());
        std::fs::create_dir_all(&dir).unwrap();
        std::os::unix::fs::symlink(exe, dir.join("exe")).unwrap();
    }

    pub fn add_dir(&self, name: &str) {
        std::fs::create_dir_all(self.temp_dir.path().join(name)).unwrap();
    }

    /// Makes `root` the root filesystem of `pid`, as /proc/<pid>/root would be.
    pub fn set_root(&self, pid: i32, root: &Path) {
        let dir = self.temp_dir.path().join(pid.to_string());
        std::fs::create_dir_all(&dir).unwrap();
        std::os::unix::fs::symlink(root, dir.join("root")).unwrap();
    }
}
