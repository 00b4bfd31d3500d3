// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! Lookup of processes in the native process table.
//!
//! The agent shares the host PID namespace, so the process table is read
//! directly (from /proc unless configured otherwise) and never through the
//! host root used for file access.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, trace};

use crate::args;
use crate::errors::Error;

/// A process found in the process table. The command line is kept exactly as
/// the kernel reported it, one token per argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessDetails {
    pid: i32,
    exe_path: PathBuf,
    cmdline: Vec<String>,
}

impl ProcessDetails {
    pub fn new(pid: i32, exe_path: PathBuf, cmdline: Vec<String>) -> Self {
        Self {
            pid,
            exe_path,
            cmdline,
        }
    }

    pub fn pid(&self) -> i32 {
        self.pid
    }

    pub fn exe_path(&self) -> &Path {
        &self.exe_path
    }

    pub fn cmdline(&self) -> &[String] {
        &self.cmdline
    }

    /// See [`args::get_arg`].
    pub fn get_arg(&self, name: &str) -> Option<&str> {
        args::get_arg(&self.cmdline, name)
    }

    /// See [`args::raw_cmd`].
    pub fn raw_cmd(&self) -> String {
        args::raw_cmd(&self.cmdline)
    }
}

/// Splits the contents of /proc/<pid>/cmdline into arguments.
fn parse_cmdline(raw: &[u8]) -> Vec<String> {
    let cmdline = String::from_utf8_lossy(raw);

    // Command lines from proc can have trailing null bytes if the process
    // has replaced part of it.
    let cmdline = cmdline.trim_end_matches('\0');
    if cmdline.is_empty() {
        return Vec::new();
    }

    cmdline.split('\0').map(str::to_string).collect()
}

#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl ProcFs {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the PIDs in the process table in ascending order.
    pub fn pids(&self) -> Result<Vec<i32>, Error> {
        let entries = fs::read_dir(&self.root).map_err(|source| Error::ProcTable {
            path: self.root.clone(),
            source,
        })?;

        let mut pids: Vec<i32> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str()?.parse::<i32>().ok())
            .filter(|pid| *pid > 0)
            .collect();
        pids.sort_unstable();

        Ok(pids)
    }

    pub fn exe(&self, pid: i32) -> io::Result<PathBuf> {
        fs::read_link(self.root.join(pid.to_string()).join("exe"))
    }

    pub fn cmdline(&self, pid: i32) -> io::Result<Vec<String>> {
        let raw = fs::read(self.root.join(pid.to_string()).join("cmdline"))?;
        Ok(parse_cmdline(&raw))
    }

    /// Path of the root filesystem of the process as seen through the process
    /// table, which is how files inside a container can be reached.
    pub fn process_root(&self, pid: i32) -> PathBuf {
        self.root.join(pid.to_string()).join("root")
    }

    /// Finds a process whose executable path ends with `suffix`.
    ///
    /// PIDs are scanned in ascending order and the first match wins, so when
    /// several processes share the suffix the lowest PID is returned.
    /// Processes whose executable cannot be read (kernel threads, permission
    /// denied, exited in the meantime) are skipped.
    pub fn locate_by_exe_suffix(&self, suffix: &str) -> Result<ProcessDetails, Error> {
        for pid in self.pids()? {
            let exe_path = match self.exe(pid) {
                Ok(exe_path) => exe_path,
                Err(e) => {
                    trace!("skipping pid {pid}: cannot read exe: {e}");
                    continue;
                }
            };

            if !exe_path.to_string_lossy().ends_with(suffix) {
                continue;
            }

            let cmdline = match self.cmdline(pid) {
                Ok(cmdline) => cmdline,
                Err(e) => {
                    debug!("skipping pid {pid} ({}): cannot read cmdline: {e}", exe_path.display());
                    continue;
                }
            };

            debug!("found process {pid} for suffix {suffix}: {}", exe_path.display());
            return Ok(ProcessDetails::new(pid, exe_path, cmdline));
        }

        Err(Error::ProcessNotFound {
            suffix: suffix.to_string(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::test_utils::FakeProc;

    #[test]
    fn test_parse_cmdline() {
        assert_eq!(
            parse_cmdline(b"kubelet\0--config\0/var/lib/kubelet/config.yaml\0"),
            vec!["kubelet", "--config", "/var/lib/kubelet/config.yaml"]
        );

        // Trailing null bytes after a rewritten command line
        assert_eq!(parse_cmdline(b"etcd\0\0\0\0"), vec!["etcd"]);

        // Empty arguments in the middle are kept
        assert_eq!(parse_cmdline(b"foo\0\0bar\0"), vec!["foo", "", "bar"]);

        // Spaces are not separators
        assert_eq!(parse_cmdline(b"sh\0-c\0echo hi\0"), vec!["sh", "-c", "echo hi"]);

        assert!(parse_cmdline(b"").is_empty());
        assert!(parse_cmdline(b"\0\0").is_empty());
    }

    #[test]
    fn test_parse_cmdline_invalid_utf8() {
        assert_eq!(
            parse_cmdline(b"app\0--name=\xff\0"),
            vec!["app", "--name=\u{fffd}"]
        );
    }

    #[test]
    fn test_pids_sorted_and_numeric_only() {
        let proc = FakeProc::new();
        proc.add(300, "/usr/bin/a", &["a"]);
        proc.add(12, "/usr/bin/b", &["b"]);
        proc.add_dir("self");
        proc.add_dir("sys");

        assert_eq!(proc.procfs().pids().unwrap(), vec![12, 300]);
    }

    #[test]
    fn test_pids_missing_table() {
        let procfs = ProcFs::new("/nonexistent/proc/table");
        assert!(matches!(procfs.pids(), Err(Error::ProcTable { .. })));
    }

    #[test]
    fn test_locate_by_exe_suffix() {
        let proc = FakeProc::new();
        proc.add(10, "/usr/lib/systemd/systemd", &["/sbin/init"]);
        proc.add(
            42,
            "/usr/bin/kubelet",
            &["/usr/bin/kubelet", "--config", "/var/lib/kubelet/config.yaml"],
        );
        proc.add(77, "/usr/local/bin/kube-apiserver", &["kube-apiserver"]);

        let p = proc.procfs().locate_by_exe_suffix("/kubelet").unwrap();
        assert_eq!(p.pid(), 42);
        assert_eq!(p.exe_path(), Path::new("/usr/bin/kubelet"));
        assert!(p.exe_path().to_string_lossy().ends_with("/kubelet"));
        assert_eq!(p.get_arg("--config"), Some("/var/lib/kubelet/config.yaml"));
        assert_eq!(
            p.raw_cmd(),
            "/usr/bin/kubelet --config /var/lib/kubelet/config.yaml"
        );
    }

    #[test]
    fn test_locate_not_found() {
        let proc = FakeProc::new();
        proc.add(10, "/usr/lib/systemd/systemd", &["/sbin/init"]);
        // A suffix match on a longer name does not count as "/kubelet".
        proc.add(11, "/usr/bin/not-kubelet", &["not-kubelet"]);

        let err = proc.procfs().locate_by_exe_suffix("/kubelet").unwrap_err();
        assert!(
            matches!(&err, Error::ProcessNotFound { suffix } if suffix == "/kubelet"),
            "unexpected error {err:?}"
        );
    }

    #[test]
    fn test_locate_lowest_pid_wins() {
        let proc = FakeProc::new();
        proc.add(900, "/usr/bin/etcd", &["etcd", "--data-dir=/b"]);
        proc.add(55, "/usr/bin/etcd", &["etcd", "--data-dir=/a"]);

        let p = proc.procfs().locate_by_exe_suffix("/etcd").unwrap();
        assert_eq!(p.pid(), 55);
        assert_eq!(p.get_arg("--data-dir"), Some("/a"));
    }

    #[test]
    fn test_locate_skips_unreadable_entries() {
        let proc = FakeProc::new();
        // Kernel threads have no exe link.
        proc.add_dir("2");
        // The process matched but its cmdline is gone.
        proc.add_exe_only(3, "/usr/bin/kubelet");
        proc.add(4, "/usr/bin/kubelet", &["kubelet"]);

        let p = proc.procfs().locate_by_exe_suffix("/kubelet").unwrap();
        assert_eq!(p.pid(), 4);
    }

    #[test]
    fn test_locate_any_suffix_matches() {
        let proc = FakeProc::new();
        proc.add(1, "/sbin/init", &["init"]);
        proc.add(2, "/usr/bin/containerd", &["containerd"]);
        proc.add(3, "/usr/bin/kubelet", &["kubelet"]);

        let procfs = proc.procfs();
        for suffix in ["/init", "containerd", "let", "/usr/bin/kubelet", "/nothing"] {
            match procfs.locate_by_exe_suffix(suffix) {
                Ok(p) => assert!(p.exe_path().to_string_lossy().ends_with(suffix)),
                Err(Error::ProcessNotFound { .. }) => assert_eq!(suffix, "/nothing"),
                Err(e) => panic!("unexpected error {e:?}"),
            }
        }
    }

    #[test]
    fn test_locate_current_process() {
        // The test binary itself is always in the real process table.
        let procfs = ProcFs::default();
        let exe = std::env::current_exe().unwrap();
        let p = procfs
            .locate_by_exe_suffix(&exe.to_string_lossy())
            .unwrap();
        assert!(p.exe_path().to_string_lossy().ends_with(&*exe.to_string_lossy()));
        assert!(!p.cmdline().is_empty());
    }

    #[test]
    fn test_cmdline_of_child_process() {
        let child = std::process::Command::new("sleep")
            .args(["30", "--"])
            .spawn()
            .unwrap();

        // Guard to ensure process cleanup even if the test panics
        let child = scopeguard::guard(child, |mut c| {
            c.kill().ok();
            c.wait().ok();
        });
        let pid = child.id().cast_signed();

        // The child may not have exec'd yet right after spawn.
        let procfs = ProcFs::default();
        let mut cmdline = Vec::new();
        for _ in 0..100 {
            cmdline = procfs.cmdline(pid).unwrap();
            if cmdline.first().map(String::as_str) == Some("sleep") {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(50));
        }
        assert_eq!(cmdline, vec!["sleep", "30", "--"]);

        let p = ProcessDetails::new(pid, procfs.exe(pid).unwrap(), cmdline);
        assert_eq!(p.get_arg("30"), Some("--"));
        assert_eq!(p.get_arg("--"), Some(""));
        assert_eq!(p.raw_cmd(), "sleep 30 --");
    }
}
