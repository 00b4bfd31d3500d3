// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use base64::prelude::*;
use cap_std::fs::{Dir, MetadataExt};
use log::warn;
use serde::{Serialize, Serializer};

use crate::errors::Error;
use crate::host_path::HostRoot;

pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 10;
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024; // 1 MiB

const MAX_SYMLINK_HOPS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ownership {
    pub uid: u32,
    pub gid: u32,
}

/// Evidence about a single file on the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    /// The logical (host-view) path that was requested.
    pub path: String,

    /// Only present when requested and the file could be read.
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_content"
    )]
    pub content: Option<Vec<u8>>,

    pub ownership: Ownership,

    /// Permission bits, including setuid/setgid/sticky.
    pub permissions: u32,

    pub is_directory: bool,
}

fn serialize_content<S: Serializer>(content: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
    match content {
        Some(bytes) => s.serialize_str(&BASE64_STANDARD.encode(bytes)),
        None => s.serialize_none(),
    }
}

/// Result of a directory walk.
#[derive(Debug, Default)]
pub struct Walk {
    /// Leaf entries that passed the filter, in enumeration order.
    pub files: Vec<FileInfo>,

    /// Logical paths of directories that were not entered because of the
    /// recursion depth limit, one per cut branch.
    pub truncated: Vec<String>,
}

/// HostFs gives read access to the host filesystem mounted at a HostRoot.
///
/// Paths are first resolved lexically by the HostRoot, then every operation
/// goes through a cap_std::fs::Dir opened at the root, so symbolic links that
/// point outside of the root cannot be followed either. A symbolic link in
/// the last component with an absolute target is resolved against the host
/// root, the way the host itself would see it.
pub struct HostFs {
    dir: Dir,
    root: HostRoot,
    max_recursion_depth: usize,
    max_file_size: u64,
}

/// Returns a reader for the file after ensuring that the file is a regular file
/// and that the size that can be read from the reader will not exceed a
/// pre-defined safety limit to control memory usage.
///
/// This prevents reading device files, oversized files, and provides protection
/// against TOCTOU issues by using a LimitReader.
fn size_verified_reader(file: &cap_std::fs::File, max_size: u64) -> io::Result<impl Read + '_> {
    let metadata = file.metadata()?;

    // Don't try to read device files, etc.
    if !metadata.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a regular file",
        ));
    }

    let size = metadata.len();
    if size > max_size {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("file too large ({} bytes, max {} bytes)", size, max_size),
        ));
    }

    // Additional limit the reader to avoid surprises if the file size changes
    // while reading it (TOCTOU protection). Pseudo files from procfs and sysfs
    // report a size of zero and are read up to the limit.
    let limit = if size == 0 { max_size } else { size };
    Ok(file.take(limit))
}

impl HostFs {
    /// Opens the host filesystem at `root`. The root directory must exist.
    pub fn new(root: HostRoot) -> io::Result<Self> {
        let dir = Dir::open_ambient_dir(root.path(), cap_std::ambient_authority())?;
        Ok(Self {
            dir,
            root,
            max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        })
    }

    pub fn with_max_recursion_depth(mut self, depth: usize) -> Self {
        self.max_recursion_depth = depth;
        self
    }

    pub fn with_max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = size;
        self
    }

    pub fn root(&self) -> &HostRoot {
        &self.root
    }

    pub fn max_recursion_depth(&self) -> usize {
        self.max_recursion_depth
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Follows symbolic links in the last component of `relative`. cap_std
    /// refuses absolute targets, so they are resolved here against the host
    /// root. Targets climbing out of the root are refused.
    fn follow_links(&self, mut relative: PathBuf) -> io::Result<PathBuf> {
        for _ in 0..MAX_SYMLINK_HOPS {
            if !self.dir.symlink_metadata(&relative)?.file_type().is_symlink() {
                return Ok(relative);
            }

            let target = self.dir.read_link_contents(&relative)?;
            let logical = if target.is_absolute() {
                target
            } else {
                let parent = relative.parent().unwrap_or_else(|| Path::new(""));
                Path::new("/").join(parent).join(target)
            };
            relative = self
                .root
                .relative(&logical)
                .map_err(|e| io::Error::new(io::ErrorKind::PermissionDenied, e))?;
        }

        Err(io::Error::other("too many levels of symbolic links"))
    }

    /// Collects evidence about the file at the logical path `path`.
    ///
    /// Returns `Ok(None)` (after logging a warning) if the file does not exist
    /// or cannot be accessed; callers treat that as missing evidence. The only
    /// error is a path that escapes the host root.
    ///
    /// When `with_content` is set and the target is a regular file, its
    /// content is read in one pass. Files over the size limit keep their
    /// metadata but get no content.
    pub fn inspect<P: AsRef<Path>>(
        &self,
        path: P,
        with_content: bool,
    ) -> Result<Option<FileInfo>, Error> {
        let path = path.as_ref();
        let relative = self.root.relative(path)?;
        Ok(self.inspect_relative(path, relative, with_content))
    }

    /// inspect() on an already resolved path. `path` is only used for
    /// reporting.
    fn inspect_relative(
        &self,
        path: &Path,
        relative: PathBuf,
        with_content: bool,
    ) -> Option<FileInfo> {
        let (metadata, relative) = match self
            .follow_links(relative)
            .and_then(|relative| Ok((self.dir.metadata(&relative)?, relative)))
        {
            Ok(found) => found,
            Err(e) => {
                warn!("failed to stat {}: {e}", path.display());
                return None;
            }
        };

        let mut info = FileInfo {
            path: path.display().to_string(),
            content: None,
            ownership: Ownership {
                uid: metadata.uid(),
                gid: metadata.gid(),
            },
            permissions: metadata.mode() & 0o7777,
            is_directory: metadata.is_dir(),
        };

        if with_content && metadata.is_file() {
            match self.read_relative(&relative) {
                Ok(content) => info.content = Some(content),
                Err(e) => warn!("failed to read {}: {e}", path.display()),
            }
        }

        Some(info)
    }

    /// Reads the whole content of a regular file, under the same rules as
    /// inspect().
    pub fn read_file<P: AsRef<Path>>(&self, path: P) -> Result<Option<Vec<u8>>, Error> {
        Ok(self.inspect(path, true)?.and_then(|info| info.content))
    }

    /// Lists the entry names of a single directory. Unreadable directories
    /// give `Ok(None)`.
    pub fn list_names<P: AsRef<Path>>(&self, path: P) -> Result<Option<Vec<String>>, Error> {
        let path = path.as_ref();
        let relative = self.root.relative(path)?;

        match self
            .follow_links(relative)
            .and_then(|relative| self.dir.read_dir(relative))
        {
            Ok(entries) => Ok(Some(
                entries
                    .filter_map(|entry| entry.ok())
                    .map(|entry| entry.file_name().to_string_lossy().into_owned())
                    .collect(),
            )),
            Err(e) => {
                warn!("failed to read directory {}: {e}", path.display());
                Ok(None)
            }
        }
    }

    fn read_relative(&self, relative: &Path) -> io::Result<Vec<u8>> {
        let file = self.dir.open(relative)?;
        let mut reader = size_verified_reader(&file, self.max_file_size)?;
        let mut content = Vec::new();
        reader.read_to_end(&mut content)?;
        Ok(content)
    }

    /// Enumerates the files under the logical directory `dir`.
    ///
    /// Only leaf entries (anything that is not a directory) are returned, and
    /// only those whose name passes `filter` when one is given. Directories
    /// are always traversed when `recursive` is set, regardless of the filter.
    /// Symbolic links to directories below `dir` are leaves, never traversed.
    /// `dir` itself may be a link.
    ///
    /// A subdirectory at depth `current_depth + 1 >= max_recursion_depth` is
    /// not entered; a single warning is logged for it and it is recorded in
    /// `Walk::truncated`. Unreadable directories are skipped with a warning.
    /// The only error is `dir` itself escaping the host root.
    pub fn walk<P: AsRef<Path>>(
        &self,
        dir: P,
        recursive: bool,
        filter: Option<&dyn Fn(&str) -> bool>,
        current_depth: usize,
    ) -> Result<Walk, Error> {
        let dir = dir.as_ref();
        let relative = self.root.relative(dir)?;

        let mut walk = Walk::default();
        self.walk_into(dir, relative, recursive, filter, current_depth, &mut walk);
        Ok(walk)
    }

    /// `dir` is the logical path used in reports, `relative` where it really
    /// is under the root once links are followed.
    fn walk_into(
        &self,
        dir: &Path,
        relative: PathBuf,
        recursive: bool,
        filter: Option<&dyn Fn(&str) -> bool>,
        depth: usize,
        walk: &mut Walk,
    ) {
        let (entries, relative) = match self
            .follow_links(relative)
            .and_then(|relative| Ok((self.dir.read_dir(&relative)?, relative)))
        {
            Ok(found) => found,
            Err(e) => {
                warn!("failed to read directory {}: {e}", dir.display());
                return;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("failed to read entry in {}: {e}", dir.display());
                    continue;
                }
            };

            let name = entry.file_name();
            let child = dir.join(&name);
            let child_relative = relative.join(&name);

            let is_dir = match entry.file_type() {
                Ok(file_type) => file_type.is_dir(),
                Err(e) => {
                    warn!("failed to get file type of {}: {e}", child.display());
                    continue;
                }
            };

            if is_dir {
                if !recursive {
                    continue;
                }
                let child_depth = depth.saturating_add(1);
                if child_depth >= self.max_recursion_depth {
                    warn!("max recursion depth exceeded: {}", child.display());
                    walk.truncated.push(child.display().to_string());
                    continue;
                }
                self.walk_into(
                    &child,
                    child_relative,
                    recursive,
                    filter,
                    child_depth,
                    walk,
                );
                continue;
            }

            if let Some(filter) = filter
                && !filter(&name.to_string_lossy())
            {
                continue;
            }

            if let Some(info) = self.inspect_relative(&child, child_relative, false) {
                walk.files.push(info);
            }
        }
    }
}
