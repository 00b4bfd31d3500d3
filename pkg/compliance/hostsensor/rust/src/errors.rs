// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The logical path resolves outside of the host root.
    #[error("path {path:?} escapes host root {}", root.display())]
    InvalidPath { path: String, root: PathBuf },

    #[error("no process with executable ending in {suffix:?}")]
    ProcessNotFound { suffix: String },

    #[error("could not list process table at {}: {source}", path.display())]
    ProcTable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
