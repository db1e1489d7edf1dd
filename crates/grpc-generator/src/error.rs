// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for grpc-generator.

use std::path::PathBuf;
use thiserror::Error;

/// Generator errors.
///
/// Every variant is fatal: the binary reports it and exits non-zero without
/// launching (or after failing to launch) a child process.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// No target descriptor is registered for the logical name.
    #[error("Can't find exes for targetName={0}")]
    UnknownTarget(String),

    /// The host operating system is not one of the supported families.
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// A descriptor exists but the bundle does not contain its resource.
    #[error("Corrupt resource bundle, not found {0}")]
    CorruptBundle(String),

    /// Staging finished without producing a file for the target.
    #[error("Cannot find {target} to copy to {cache_dir}")]
    NotStaged {
        /// Logical target name.
        target: String,
        /// Cache directory staging was attempted in.
        cache_dir: PathBuf,
    },

    /// `working_dir` does not exist, is not a directory, or is read-only.
    #[error("working_dir={0} is not valid")]
    InvalidWorkingDir(PathBuf),

    /// `log_level` names no known level.
    #[error("Invalid log_level: {0}")]
    InvalidLogLevel(String),

    /// The child process could not be started.
    #[error("Failed to execute {program}: {source}")]
    Spawn {
        /// Program that was being started.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type using generator Error.
pub type Result<T> = std::result::Result<T, Error>;
