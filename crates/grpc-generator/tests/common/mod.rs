// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for grpc-generator integration tests.
//!
//! Provides a resource bundle laid out on disk and helpers to route
//! arguments against a temporary cache directory.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use grpc_generator::{DirectoryResources, Properties, Routed, route};
use tempfile::TempDir;

/// Build timestamp written to `timestamp.txt` (2023-11-14T22:13:20Z).
pub const BUILD_TIMESTAMP_MS: u64 = 1_700_000_000_000;

/// Linux resources shipped in the test bundle.
pub const LINUX_EXECUTABLES: &[&str] = &[
    "exe/protoc-linux-x86_64",
    "exe/grpc-java-linux-x86_64",
    "exe/rx3grpc-linux-x86_64",
    "exe/rxgrpc-linux-x86_64",
    "exe/grpc-osgi-generator-linux-x86_64",
];

/// A resource bundle plus a cache directory, both temporary.
pub struct TestBundle {
    pub bundle_dir: TempDir,
    pub cache_dir: TempDir,
}

impl TestBundle {
    /// Bundle where every Linux executable contains its own resource name.
    pub fn new() -> Self {
        let bundle = Self::empty();
        for resource in LINUX_EXECUTABLES {
            bundle.write_resource(resource, resource.as_bytes());
        }
        bundle
    }

    /// Bundle holding only `timestamp.txt`.
    pub fn empty() -> Self {
        let bundle = Self {
            bundle_dir: TempDir::new().expect("Failed to create bundle dir"),
            cache_dir: TempDir::new().expect("Failed to create cache dir"),
        };
        bundle.write_resource("timestamp.txt", BUILD_TIMESTAMP_MS.to_string().as_bytes());
        bundle
    }

    /// Write (or replace) one resource in the bundle.
    pub fn write_resource(&self, name: &str, bytes: &[u8]) {
        let path = self.bundle_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create resource dir");
        }
        fs::write(path, bytes).expect("Failed to write resource");
    }

    pub fn resources(&self) -> DirectoryResources {
        DirectoryResources::new(self.bundle_dir.path())
    }

    pub fn cache(&self) -> &Path {
        self.cache_dir.path()
    }

    pub fn cached(&self, name: &str) -> PathBuf {
        self.cache_dir.path().join(name)
    }

    /// Route `args` with `cacheDir` pointed at this bundle's cache.
    pub fn route(&self, args: &[&str]) -> Routed {
        let mut raw = vec![format!("cacheDir={}", self.cache().display())];
        raw.extend(args.iter().map(|s| s.to_string()));
        route(&raw, &Properties::new()).expect("Failed to route arguments")
    }
}
