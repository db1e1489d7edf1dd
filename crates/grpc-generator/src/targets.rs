// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Target descriptors
//!
//! Maps each logical tool name to the bundled resource that provides it on
//! every supported platform.

use crate::error::{Error, Result};
use crate::platform::Platform;

/// Prefix protoc expects on plugin executable names.
pub const PROTOGEN_PREFIX: &str = "protoc-gen-";

/// The protocol buffer compiler.
pub const PROTOC: &str = "protoc";
/// grpc-java service stub generator.
pub const GRPC_JAVA: &str = "protoc-gen-grpc-java";
/// reactive-grpc generator for RxJava 3.
pub const RX3GRPC: &str = "protoc-gen-rx3grpc";
/// reactive-grpc generator for RxJava 2.
pub const RXGRPC: &str = "protoc-gen-rxgrpc";
/// OSGi service interface generator.
pub const GRPC_OSGI_GENERATOR: &str = "protoc-gen-grpc-osgi-generator";
/// Python wrapper around `grpc_tools.protoc`.
pub const GRPC_PROTOC_SCRIPT: &str = "grpc_protoc.py";

/// Bundled resource locations for one logical tool.
#[derive(Debug, Clone, Copy)]
pub struct TargetDescriptor {
    /// Logical name; also the file name inside the cache directory.
    pub name: &'static str,
    resources: &'static [(Platform, &'static str)],
}

impl TargetDescriptor {
    /// Descriptor for `name` with per-platform resource paths.
    pub const fn new(name: &'static str, resources: &'static [(Platform, &'static str)]) -> Self {
        Self { name, resources }
    }

    /// Resource path for the given platform, if the bundle ships one.
    pub fn resource_for(&self, platform: Platform) -> Option<&'static str> {
        self.resources
            .iter()
            .find(|(p, _)| *p == platform)
            .map(|(_, resource)| *resource)
    }
}

static BUILTIN_TARGETS: &[TargetDescriptor] = &[
    TargetDescriptor::new(
        PROTOC,
        &[
            (Platform::Windows, "exe/protoc-windows-x86_64"),
            (Platform::MacOs, "exe/protoc-osx-x86_64"),
            (Platform::Linux, "exe/protoc-linux-x86_64"),
        ],
    ),
    TargetDescriptor::new(
        GRPC_JAVA,
        &[
            (Platform::Windows, "exe/grpc-java-windows-x86_64"),
            (Platform::MacOs, "exe/grpc-java-osx-x86_64"),
            (Platform::Linux, "exe/grpc-java-linux-x86_64"),
        ],
    ),
    TargetDescriptor::new(
        RX3GRPC,
        &[
            (Platform::Windows, "exe/rx3grpc-windows-x86_64"),
            (Platform::MacOs, "exe/rx3grpc-osx-x86_64"),
            (Platform::Linux, "exe/rx3grpc-linux-x86_64"),
        ],
    ),
    TargetDescriptor::new(
        RXGRPC,
        &[
            (Platform::Windows, "exe/rxgrpc-windows-x86_64"),
            (Platform::MacOs, "exe/rxgrpc-osx-x86_64"),
            (Platform::Linux, "exe/rxgrpc-linux-x86_64"),
        ],
    ),
    TargetDescriptor::new(
        GRPC_OSGI_GENERATOR,
        &[
            (Platform::Windows, "exe/grpc-osgi-generator-windows-x86_64"),
            (Platform::MacOs, "exe/grpc-osgi-generator-osx-x86_64"),
            (Platform::Linux, "exe/grpc-osgi-generator-linux-x86_64"),
        ],
    ),
    TargetDescriptor::new(
        GRPC_PROTOC_SCRIPT,
        &[
            (Platform::Windows, GRPC_PROTOC_SCRIPT),
            (Platform::MacOs, GRPC_PROTOC_SCRIPT),
            (Platform::Linux, GRPC_PROTOC_SCRIPT),
        ],
    ),
];

/// Lookup table from logical name to descriptor.
#[derive(Debug, Clone, Copy)]
pub struct TargetRegistry {
    targets: &'static [TargetDescriptor],
}

impl Default for TargetRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TargetRegistry {
    /// Registry over a custom descriptor table.
    pub const fn new(targets: &'static [TargetDescriptor]) -> Self {
        Self { targets }
    }

    /// Registry of every tool shipped in the resource bundle.
    pub fn builtin() -> Self {
        Self::new(BUILTIN_TARGETS)
    }

    /// Find the descriptor for a logical name.
    pub fn lookup(&self, name: &str) -> Result<&'static TargetDescriptor> {
        self.targets
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| Error::UnknownTarget(name.to_string()))
    }

    /// All registered descriptors.
    pub fn iter(&self) -> impl Iterator<Item = &'static TargetDescriptor> {
        self.targets.iter()
    }
}
