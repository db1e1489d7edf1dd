// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! grpc-generator - protoc / grpc plugin orchestration for build tools
//!
//! Given one or more `.proto` files, this crate stages the bundled `protoc`
//! compiler and code-generator plugins for the host platform into a cache
//! directory, assembles a single compiler invocation and runs it, forwarding
//! the child's exit code. A second, optional path runs `grpc_tools.protoc`
//! through a system Python interpreter.
//!
//! # Architecture
//!
//! ```text
//!     ┌─────────────┐      ┌─────────────┐      ┌─────────────┐
//!     │  argv +     │      │  Argument   │      │  Executable │
//!     │ .properties │─────▶│   Router    │─────▶│   Stager    │
//!     └─────────────┘      └─────────────┘      └─────────────┘
//!                                 │                    │
//!                                 ▼                    ▼
//!                          ┌─────────────┐      ┌─────────────┐
//!                          │ Invocation  │─────▶│  protoc /   │
//!                          │  Builder    │      │  python     │
//!                          └─────────────┘      └─────────────┘
//! ```
//!
//! # Generation Modes
//!
//! - **Java** (`--java_out` present): protoc with the grpc-java,
//!   reactive-grpc and grpc-osgi-generator plugins.
//! - **Python** (`--python_out` present): `python grpc_protoc.py ...`, which
//!   requires `grpcio-tools` in the interpreter's environment.
//!
//! Both may run in the same invocation; Java runs first.
//!
//! # Usage
//!
//! ```ignore
//! use grpc_generator::{DirectoryResources, Generator, Properties, Stager, SystemExecutor, route};
//!
//! let raw = vec!["-Iprotos".to_string(), "--java_out=src-gen".to_string(), "health.proto".to_string()];
//! let routed = route(&raw, &Properties::new())?;
//! let stager = Stager::new(&routed.config.cache_dir, DirectoryResources::discover());
//! let exit_code = Generator::new(stager, SystemExecutor).run(&routed)?;
//! ```
//!
//! # Modules
//!
//! - [`args`]: Argument routing into configuration and pass-through lists
//! - [`generator`]: Orchestration of the Java and Python runs
//! - [`invocation`]: Command line assembly and child process execution
//! - [`platform`]: Host operating system detection
//! - [`properties`]: `grpcgenerator.properties` parsing
//! - [`resources`]: Resource bundle access
//! - [`stager`]: Copying bundled executables into the cache directory
//! - [`targets`]: Logical tool names and their bundled resources

#![deny(missing_docs)]

/// Argument routing.
pub mod args;

/// Error types.
pub mod error;

/// Generation orchestration.
pub mod generator;

/// Command line assembly and execution.
pub mod invocation;

/// Host operating system detection.
pub mod platform;

/// Properties file parsing.
pub mod properties;

/// Resource bundle access.
pub mod resources;

/// Executable staging.
pub mod stager;

/// Target descriptors.
pub mod targets;

// Re-export main types
pub use args::{GeneratorConfig, JavaOutputs, PythonOptions, Routed, RxVariant, route};
pub use error::{Error, Result};
pub use generator::Generator;
pub use invocation::{
    Executor, Invocation, Mode, RecordingExecutor, SystemExecutor, java_invocation,
    python_invocation,
};
pub use platform::Platform;
pub use properties::{PROPERTIES_FILE, Properties};
pub use resources::{BuildTimestamp, DirectoryResources, MemoryResources, Resources};
pub use stager::Stager;
pub use targets::{TargetDescriptor, TargetRegistry};
