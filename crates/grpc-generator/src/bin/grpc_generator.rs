// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! grpc-generator CLI
//!
//! Entry point invoked by the build tool. Stages protoc and the grpc plugins,
//! runs code generation and exits with the child's exit code.
//!
//! Usage:
//!
//! ```text
//! grpc-generator [CONTROLS] [PROTOC ARGS] <file.proto>...
//! ```
//!
//! Example:
//!
//! ```text
//! grpc-generator -Iprotofiles --java_out=src-gen --python_out=src-gen-python health.proto
//! ```

use anyhow::Context;
use grpc_generator::{
    DirectoryResources, Generator, PROPERTIES_FILE, Properties, Stager, SystemExecutor, route,
};
use std::io;
use std::path::Path;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

fn print_usage() {
    eprintln!(
        r#"Usage: grpc-generator [CONTROLS] [PROTOC ARGS] <file.proto>...

Generate Java and/or Python code from protocol buffer definitions using the
bundled protoc compiler and grpc plugins.

CONTROLS (also read from ./grpcgenerator.properties; the command line wins):
    log_level=<level>                 trace, debug, info, warn, error or off
    cacheDir=<dir>                    Where bundled executables are staged (default: ~/.bnd/cache)
    working_dir=<dir>                 Working directory for protoc / python
    rxjava3=<true|false>              Reactive-grpc variant (default: true; false selects RxJava 2)
    nogrpc                            Skip the grpc-java and reactive-grpc plugins
    noosgi                            Skip the grpc-osgi-generator plugin

JAVA:
    --java_out=<dir>                  Required for Java generation
    --grpc-java_out=<dir>             grpc-java output (default: --java_out)
    --rx3grpc_out=<dir>               reactive-grpc output (default: --java_out)
    --grpc-osgi-generator_out=<dir>   OSGi service interface output (default: --java_out)

PYTHON (requires grpcio-tools):
    --python_out=<dir>                Required for Python generation
    --grpc_python_out=<dir>           grpc service output
    --pyi_out=<dir>                   Type stub output
    python_exe=<path>                 Python interpreter (default: python)
    --grpc_protoc_main=<path>         Helper script (default: staged grpc_protoc.py)

Every other argument is passed to protoc unchanged.

ENVIRONMENT:
    GRPC_GENERATOR_RESOURCE_DIR       Resource bundle directory
    RUST_LOG                          Log filter when log_level is not given

EXAMPLES:
    grpc-generator -Iprotofiles --java_out=src-gen health.proto
    grpc-generator -Iprotofiles --java_out=src-gen --python_out=src-gen-python health.proto
"#
    );
}

/// Install the subscriber before routing so its warnings are kept.
///
/// The filter starts from `RUST_LOG` (default `warn`) and is replaced once
/// `log_level` is known.
fn init_tracing() -> reload::Handle<EnvFilter, Registry> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into());
    let (filter, handle) = reload::Layer::new(filter);

    // stdout belongs to the child process
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .init();
    handle
}

fn run(raw: &[String]) -> anyhow::Result<i32> {
    // Load .env file if present
    let dotenv = dotenvy::dotenv();
    let log_filter = init_tracing();

    let properties_path = Path::new(PROPERTIES_FILE);
    let properties = Properties::load(properties_path);

    let routed = route(raw, properties.as_ref().unwrap_or(&Properties::new()))
        .context("Invalid arguments")?;

    if let Some(level) = routed.config.log_level {
        log_filter
            .reload(EnvFilter::new(level.to_string()))
            .context("Failed to apply log_level")?;
    }

    if let Err(e) = dotenv {
        debug!("No .env file loaded: {}", e);
    }
    match &properties {
        Ok(props) => debug!(entries = props.len(), "Properties loaded from {}", PROPERTIES_FILE),
        Err(e) => debug!("Did not read {} from working directory: {}", PROPERTIES_FILE, e),
    }
    debug!(config = ?routed.config, "Arguments routed");

    let resources = DirectoryResources::discover();
    debug!(root = %resources.root().display(), "Using resource bundle");

    let stager = Stager::new(&routed.config.cache_dir, resources);
    debug!(cache_dir = %stager.cache_dir().display(), "Staging into cache directory");
    let exit_code = Generator::new(stager, SystemExecutor)
        .run(&routed)
        .context("Code generation failed")?;

    Ok(exit_code)
}

fn main() -> ExitCode {
    let raw: Vec<String> = std::env::args().skip(1).collect();

    if matches!(raw.as_slice(), [flag] if flag == "--help" || flag == "-h") {
        print_usage();
        return ExitCode::SUCCESS;
    }

    match run(&raw) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
