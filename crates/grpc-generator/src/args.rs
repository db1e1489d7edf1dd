// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Argument routing
//!
//! Splits the raw argument vector into the tool's own controls and two
//! pass-through lists: one for the protoc (Java) run and one for the
//! `grpc_tools` (Python) run.
//!
//! A control is looked up on the command line first, then in
//! `grpcgenerator.properties`, then falls back to its default. Controls the
//! tool consumes are removed from both lists; output flags owned by one mode
//! are removed only from the other mode's list. Everything else is passed
//! through verbatim and in order.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::properties::Properties;
use crate::targets::{RX3GRPC, RXGRPC};

/// Log verbosity.
pub const LOG_LEVEL: &str = "log_level";
/// Cache directory for staged executables.
pub const CACHE_DIR: &str = "cacheDir";
/// Working directory for child processes.
pub const WORKING_DIR: &str = "working_dir";
/// Reactive variant selector (`false` selects RxJava 2).
pub const RXJAVA3: &str = "rxjava3";
/// Legacy reactive selector; consumed and ignored.
pub const RXJAVA: &str = "rxjava";
/// Skip the grpc-java and reactive plugins.
pub const NOGRPC: &str = "nogrpc";
/// Skip the OSGi generator plugin.
pub const NOOSGI: &str = "noosgi";
/// Java message output directory; enables Java mode.
pub const JAVA_OUT: &str = "--java_out";
/// grpc-java output directory.
pub const GRPC_JAVA_OUT: &str = "--grpc-java_out";
/// RxJava 3 reactive-grpc output directory.
pub const RX3GRPC_OUT: &str = "--rx3grpc_out";
/// RxJava 2 reactive-grpc output directory.
pub const RXGRPC_OUT: &str = "--rxgrpc_out";
/// OSGi generator output directory.
pub const GRPC_OSGI_OUT: &str = "--grpc-osgi-generator_out";
/// Python message output directory; enables Python mode.
pub const PYTHON_OUT: &str = "--python_out";
/// grpc python service output directory.
pub const GRPC_PYTHON_OUT: &str = "--grpc_python_out";
/// Python type stub output directory.
pub const PYI_OUT: &str = "--pyi_out";
/// Python interpreter.
pub const PYTHON_EXE: &str = "python_exe";
/// Explicit path to the Python helper script.
pub const GRPC_PROTOC_MAIN: &str = "--grpc_protoc_main";

/// Default cache directory.
pub const DEFAULT_CACHE_DIR: &str = "~/.bnd/cache";
/// Default Python interpreter.
pub const DEFAULT_PYTHON_EXE: &str = "python";

/// Controls removed from both argument lists.
const CONSUMED: &[&str] = &[
    LOG_LEVEL,
    CACHE_DIR,
    WORKING_DIR,
    RXJAVA3,
    RXJAVA,
    NOGRPC,
    NOOSGI,
    GRPC_JAVA_OUT,
    RX3GRPC_OUT,
    RXGRPC_OUT,
    GRPC_OSGI_OUT,
    PYTHON_EXE,
    GRPC_PROTOC_MAIN,
];

/// Flags protoc understands but grpc_tools must not see.
const JAVA_ONLY: &[&str] = &[JAVA_OUT];

/// Flags grpc_tools understands but the Java protoc run must not see.
const PYTHON_ONLY: &[&str] = &[PYTHON_OUT, GRPC_PYTHON_OUT, PYI_OUT];

/// Which reactive-grpc generator the Java run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RxVariant {
    /// reactive-grpc for RxJava 3 (`rx3grpc`).
    #[default]
    RxJava3,
    /// reactive-grpc for RxJava 2 (`rxgrpc`).
    RxJava2,
}

impl RxVariant {
    /// Logical target name of the plugin executable.
    pub fn target(self) -> &'static str {
        match self {
            RxVariant::RxJava3 => RX3GRPC,
            RxVariant::RxJava2 => RXGRPC,
        }
    }

    /// Output id as used in `--<id>_out`.
    pub fn out_id(self) -> &'static str {
        match self {
            RxVariant::RxJava3 => "rx3grpc",
            RxVariant::RxJava2 => "rxgrpc",
        }
    }

    fn out_flag(self) -> &'static str {
        match self {
            RxVariant::RxJava3 => RX3GRPC_OUT,
            RxVariant::RxJava2 => RXGRPC_OUT,
        }
    }

    fn other(self) -> Self {
        match self {
            RxVariant::RxJava3 => RxVariant::RxJava2,
            RxVariant::RxJava2 => RxVariant::RxJava3,
        }
    }
}

/// Output directories for the Java run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JavaOutputs {
    /// protoc's built-in Java message output.
    pub java_out: String,
    /// grpc-java stubs.
    pub grpc_java_out: String,
    /// reactive-grpc stubs.
    pub rx_out: String,
    /// OSGi service interfaces.
    pub osgi_out: String,
}

/// Settings for the Python run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PythonOptions {
    /// Python message output.
    pub python_out: String,
    /// Interpreter command or path.
    pub python_exe: String,
    /// Helper script; staged from the bundle when `None`.
    pub grpc_protoc_main: Option<PathBuf>,
}

/// Tool configuration produced once by [`route`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Requested verbosity, if any.
    pub log_level: Option<LevelFilter>,
    /// Where executables are staged.
    pub cache_dir: PathBuf,
    /// Working directory for child processes; inherited when `None`.
    pub working_dir: Option<PathBuf>,
    /// Reactive-grpc variant.
    pub rx_variant: RxVariant,
    /// Run the grpc-java and reactive plugins.
    pub grpc: bool,
    /// Run the OSGi generator plugin.
    pub osgi: bool,
    /// Java mode; `None` when `--java_out` is absent.
    pub java: Option<JavaOutputs>,
    /// Python mode; `None` when `--python_out` is absent.
    pub python: Option<PythonOptions>,
}

/// Result of routing: configuration plus the two pass-through lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routed {
    /// Tool configuration.
    pub config: GeneratorConfig,
    /// Arguments appended to the protoc command line.
    pub java_args: Vec<String>,
    /// Arguments appended to the Python helper command line.
    pub python_args: Vec<String>,
}

/// Parse the raw argument vector with properties as fallback.
pub fn route(raw: &[String], props: &Properties) -> Result<Routed> {
    let lookup = Lookup { args: raw, props };

    let log_level = lookup
        .value(LOG_LEVEL)
        .map(|v| parse_log_level(&v))
        .transpose()?;

    let cache_dir = expand_home(&lookup.value_or(CACHE_DIR, DEFAULT_CACHE_DIR));

    let working_dir = lookup
        .value(WORKING_DIR)
        .map(|v| validate_working_dir(PathBuf::from(v)))
        .transpose()?;

    let rx_variant = if lookup.flag(RXJAVA3, true) {
        RxVariant::RxJava3
    } else {
        RxVariant::RxJava2
    };
    if let Some((flag, value)) = inactive_rx_out(&lookup, rx_variant) {
        warn!(
            flag,
            value = %value,
            rx_variant = ?rx_variant,
            "Ignoring output directory of the inactive reactive-grpc variant"
        );
    }
    let grpc = !lookup.flag(NOGRPC, false);
    let osgi = !lookup.flag(NOOSGI, false);

    let java = lookup.value(JAVA_OUT).map(|java_out| JavaOutputs {
        grpc_java_out: lookup.value_or(GRPC_JAVA_OUT, &java_out),
        rx_out: lookup.value_or(rx_variant.out_flag(), &java_out),
        osgi_out: lookup.value_or(GRPC_OSGI_OUT, &java_out),
        java_out,
    });

    let python = lookup.value(PYTHON_OUT).map(|python_out| PythonOptions {
        python_exe: lookup.value_or(PYTHON_EXE, DEFAULT_PYTHON_EXE),
        grpc_protoc_main: lookup.value(GRPC_PROTOC_MAIN).map(PathBuf::from),
        python_out,
    });

    let mut java_args = raw.to_vec();
    let mut python_args = raw.to_vec();
    for key in CONSUMED {
        remove(&mut java_args, key);
        remove(&mut python_args, key);
    }
    for key in JAVA_ONLY {
        remove(&mut python_args, key);
    }
    for key in PYTHON_ONLY {
        remove(&mut java_args, key);
    }

    // Mode switches that only came from the properties file still have to
    // reach the child.
    if let Some(java) = &java
        && !raw.iter().any(|a| match_key(a, JAVA_OUT).is_some())
    {
        java_args.insert(0, format!("{JAVA_OUT}={}", java.java_out));
    }
    if let Some(python) = &python
        && !raw.iter().any(|a| match_key(a, PYTHON_OUT).is_some())
    {
        python_args.insert(0, format!("{PYTHON_OUT}={}", python.python_out));
    }

    Ok(Routed {
        config: GeneratorConfig {
            log_level,
            cache_dir,
            working_dir,
            rx_variant,
            grpc,
            osgi,
            java,
            python,
        },
        java_args,
        python_args,
    })
}

/// Control lookup: command line, then properties, then default.
struct Lookup<'a> {
    args: &'a [String],
    props: &'a Properties,
}

impl Lookup<'_> {
    fn value(&self, key: &str) -> Option<String> {
        if let Some(found) = self.args.iter().find_map(|a| match_key(a, key)) {
            return Some(found.unwrap_or("true").to_string());
        }
        self.props
            .get(key)
            .or_else(|| self.props.get(key.trim_start_matches('-')))
            .map(str::to_string)
    }

    fn value_or(&self, key: &str, default: &str) -> String {
        self.value(key).unwrap_or_else(|| default.to_string())
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        self.value(key).map_or(default, |v| parse_bool(&v))
    }
}

/// Output flag given for the variant that is not selected.
///
/// Both reactive output flags are consumed, so the unused one never reaches
/// protoc.
fn inactive_rx_out(lookup: &Lookup<'_>, active: RxVariant) -> Option<(&'static str, String)> {
    let flag = active.other().out_flag();
    lookup.value(flag).map(|value| (flag, value))
}

/// Match `arg` against a control key.
///
/// Returns `Some(None)` for a bare key and `Some(Some(value))` for
/// `key=value`. Keys without leading dashes also accept the `--key` spelling.
fn match_key<'a>(arg: &'a str, key: &str) -> Option<Option<&'a str>> {
    let body = if key.starts_with('-') {
        arg
    } else {
        arg.strip_prefix("--").unwrap_or(arg)
    };
    if body == key {
        return Some(None);
    }
    body.strip_prefix(key)
        .and_then(|rest| rest.strip_prefix('='))
        .map(Some)
}

fn remove(args: &mut Vec<String>, key: &str) {
    args.retain(|a| match_key(a, key).is_none());
}

/// Bare presence and empty values count as `true`.
fn parse_bool(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "false" | "0" | "no" | "off"
    )
}

/// Parse an slf4j-style level name.
pub fn parse_log_level(value: &str) -> Result<LevelFilter> {
    match value.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok(LevelFilter::TRACE),
        "debug" => Ok(LevelFilter::DEBUG),
        "info" => Ok(LevelFilter::INFO),
        "warn" | "warning" => Ok(LevelFilter::WARN),
        "error" => Ok(LevelFilter::ERROR),
        "off" => Ok(LevelFilter::OFF),
        _ => Err(Error::InvalidLogLevel(value.to_string())),
    }
}

/// Expand a leading `~` to the user's home directory.
fn expand_home(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') || rest.starts_with('\\') => rest,
        _ => return PathBuf::from(path),
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest.trim_start_matches(['/', '\\'])),
        None => PathBuf::from(path),
    }
}

/// The working directory must exist, be a directory, and be writable.
///
/// Writability is tested by creating (and dropping) an anonymous temporary
/// file, so ownership, ACLs and read-only mounts are all honored.
fn validate_working_dir(path: PathBuf) -> Result<PathBuf> {
    let is_dir = fs::metadata(&path).is_ok_and(|m| m.is_dir());
    if !is_dir {
        return Err(Error::InvalidWorkingDir(absolute(&path)));
    }
    if let Err(e) = tempfile::tempfile_in(&path) {
        debug!(path = %path.display(), error = %e, "working_dir is not writable");
        return Err(Error::InvalidWorkingDir(absolute(&path)));
    }
    Ok(path)
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
