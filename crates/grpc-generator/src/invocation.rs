// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Child process command lines and their execution.

use std::collections::VecDeque;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::Mutex;

use crate::args::{GeneratorConfig, JavaOutputs, PythonOptions, RxVariant};
use crate::error::{Error, Result};
use crate::resources::Resources;
use crate::stager::Stager;
use crate::targets::{GRPC_JAVA, GRPC_OSGI_GENERATOR, GRPC_PROTOC_SCRIPT, PROTOC};

/// Output id of the grpc-java plugin.
const GRPC_JAVA_ID: &str = "grpc-java";
/// Output id of the OSGi generator plugin.
const GRPC_OSGI_ID: &str = "grpc-osgi-generator";

/// The two independent generation paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// protoc with the Java plugins.
    Java,
    /// Python interpreter with the `grpc_tools` helper script.
    Python,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Java => write!(f, "java"),
            Mode::Python => write!(f, "python"),
        }
    }
}

/// A fully assembled child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: PathBuf,
    args: Vec<OsString>,
    working_dir: Option<PathBuf>,
}

impl Invocation {
    /// Invocation of `program` with no arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    /// Run the child in `dir` instead of the caller's working directory.
    pub fn current_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.working_dir = dir;
        self
    }

    /// Append one argument.
    pub fn arg(&mut self, arg: impl AsRef<OsStr>) -> &mut Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Append arguments verbatim.
    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self.arg(arg);
        }
        self
    }

    /// Append `--plugin=<name>=<path>` followed by `--<out_id>_out=<dir>`.
    pub fn plugin(&mut self, name: &str, path: &Path, out_id: &str, out_dir: &str) -> &mut Self {
        let mut plugin = OsString::from(format!("--plugin={name}="));
        plugin.push(path.as_os_str());
        self.arg(plugin);
        self.arg(format!("--{out_id}_out={out_dir}"))
    }

    /// Program to execute.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments after the program.
    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    /// Working directory, if overridden.
    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    /// Program and arguments as (lossy) strings.
    pub fn command_line(&self) -> Vec<String> {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(|s| s.to_string_lossy().into_owned())
            .collect()
    }

    /// A std `Command` with inherited stdio.
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

/// Build the protoc command line for Java mode.
///
/// Stages protoc and every enabled plugin. Plugin entries come first, each
/// followed by its output directive, then the pass-through arguments.
pub fn java_invocation<R: Resources>(
    stager: &Stager<R>,
    config: &GeneratorConfig,
    java: &JavaOutputs,
    passthrough: &[String],
) -> Result<Invocation> {
    let protoc = absolute(&stager.stage(PROTOC)?);
    let mut invocation = Invocation::new(protoc).current_dir(config.working_dir.clone());

    if config.grpc {
        let grpc_java = absolute(&stager.stage(GRPC_JAVA)?);
        invocation.plugin(GRPC_JAVA, &grpc_java, GRPC_JAVA_ID, &java.grpc_java_out);

        let rx_target = config.rx_variant.target();
        let rx = absolute(&stager.stage(rx_target)?);
        invocation.plugin(rx_target, &rx, config.rx_variant.out_id(), &java.rx_out);
    }

    if config.osgi {
        let osgi = absolute(&stager.stage(GRPC_OSGI_GENERATOR)?);
        let mut plugin = OsString::from(format!("--plugin={GRPC_OSGI_GENERATOR}="));
        plugin.push(osgi.as_os_str());
        invocation.arg(plugin);
        if config.rx_variant == RxVariant::RxJava3 {
            invocation.arg(format!("--{GRPC_OSGI_ID}_opt=rxjava3"));
        }
        invocation.arg(format!("--{GRPC_OSGI_ID}_out={}", java.osgi_out));
    }

    invocation.args(passthrough);
    Ok(invocation)
}

/// Build the Python interpreter command line for Python mode.
///
/// Only the helper script is staged, and only when no explicit path was
/// given.
pub fn python_invocation<R: Resources>(
    stager: &Stager<R>,
    config: &GeneratorConfig,
    python: &PythonOptions,
    passthrough: &[String],
) -> Result<Invocation> {
    let script = match &python.grpc_protoc_main {
        Some(path) => path.clone(),
        None => absolute(&stager.stage_file(GRPC_PROTOC_SCRIPT)?),
    };

    let mut invocation =
        Invocation::new(&python.python_exe).current_dir(config.working_dir.clone());
    invocation.arg(&script).args(passthrough);
    Ok(invocation)
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Runs invocations to completion.
pub trait Executor {
    /// Execute synchronously and return the child's exit code.
    fn execute(&self, invocation: &Invocation) -> Result<i32>;
}

impl<E: Executor + ?Sized> Executor for &E {
    fn execute(&self, invocation: &Invocation) -> Result<i32> {
        (**self).execute(invocation)
    }
}

/// Executes invocations as real child processes with inherited stdio.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    fn execute(&self, invocation: &Invocation) -> Result<i32> {
        let status = invocation
            .to_command()
            .status()
            .map_err(|source| Error::Spawn {
                program: invocation.program().display().to_string(),
                source,
            })?;
        Ok(exit_code(status))
    }
}

/// Signal deaths map to `128 + signal`, as shells report them.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

/// Executor for testing.
///
/// Records every invocation instead of running it and answers with queued
/// exit codes (0 once the queue is empty).
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    invocations: Mutex<Vec<Invocation>>,
    exit_codes: Mutex<VecDeque<i32>>,
}

impl RecordingExecutor {
    /// Executor where every run succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Executor answering with `codes` in order.
    pub fn with_exit_codes(codes: impl IntoIterator<Item = i32>) -> Self {
        Self {
            invocations: Mutex::new(Vec::new()),
            exit_codes: Mutex::new(codes.into_iter().collect()),
        }
    }

    /// Invocations executed so far.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl Executor for RecordingExecutor {
    fn execute(&self, invocation: &Invocation) -> Result<i32> {
        if let Ok(mut recorded) = self.invocations.lock() {
            recorded.push(invocation.clone());
        }
        let code = self
            .exit_codes
            .lock()
            .ok()
            .and_then(|mut codes| codes.pop_front())
            .unwrap_or(0);
        Ok(code)
    }
}
