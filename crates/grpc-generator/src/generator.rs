// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Generation orchestration
//!
//! Runs the Java and/or Python invocation for a routed argument set and
//! reports the exit code the process should end with.

use tracing::{debug, info, warn};

use crate::args::Routed;
use crate::error::Result;
use crate::invocation::{Executor, Invocation, Mode, java_invocation, python_invocation};
use crate::resources::Resources;
use crate::stager::Stager;

/// Drives staging, command assembly and execution.
#[derive(Debug)]
pub struct Generator<R, E> {
    stager: Stager<R>,
    executor: E,
}

impl<R: Resources, E: Executor> Generator<R, E> {
    /// Generator staging through `stager` and running through `executor`.
    pub fn new(stager: Stager<R>, executor: E) -> Self {
        Self { stager, executor }
    }

    /// The executor in use.
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Run every enabled mode.
    ///
    /// Java runs first; a non-zero Java exit code is returned immediately and
    /// Python is skipped. Otherwise the last run's exit code is returned.
    pub fn run(&self, routed: &Routed) -> Result<i32> {
        let config = &routed.config;

        if config.java.is_none() && config.python.is_none() {
            warn!("Neither --java_out nor --python_out was given, nothing to generate");
            return Ok(0);
        }

        let mut exit_code = 0;

        if let Some(java) = &config.java {
            let invocation = java_invocation(&self.stager, config, java, &routed.java_args)?;
            exit_code = self.execute(Mode::Java, &invocation)?;
            if exit_code != 0 {
                return Ok(exit_code);
            }
        }

        if let Some(python) = &config.python {
            let invocation = python_invocation(&self.stager, config, python, &routed.python_args)?;
            exit_code = self.execute(Mode::Python, &invocation)?;
        }

        Ok(exit_code)
    }

    fn execute(&self, mode: Mode, invocation: &Invocation) -> Result<i32> {
        info!(
            mode = %mode,
            program = %invocation.program().display(),
            working_dir = ?invocation.working_dir(),
            "Running code generation"
        );
        debug!(
            mode = %mode,
            command = ?invocation.command_line(),
            "Invocation"
        );

        let start = std::time::Instant::now();
        let exit_code = self.executor.execute(invocation)?;

        if exit_code != 0 {
            debug!(
                mode = %mode,
                exit_code,
                "ERROR running {} generation",
                mode
            );
        } else {
            info!(
                mode = %mode,
                duration_ms = start.elapsed().as_millis() as u64,
                "Code generation completed"
            );
        }
        Ok(exit_code)
    }
}
