// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Application launching.
//!
//! The launched application's exit status is the result of a launch, not
//! an error of it. Only failing to start the application at all counts as
//! a launch error.

use crate::environment::Interpreter;

use std::{ffi::OsString, process::Command};
use tracing::{debug, info, instrument};

/// Runs the application inside a runtime environment.
pub trait Launcher {
    /// Run application to completion, and return its exit code.
    fn run(&self, interpreter: &Interpreter) -> Result<i32>;
}

/// Launch application as a child process with inherited stdio.
#[derive(Debug, Clone, Default)]
pub struct ProcessLauncher {
    args: Vec<OsString>,
    passthrough: Vec<OsString>,
}

impl ProcessLauncher {
    /// Construct new launcher with arguments handed to the interpreter.
    pub fn new(args: impl IntoIterator<Item = impl Into<OsString>>) -> Self {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            passthrough: Vec::new(),
        }
    }

    /// Append extra arguments meant for the application itself.
    pub fn with_passthrough(mut self, args: impl IntoIterator<Item = impl Into<OsString>>) -> Self {
        self.passthrough.extend(args.into_iter().map(Into::into));
        self
    }
}

impl Launcher for ProcessLauncher {
    #[instrument(skip(self), level = "debug")]
    fn run(&self, interpreter: &Interpreter) -> Result<i32> {
        info!("launch application with {:?}", interpreter.as_path().display());
        let mut command = Command::new(interpreter.as_path());
        command.args(&self.args).args(&self.passthrough);

        let status = command.status().map_err(|err| SpawnError {
            source: err,
            program: interpreter.as_path().as_os_str().to_os_string(),
        })?;
        debug!("application exited with {status}");

        Ok(exit_code(status))
    }
}

#[cfg(unix)]
fn exit_code(status: std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(1)
}

#[cfg(not(unix))]
fn exit_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}

/// Application could not be started.
#[derive(Debug, thiserror::Error)]
#[error("failed to launch application with {program:?}")]
pub struct SpawnError {
    #[source]
    source: std::io::Error,
    program: OsString,
}

/// Friendly result alias :3
pub type Result<T, E = SpawnError> = std::result::Result<T, E>;

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn forward_exit_code_unmodified() -> anyhow::Result<()> {
        let launcher = ProcessLauncher::new(["-c", "exit 7"]);
        assert_eq!(launcher.run(&Interpreter::new("/bin/sh"))?, 7);

        Ok(())
    }

    #[test]
    fn passthrough_arguments_follow_configured_ones() -> anyhow::Result<()> {
        let launcher = ProcessLauncher::new(["-c", "exit $1", "sh"]).with_passthrough(["42"]);
        assert_eq!(launcher.run(&Interpreter::new("/bin/sh"))?, 42);

        Ok(())
    }

    #[test]
    fn signal_maps_to_shell_convention() -> anyhow::Result<()> {
        let launcher = ProcessLauncher::new(["-c", "kill -TERM $$"]);
        assert_eq!(launcher.run(&Interpreter::new("/bin/sh"))?, 128 + 15);

        Ok(())
    }

    #[test]
    fn missing_interpreter_is_launch_error() {
        let launcher = ProcessLauncher::default();
        let result = launcher.run(&Interpreter::new("/nonexistent/relaunch-test/python"));
        assert!(result.is_err());
    }
}
