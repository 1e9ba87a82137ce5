// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Runtime environment preparation.
//!
//! Every artifact directory gets its own isolated __runtime environment__,
//! a Python virtual environment at `<artifact>/.venv` with the project's
//! declared dependencies installed into it. The environment is addressed
//! through its __interpreter__, `.venv/bin/python` (or
//! `.venv\Scripts\python.exe` on Windows). If the interpreter exists, the
//! environment exists.

use crate::store::ArtifactDirectory;

use std::{
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
    process::Command,
};
use tracing::{debug, info, instrument};

/// Relative path of runtime environment inside an artifact directory.
pub const ENVIRONMENT_DIR: &str = ".venv";

/// Handle to the entry point of a runtime environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpreter(PathBuf);

impl Interpreter {
    /// Locate interpreter of artifact directory's runtime environment.
    ///
    /// Does not check if the interpreter actually exists.
    pub fn of(artifact: &ArtifactDirectory) -> Self {
        let venv = artifact.as_path().join(ENVIRONMENT_DIR);
        if cfg!(windows) {
            Self(venv.join("Scripts").join("python.exe"))
        } else {
            Self(venv.join("bin").join("python"))
        }
    }

    /// Construct interpreter handle from raw path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// Treat interpreter as [`Path`] slice.
    pub fn as_path(&self) -> &Path {
        self.0.as_path()
    }
}

/// How much work to redo when an environment already exists.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Preparation {
    /// Use existing environment as is.
    #[default]
    Reuse,

    /// Reinstall the project's dependencies into existing environment.
    Refresh,
}

/// Runtime environment preparation.
pub trait Environment {
    /// Ensure artifact directory has a usable runtime environment.
    ///
    /// A missing environment is created, and has the project's dependencies
    /// installed into it, in that order.
    fn ensure(&self, artifact: &ArtifactDirectory, preparation: Preparation)
        -> Result<Interpreter>;
}

/// Python virtual environment created by a base interpreter.
#[derive(Debug, Clone)]
pub struct VirtualEnv {
    python: OsString,
}

impl VirtualEnv {
    /// Construct new virtual environment preparer.
    pub fn new(python: impl Into<OsString>) -> Self {
        Self {
            python: python.into(),
        }
    }

    fn create(&self, artifact: &ArtifactDirectory, interpreter: &Interpreter) -> Result<()> {
        info!("create runtime environment in {:?}", artifact.as_path().display());
        // INVARIANT: Commands run inside the artifact, so the venv path stays relative to it.
        syscall_interactive(
            &self.python,
            ["-m", "venv", ENVIRONMENT_DIR],
            artifact.as_path(),
        )?;
        syscall_interactive(
            interpreter.as_path(),
            ["-m", "pip", "install", "--upgrade", "pip", "setuptools", "wheel"],
            artifact.as_path(),
        )
    }

    fn install_project(&self, artifact: &ArtifactDirectory, interpreter: &Interpreter) -> Result<()> {
        info!("install project dependencies of {:?}", artifact.as_path().display());
        syscall_interactive(
            interpreter.as_path(),
            ["-m", "pip", "install", "."],
            artifact.as_path(),
        )
    }
}

impl Environment for VirtualEnv {
    #[instrument(skip(self), level = "debug")]
    fn ensure(
        &self,
        artifact: &ArtifactDirectory,
        preparation: Preparation,
    ) -> Result<Interpreter> {
        let artifact = &anchored(artifact)?;
        let interpreter = Interpreter::of(artifact);
        if interpreter.as_path().exists() {
            if preparation == Preparation::Reuse {
                debug!("reuse runtime environment at {:?}", interpreter.as_path().display());
                return Ok(interpreter);
            }
        } else {
            self.create(artifact, &interpreter)?;
        }

        self.install_project(artifact, &interpreter)?;

        Ok(interpreter)
    }
}

/// Anchor artifact directory to the current working directory.
///
/// Commands run with the artifact as their working directory, so a relative
/// interpreter path would otherwise be resolved twice.
fn anchored(artifact: &ArtifactDirectory) -> Result<ArtifactDirectory> {
    std::path::absolute(artifact.as_path())
        .map(ArtifactDirectory::new)
        .map_err(|err| EnvironmentError::Io {
            source: err,
            path: artifact.as_path().into(),
        })
}

fn syscall_interactive(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
    cwd: &Path,
) -> Result<()> {
    let status = Command::new(cmd.as_ref())
        .args(args)
        .current_dir(cwd)
        .status()
        .map_err(|err| EnvironmentError::Spawn {
            source: err,
            program: cmd.as_ref().to_os_string(),
        })?;

    if !status.success() {
        return Err(EnvironmentError::Failed {
            program: cmd.as_ref().to_os_string(),
            status: status.code(),
        });
    }

    Ok(())
}

/// All possible error types for runtime environment preparation.
#[derive(Debug, thiserror::Error)]
pub enum EnvironmentError {
    /// Artifact directory path cannot be resolved.
    #[error("failed to resolve artifact directory {path:?}")]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Command could not be started at all.
    #[error("failed to run {program:?} while preparing runtime environment")]
    Spawn {
        #[source]
        source: std::io::Error,
        program: OsString,
    },

    /// Command ran, but reported failure.
    #[error("command {program:?} failed while preparing runtime environment (exit status {status:?})")]
    Failed {
        program: OsString,
        status: Option<i32>,
    },
}

/// Friendly result alias :3
pub type Result<T, E = EnvironmentError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::fs::{create_dir_all, write};

    // Any attempt to run this fails, so success proves nothing was spawned.
    const NO_PYTHON: &str = "/nonexistent/relaunch-test/python";

    #[test]
    fn interpreter_lives_in_environment_dir() {
        let artifact = ArtifactDirectory::new("/app/versions/abc123");
        let interpreter = Interpreter::of(&artifact);
        assert!(interpreter
            .as_path()
            .starts_with("/app/versions/abc123/.venv"));
    }

    #[test]
    fn reuse_existing_environment_without_side_effects() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let artifact = ArtifactDirectory::new(root.path());
        let interpreter = Interpreter::of(&artifact);
        create_dir_all(interpreter.as_path().parent().unwrap())?;
        write(interpreter.as_path(), "")?;

        let result = VirtualEnv::new(NO_PYTHON).ensure(&artifact, Preparation::Reuse)?;
        assert_eq!(result, interpreter);

        Ok(())
    }

    #[test]
    fn missing_base_interpreter_fails_setup() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let artifact = ArtifactDirectory::new(root.path());

        let result = VirtualEnv::new(NO_PYTHON).ensure(&artifact, Preparation::Reuse);
        assert!(matches!(result, Err(EnvironmentError::Spawn { .. })));
        assert!(!Interpreter::of(&artifact).as_path().exists());

        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn refresh_reinstalls_into_existing_environment() -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let root = tempfile::tempdir()?;
        let artifact = ArtifactDirectory::new(root.path());
        let interpreter = Interpreter::of(&artifact);
        create_dir_all(interpreter.as_path().parent().unwrap())?;

        // Fake interpreter that records its arguments.
        let log = root.path().join("calls.log");
        write(
            interpreter.as_path(),
            format!("#!/bin/sh\necho \"$@\" >> {:?}\n", log.display().to_string()),
        )?;
        std::fs::set_permissions(interpreter.as_path(), std::fs::Permissions::from_mode(0o755))?;

        VirtualEnv::new(NO_PYTHON).ensure(&artifact, Preparation::Refresh)?;
        assert_eq!(std::fs::read_to_string(&log)?, "-m pip install .\n");

        Ok(())
    }

    #[cfg(unix)]
    #[sealed_test]
    fn relative_artifact_gets_environment_in_place() -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        // Fake base interpreter: `-m venv <dir>` plants a no-op interpreter in <dir>.
        let python = std::env::current_dir()?.join("python3");
        write(
            &python,
            indoc! {r#"
                #!/bin/sh
                mkdir -p "$3/bin"
                printf '#!/bin/sh\nexit 0\n' > "$3/bin/python"
                chmod +x "$3/bin/python"
            "#},
        )?;
        std::fs::set_permissions(&python, std::fs::Permissions::from_mode(0o755))?;
        create_dir_all("versions/abc123")?;

        let artifact = ArtifactDirectory::new("versions/abc123");
        let interpreter = VirtualEnv::new(&python).ensure(&artifact, Preparation::Reuse)?;

        assert!(interpreter.as_path().is_absolute());
        assert!(interpreter.as_path().is_file());
        assert!(interpreter
            .as_path()
            .ends_with("versions/abc123/.venv/bin/python"));
        assert!(!std::path::Path::new("versions/abc123/versions").exists());

        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn failing_dependency_install_is_setup_error() -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let root = tempfile::tempdir()?;
        let artifact = ArtifactDirectory::new(root.path());
        let interpreter = Interpreter::of(&artifact);
        create_dir_all(interpreter.as_path().parent().unwrap())?;
        write(interpreter.as_path(), "#!/bin/sh\nexit 3\n")?;
        std::fs::set_permissions(interpreter.as_path(), std::fs::Permissions::from_mode(0o755))?;

        let result = VirtualEnv::new(NO_PYTHON).ensure(&artifact, Preparation::Refresh);
        assert!(matches!(
            result,
            Err(EnvironmentError::Failed { status: Some(3), .. })
        ));

        Ok(())
    }
}
