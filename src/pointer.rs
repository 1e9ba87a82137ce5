// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Current version pointer.
//!
//! The __current version pointer__ records which installed revision the
//! launcher should run by default. It is a single JSON record at
//! `<app_root>/current.json`:
//!
//! ```json
//! {
//!   "sha": "abc123",
//!   "path": "/home/blah/Documents/Spectra Processing/App/versions/abc123"
//! }
//! ```
//!
//! Absence of the record is a meaningful state: nothing has been installed
//! yet. The record is only ever written after an install fully succeeded,
//! and each write replaces the previous record as a whole.

use crate::revision::Revision;

use serde::{Deserialize, Serialize};
use std::{
    fs::read_to_string,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::{debug, instrument};

/// Revision the launcher runs by default.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CurrentVersion {
    /// Revision that was installed.
    #[serde(rename = "sha")]
    pub revision: Revision,

    /// Artifact directory of that revision.
    pub path: PathBuf,
}

impl CurrentVersion {
    /// Construct new current version record.
    pub fn new(revision: Revision, path: impl Into<PathBuf>) -> Self {
        Self {
            revision,
            path: path.into(),
        }
    }
}

/// Persistent storage of the current version pointer.
pub trait PointerStore {
    /// Read current version, if one was ever recorded.
    fn read(&self) -> Result<Option<CurrentVersion>>;

    /// Replace current version.
    fn write(&self, current: &CurrentVersion) -> Result<()>;
}

/// Current version pointer as JSON file.
#[derive(Debug, Clone)]
pub struct JsonPointerStore {
    path: PathBuf,
}

impl JsonPointerStore {
    /// Construct new pointer store at target file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path to pointer file.
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    fn io_error(&self, source: std::io::Error) -> PointerError {
        PointerError::Io {
            source,
            path: self.path.clone(),
        }
    }
}

impl PointerStore for JsonPointerStore {
    #[instrument(skip(self), level = "debug")]
    fn read(&self) -> Result<Option<CurrentVersion>> {
        let data = match read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("no current version at {:?}", self.path.display());
                return Ok(None);
            }
            Err(err) => return Err(self.io_error(err)),
        };

        serde_json::from_str(&data)
            .map(Some)
            .map_err(|err| PointerError::Corrupt {
                source: err,
                path: self.path.clone(),
            })
    }

    #[instrument(skip(self), level = "debug")]
    fn write(&self, current: &CurrentVersion) -> Result<()> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        mkdirp::mkdirp(parent).map_err(|err| self.io_error(err))?;

        // INVARIANT: Readers observe either the old record or the new one, never a mix.
        let mut file = NamedTempFile::new_in(parent).map_err(|err| self.io_error(err))?;
        let data = serde_json::to_string_pretty(current).map_err(PointerError::Serialize)?;
        file.write_all(data.as_bytes())
            .and_then(|()| file.as_file().sync_all())
            .map_err(|err| self.io_error(err))?;
        file.persist(&self.path)
            .map_err(|err| self.io_error(err.error))?;
        debug!("current version is now {}", current.revision);

        Ok(())
    }
}

/// All possible error types for current version pointer interaction.
#[derive(Debug, thiserror::Error)]
pub enum PointerError {
    /// Record exists, but cannot be parsed.
    #[error("current version record at {:?} is corrupt", path.display())]
    Corrupt {
        #[source]
        source: serde_json::Error,
        path: PathBuf,
    },

    /// Record cannot be serialized.
    #[error(transparent)]
    Serialize(serde_json::Error),

    /// Record cannot be read or written.
    #[error("current version i/o failed at {:?}", path.display())]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = PointerError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use std::fs::write;

    fn current(id: &str) -> CurrentVersion {
        CurrentVersion::new(Revision::new(id).unwrap(), format!("/app/versions/{id}"))
    }

    #[test]
    fn read_before_write_is_absent() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let pointer = JsonPointerStore::new(root.path().join("current.json"));
        assert_eq!(pointer.read()?, None);

        Ok(())
    }

    #[test]
    fn write_replaces_previous_record() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let pointer = JsonPointerStore::new(root.path().join("App").join("current.json"));

        pointer.write(&current("abc123"))?;
        assert_eq!(pointer.read()?, Some(current("abc123")));

        pointer.write(&current("def456"))?;
        assert_eq!(pointer.read()?, Some(current("def456")));

        Ok(())
    }

    #[test]
    fn read_legacy_record() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let pointer = JsonPointerStore::new(root.path().join("current.json"));
        write(
            pointer.path(),
            indoc! {r#"
                {
                  "sha": "abc123",
                  "path": "/app/versions/abc123"
                }
            "#},
        )?;
        assert_eq!(pointer.read()?, Some(current("abc123")));

        Ok(())
    }

    #[test]
    fn read_truncated_record_is_corrupt() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let pointer = JsonPointerStore::new(root.path().join("current.json"));
        write(pointer.path(), r#"{"sha": "abc1"#)?;
        assert!(matches!(pointer.read(), Err(PointerError::Corrupt { .. })));

        write(pointer.path(), r#"{"sha": "../../etc", "path": "/etc"}"#)?;
        assert!(matches!(pointer.read(), Err(PointerError::Corrupt { .. })));

        Ok(())
    }
}
