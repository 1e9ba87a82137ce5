// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Artifact store management.
//!
//! Relaunch keeps every installed revision of the application in one place
//! called the __artifact store__. Each entry in the store is an
//! __artifact directory__: the unpacked source tree of one revision, plus
//! the runtime environment prepared inside of it.
//!
//! # Artifact Store Layout
//!
//! The artifact store lives at `<app_root>/versions`. Each artifact
//! directory is named by its revision identifier verbatim, so
//! `<app_root>/versions/abc123` holds revision "abc123". Only the top-level
//! of the store is evaluated.
//!
//! # Immutability
//!
//! Artifact directories are created once, and never mutated or removed by
//! Relaunch afterwards. An artifact directory either exists in full at its
//! final key, or does not exist at all. To keep that true when a process
//! dies mid-install, archives are unpacked into a hidden staging directory
//! inside the store, and only then moved into the final key with a single
//! rename. Staging directories share the store's file system, so the
//! rename is atomic.
//!
//! Two launchers racing to install the same revision are harmless: both
//! produce equivalent trees, the first rename wins, and the loser keeps
//! the winner's directory.

pub mod archive;

use crate::revision::Revision;

use std::path::{Path, PathBuf};
use tempfile::Builder as TempBuilder;
use tracing::{debug, info, instrument};

/// Immutable installed copy of one revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDirectory(PathBuf);

impl ArtifactDirectory {
    /// Construct new artifact directory handle.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// Treat artifact directory as [`Path`] slice.
    pub fn as_path(&self) -> &Path {
        self.0.as_path()
    }

    /// Check if artifact directory is still on disk.
    pub fn is_present(&self) -> bool {
        self.0.is_dir()
    }
}

/// Content-addressed storage of installed revisions.
pub trait ArtifactStore {
    /// Check if revision has an artifact directory.
    fn exists(&self, revision: &Revision) -> bool;

    /// Locate artifact directory of revision, if installed.
    fn locate(&self, revision: &Revision) -> Option<ArtifactDirectory>;

    /// Install revision from archive bytes.
    ///
    /// Does nothing if revision is already installed.
    fn install(&self, revision: &Revision, archive: &[u8]) -> Result<ArtifactDirectory>;
}

/// Artifact store on the local file system.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    /// Open artifact store at target directory.
    ///
    /// Creates the store directory if it does not already exist. Relative
    /// paths are anchored to the current working directory, so artifact
    /// directories handed out by the store stay valid wherever they are used.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Io`] if store directory cannot be created.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let root = std::path::absolute(&path).map_err(|err| StoreError::Io {
            source: err,
            path: path.clone(),
        })?;
        mkdirp::mkdirp(&root).map_err(|err| StoreError::Io {
            source: err,
            path: root.clone(),
        })?;

        Ok(Self { root })
    }

    /// Path to artifact store.
    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    fn key_path(&self, revision: &Revision) -> PathBuf {
        self.root.join(revision.as_str())
    }

    /// Move unpacked tree into final key.
    ///
    /// Kept separate from unpacking so that the finalization step can be
    /// interrupted in isolation.
    fn finalize(&self, unpacked: &Path, revision: &Revision) -> Result<ArtifactDirectory> {
        let target = self.key_path(revision);
        match std::fs::rename(unpacked, &target) {
            Ok(()) => Ok(ArtifactDirectory::new(target)),
            // INVARIANT: Lost the race, another launcher already finalized this key.
            Err(_) if target.is_dir() => {
                debug!("revision {revision} finalized concurrently");
                Ok(ArtifactDirectory::new(target))
            }
            Err(err) => Err(StoreError::Io {
                source: err,
                path: target,
            }),
        }
    }
}

impl ArtifactStore for LocalArtifactStore {
    fn exists(&self, revision: &Revision) -> bool {
        self.key_path(revision).is_dir()
    }

    fn locate(&self, revision: &Revision) -> Option<ArtifactDirectory> {
        Some(ArtifactDirectory::new(self.key_path(revision))).filter(ArtifactDirectory::is_present)
    }

    #[instrument(skip(self, archive), level = "debug")]
    fn install(&self, revision: &Revision, archive: &[u8]) -> Result<ArtifactDirectory> {
        if let Some(artifact) = self.locate(revision) {
            debug!("revision {revision} already installed");
            return Ok(artifact);
        }

        info!("install revision {revision} into {:?}", self.root.display());
        let staging = TempBuilder::new()
            .prefix(".staging-")
            .tempdir_in(&self.root)
            .map_err(|err| StoreError::Io {
                source: err,
                path: self.root.clone(),
            })?;

        archive::extract(archive, staging.path())?;
        let unpacked = archive::top_level_dir(staging.path())?;

        // INVARIANT: Staging directory is removed on drop, whatever happens here.
        self.finalize(&unpacked, revision)
    }
}

/// All possible error types for artifact store interaction.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Archive does not wrap its contents in exactly one directory.
    #[error("unexpected archive layout: {reason}")]
    ArchiveLayout { reason: String },

    /// Archive data cannot be read.
    #[error(transparent)]
    Archive(#[from] zip::result::ZipError),

    /// File system operation failed.
    #[error("artifact store i/o failed at {:?}", path.display())]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = StoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::archive::tests::zip_of;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::fs::{read_dir, read_to_string, write};

    fn revision(id: &str) -> Revision {
        Revision::new(id).unwrap()
    }

    #[sealed_test]
    fn relative_root_hands_out_absolute_artifacts() -> anyhow::Result<()> {
        let store = LocalArtifactStore::open("App/versions")?;
        assert!(store.root().is_absolute());
        assert_eq!(store.root(), std::env::current_dir()?.join("App/versions"));

        let archive = zip_of(&[("owner-repo-abc123/pyproject.toml", "[project]\n")]);
        let artifact = store.install(&revision("abc123"), &archive)?;
        assert!(artifact.as_path().is_absolute());
        assert!(artifact.as_path().join("pyproject.toml").is_file());

        Ok(())
    }

    fn store_entries(store: &LocalArtifactStore) -> Vec<String> {
        let mut names = read_dir(store.root())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        names.sort();
        names
    }

    #[test]
    fn install_unpacks_into_revision_key() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let store = LocalArtifactStore::open(root.path().join("versions"))?;
        let rev = revision("abc123");
        assert!(!store.exists(&rev));

        let bytes = zip_of(&[
            ("blah-foo-abc123/pyproject.toml", "[project]\n"),
            ("blah-foo-abc123/src/foo/app.py", "print('hi')\n"),
        ]);
        let artifact = store.install(&rev, &bytes)?;

        assert_eq!(artifact.as_path(), store.root().join("abc123"));
        assert!(store.exists(&rev));
        assert_eq!(read_to_string(artifact.as_path().join("src/foo/app.py"))?, "print('hi')\n");
        assert_eq!(store_entries(&store), vec!["abc123".to_string()]);

        Ok(())
    }

    #[test]
    fn install_is_idempotent() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let store = LocalArtifactStore::open(root.path())?;
        let rev = revision("abc123");

        let first = store.install(&rev, &zip_of(&[("top/file.txt", "one")]))?;
        write(first.as_path().join("marker"), "kept")?;

        // Garbage bytes prove the second call never touches the archive.
        let second = store.install(&rev, b"not a zip archive")?;
        assert_eq!(first, second);
        assert_eq!(read_to_string(second.as_path().join("marker"))?, "kept");
        assert_eq!(read_to_string(second.as_path().join("file.txt"))?, "one");

        Ok(())
    }

    #[test]
    fn failed_install_leaves_no_entry() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let store = LocalArtifactStore::open(root.path())?;
        let rev = revision("abc123");

        let result = store.install(&rev, &zip_of(&[("one/a", "a"), ("two/b", "b")]));
        assert!(matches!(result, Err(StoreError::ArchiveLayout { .. })));
        assert!(!store.exists(&rev));
        assert!(store_entries(&store).is_empty());

        let result = store.install(&rev, b"truncated");
        assert!(matches!(result, Err(StoreError::Archive(_))));
        assert!(store_entries(&store).is_empty());

        Ok(())
    }

    #[test]
    fn interrupted_finalization_is_invisible() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let store = LocalArtifactStore::open(root.path().join("versions"))?;
        let rev = revision("abc123");

        // Unpacked tree that vanished before the rename could happen.
        let missing = root.path().join("never-unpacked");
        assert!(store.finalize(&missing, &rev).is_err());
        assert!(!store.exists(&rev));
        assert_eq!(store.locate(&rev), None);

        Ok(())
    }

    #[test]
    fn finalize_tolerates_concurrent_winner() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let store = LocalArtifactStore::open(root.path().join("versions"))?;
        let rev = revision("abc123");

        std::fs::create_dir_all(store.root().join("abc123"))?;
        write(store.root().join("abc123").join("winner"), "first")?;

        let loser = root.path().join("loser");
        std::fs::create_dir_all(&loser)?;
        write(loser.join("winner"), "second")?;

        let artifact = store.finalize(&loser, &rev)?;
        assert_eq!(read_to_string(artifact.as_path().join("winner"))?, "first");

        Ok(())
    }
}
