// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Install orchestration.
//!
//! The orchestrator decides whether the latest revision needs to be
//! installed, drives the install pipeline when it does, and finally hands
//! the chosen runtime environment over to the launcher.
//!
//! # Install Pipeline
//!
//! 1. Ask the revision provider for the default branch, then for the
//!    latest revision on it.
//! 2. Install that revision into the artifact store, fetching its archive
//!    only if the store does not already have it.
//! 3. Prepare the runtime environment of the artifact directory.
//! 4. Seed user data files, best effort.
//! 5. Point the current version pointer at the new artifact directory.
//!
//! The pointer moves strictly last. Any failure before that leaves the
//! previous pointer untouched, so the last working install stays
//! launchable, and the next invocation gets another shot at the update.
//!
//! # Skipping Updates
//!
//! With updates skipped, the provider is never contacted. The current
//! version pointer must name an artifact directory that is still on disk,
//! otherwise there is nothing to run.

use crate::{
    environment::{Environment, EnvironmentError, Interpreter, Preparation},
    launch::{Launcher, SpawnError},
    pointer::{CurrentVersion, PointerError, PointerStore},
    revision::{ProviderError, Revision, RevisionProvider},
    seed::DataSeeder,
    store::{ArtifactDirectory, ArtifactStore, StoreError},
};

use tracing::{debug, info, instrument, warn};

/// Decide if latest revision must be installed.
///
/// `installed` is the revision of the current version pointer, and must
/// only be given if its artifact directory is still on disk.
pub fn needs_install(installed: Option<&Revision>, latest: &Revision, force: bool) -> bool {
    match installed {
        _ if force => true,
        Some(installed) => installed != latest,
        None => true,
    }
}

/// Drives revision resolution, installation, and launch.
#[derive(Debug)]
pub struct Orchestrator<P, A, C, E, L>
where
    P: RevisionProvider,
    A: ArtifactStore,
    C: PointerStore,
    E: Environment,
    L: Launcher,
{
    provider: P,
    store: A,
    pointer: C,
    environment: E,
    launcher: L,
    seeder: DataSeeder,
}

impl<P, A, C, E, L> Orchestrator<P, A, C, E, L>
where
    P: RevisionProvider,
    A: ArtifactStore,
    C: PointerStore,
    E: Environment,
    L: Launcher,
{
    /// Construct new orchestrator.
    pub fn new(provider: P, store: A, pointer: C, environment: E, launcher: L) -> Self {
        Self {
            provider,
            store,
            pointer,
            environment,
            launcher,
            seeder: DataSeeder::default(),
        }
    }

    /// Seed user data files after each install.
    pub fn with_seeder(mut self, seeder: DataSeeder) -> Self {
        self.seeder = seeder;
        self
    }

    /// Resolve revision to run, and run it.
    ///
    /// Returns the exit code of the application.
    ///
    /// # Errors
    ///
    /// - Return [`LaunchError::NoInstallFound`] if updates are skipped, and
    ///   nothing usable is installed.
    /// - Return [`LaunchError::Provider`] if latest revision cannot be
    ///   resolved or fetched.
    /// - Return [`LaunchError::Store`] if archive cannot be installed.
    /// - Return [`LaunchError::Environment`] if runtime environment cannot
    ///   be prepared.
    /// - Return [`LaunchError::Pointer`] if current version cannot be
    ///   recorded.
    /// - Return [`LaunchError::Spawn`] if application cannot be started.
    pub fn resolve_and_run(&self, skip_update: bool, force: bool) -> Result<i32> {
        let interpreter = self.resolve(skip_update, force)?;
        Ok(self.launcher.run(&interpreter)?)
    }

    /// Resolve runtime environment to run, installing the latest revision
    /// if needed.
    ///
    /// # Errors
    ///
    /// Same as [`Orchestrator::resolve_and_run`], minus launching.
    #[instrument(skip(self), level = "debug")]
    pub fn resolve(&self, skip_update: bool, force: bool) -> Result<Interpreter> {
        let installed = self.read_current()?.filter(|current| {
            let present = current.path.is_dir();
            if !present {
                warn!(
                    "artifact of current revision {} is missing at {:?}",
                    current.revision,
                    current.path.display()
                );
            }
            present
        });

        // INVARIANT: Skipping the update check wins over forcing a reinstall.
        if skip_update {
            let current = installed.ok_or(LaunchError::NoInstallFound)?;
            info!("run installed revision {} without update check", current.revision);
            return self.reuse(&current);
        }

        let branch = self.provider.default_branch()?;
        let latest = self.provider.latest_revision(&branch)?;

        match installed {
            Some(current) if !needs_install(Some(&current.revision), &latest, force) => {
                info!("already up-to-date at revision {latest}");
                self.reuse(&current)
            }
            _ => {
                info!("install latest revision {latest} from branch {branch:?}");
                self.install(&latest)
            }
        }
    }

    fn read_current(&self) -> Result<Option<CurrentVersion>> {
        match self.pointer.read() {
            Ok(current) => Ok(current),
            Err(err @ PointerError::Corrupt { .. }) => {
                warn!("{err}, treating as fresh install");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn reuse(&self, current: &CurrentVersion) -> Result<Interpreter> {
        let artifact = ArtifactDirectory::new(&current.path);
        Ok(self.environment.ensure(&artifact, Preparation::Reuse)?)
    }

    fn install(&self, latest: &Revision) -> Result<Interpreter> {
        let artifact = match self.store.locate(latest) {
            Some(artifact) => {
                debug!("revision {latest} already in artifact store, skip download");
                artifact
            }
            None => {
                let archive = self.provider.fetch_archive(latest)?;
                self.store.install(latest, &archive)?
            }
        };

        let interpreter = self.environment.ensure(&artifact, Preparation::Refresh)?;
        self.seeder.seed(&artifact);

        // INVARIANT: Pointer only moves after install and environment preparation succeed.
        self.pointer
            .write(&CurrentVersion::new(latest.clone(), artifact.as_path()))?;

        Ok(interpreter)
    }
}

/// All possible error types for install orchestration.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    /// Updates skipped, but nothing usable is installed.
    #[error("no installed version found, run without --no-update to install the latest revision")]
    NoInstallFound,

    /// Revision provider interaction fails.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Artifact store interaction fails.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Runtime environment preparation fails.
    #[error(transparent)]
    Environment(#[from] EnvironmentError),

    /// Current version pointer interaction fails.
    #[error(transparent)]
    Pointer(#[from] PointerError),

    /// Application cannot be started.
    #[error(transparent)]
    Spawn(#[from] SpawnError),
}

/// Friendly result alias :3
pub type Result<T, E = LaunchError> = std::result::Result<T, E>;
