// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Best-effort seeding of user data files.
//!
//! Some applications ship default data files that users are expected to
//! edit. After an install, such files are copied out of the artifact
//! directory into a user-accessible location, unless the user already has
//! a copy there. Seeding never fails an install. Misses and errors are
//! reported as warnings.

use crate::{config::SeedSettings, store::ArtifactDirectory};

use std::{
    fs::copy,
    path::{Path, PathBuf},
};
use tracing::{info, warn};

/// Result of seeding one data file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedOutcome {
    /// User already has the file.
    Present(PathBuf),

    /// File was copied from the artifact directory.
    Seeded(PathBuf),

    /// No candidate exists in the artifact directory.
    Missing(PathBuf),

    /// Copy was attempted, but failed.
    Failed(PathBuf),
}

/// Seeds user data files from artifact directories.
#[derive(Debug, Clone, Default)]
pub struct DataSeeder {
    seeds: Vec<SeedSettings>,
}

impl DataSeeder {
    /// Construct new data seeder.
    pub fn new(seeds: impl IntoIterator<Item = SeedSettings>) -> Self {
        Self {
            seeds: seeds.into_iter().collect(),
        }
    }

    /// Seed every configured data file from target artifact directory.
    pub fn seed(&self, artifact: &ArtifactDirectory) -> Vec<SeedOutcome> {
        self.seeds
            .iter()
            .map(|seed| seed_one(seed, artifact.as_path()))
            .collect()
    }
}

fn seed_one(seed: &SeedSettings, artifact: &Path) -> SeedOutcome {
    let dest = seed.dest.clone();
    if dest.exists() {
        return SeedOutcome::Present(dest);
    }

    let Some(source) = seed
        .candidates
        .iter()
        .map(|candidate| artifact.join(candidate))
        .find(|candidate| candidate.is_file())
    else {
        warn!("could not find a data file to seed {:?}", dest.display());
        return SeedOutcome::Missing(dest);
    };

    let copied = match dest.parent() {
        Some(parent) => mkdirp::mkdirp(parent).map(|_| ()),
        None => Ok(()),
    }
    .and_then(|()| copy(&source, &dest).map(|_| ()));

    match copied {
        Ok(()) => {
            info!("seeded data file {:?}", dest.display());
            SeedOutcome::Seeded(dest)
        }
        Err(err) => {
            warn!("failed to seed data file {:?}: {err}", dest.display());
            SeedOutcome::Failed(dest)
        }
    }
}
