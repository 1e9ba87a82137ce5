// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Source archive unpacking.
//!
//! Providers hand over source trees as zip archives that wrap the whole
//! project in exactly one top-level directory with a generated name, e.g.,
//! `owner-repo-abc123/`. Unpacking happens in two steps: extract every
//! entry below a scratch directory, then locate that single top-level
//! directory. Anything else is a layout error, not something to guess at.

use crate::store::StoreError;

use std::{
    fs::{create_dir_all, read_dir, File},
    io::{copy, Cursor},
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};
use zip::ZipArchive;

/// Extract zip archive bytes below target directory.
///
/// Entries whose names would escape the target directory are skipped.
///
/// # Errors
///
/// - Return [`StoreError::Archive`] if archive data is corrupt.
/// - Return [`StoreError::Io`] if entries cannot be written.
#[instrument(skip(bytes, dest), level = "debug")]
pub(crate) fn extract(bytes: &[u8], dest: &Path) -> Result<()> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    debug!("extract {} entries to {:?}", archive.len(), dest.display());

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let Some(enclosed) = entry.enclosed_name().map(|path| dest.join(path)) else {
            debug!("skip entry outside of archive root: {:?}", entry.name());
            continue;
        };

        if entry.is_dir() {
            create_dir_all(&enclosed).map_err(|err| io_error(err, &enclosed))?;
            continue;
        }

        if let Some(parent) = enclosed.parent() {
            create_dir_all(parent).map_err(|err| io_error(err, parent))?;
        }

        let mut file = File::create(&enclosed).map_err(|err| io_error(err, &enclosed))?;
        copy(&mut entry, &mut file).map_err(|err| io_error(err, &enclosed))?;

        #[cfg(unix)]
        {
            use std::{fs::set_permissions, fs::Permissions, os::unix::fs::PermissionsExt};

            if let Some(mode) = entry.unix_mode() {
                set_permissions(&enclosed, Permissions::from_mode(mode))
                    .map_err(|err| io_error(err, &enclosed))?;
            }
        }
    }

    Ok(())
}

/// Locate the single top-level directory of an extracted archive.
///
/// # Errors
///
/// - Return [`StoreError::ArchiveLayout`] if there is no top-level entry,
///   more than one, or the only one is not a directory.
/// - Return [`StoreError::Io`] if target directory cannot be listed.
pub(crate) fn top_level_dir(root: &Path) -> Result<PathBuf> {
    let mut entries = Vec::new();
    for entry in read_dir(root).map_err(|err| io_error(err, root))? {
        entries.push(entry.map_err(|err| io_error(err, root))?.path());
    }

    match entries.as_slice() {
        [only] if only.is_dir() => Ok(only.clone()),
        [only] => Err(StoreError::ArchiveLayout {
            reason: format!("top-level entry {:?} is not a directory", only.display()),
        }),
        [] => Err(StoreError::ArchiveLayout {
            reason: "archive is empty".into(),
        }),
        many => Err(StoreError::ArchiveLayout {
            reason: format!("expected one top-level directory, found {} entries", many.len()),
        }),
    }
}

fn io_error(source: std::io::Error, path: &Path) -> StoreError {
    StoreError::Io {
        source,
        path: path.to_path_buf(),
    }
}

/// Friendly result alias :3
type Result<T, E = StoreError> = std::result::Result<T, E>;
