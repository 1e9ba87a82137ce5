// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevent path information for external files that need to be
//! interacted with, or managed in some way.

use std::path::{Path, PathBuf};

/// Determine default absolute path to launcher configuration file.
///
/// Uses XDG Base Directory path `$XDG_CONFIG_HOME/relaunch/config.toml` as
/// the default absolute path. Does not check if the path returned actually
/// exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if configuration directory cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("relaunch").join("config.toml"))
        .ok_or(NoWayHome)
}

/// Determine path to artifact store inside application root.
pub fn versions_dir(app_root: impl AsRef<Path>) -> PathBuf {
    app_root.as_ref().join("versions")
}

/// Determine path to current version pointer inside application root.
pub fn current_file(app_root: impl AsRef<Path>) -> PathBuf {
    app_root.as_ref().join("current.json")
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::config_dir`](https://docs.rs/dirs/latest/dirs/fn.config_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's configuration directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;
