// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the launcher configuration file to simplify the
//! process of serialization and deserialization. Every field has a default,
//! so an absent file, or an empty one, yields a working launcher for the
//! Spectra Processing Tool.
//!
//! # General Layout
//!
//! ```toml
//! [source]
//! owner = "marksocaciu"
//! repo = "Spectra-Processing-Tool"
//! # branch = "main"
//! api_url = "https://api.github.com"
//! token_env = "GITHUB_TOKEN"
//!
//! [install]
//! app_root = "~/Documents/Spectra Processing/App"
//!
//! [launch]
//! python = "python3"
//! args = ["-c", "from spectra_processing.app import main; main()"]
//!
//! [[seed]]
//! dest = "~/Documents/Spectra Processing/Executable/fluorophor_data.txt"
//! candidates = ["src/spectra_processing/resources/fluorophor_data.txt", "fluorophor_data.txt"]
//! ```

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, instrument};

/// Default root of installed application versions.
pub const DEFAULT_APP_ROOT: &str = "~/Documents/Spectra Processing/App";

/// Default directory for user-accessible data files.
pub const DEFAULT_DATA_DIR: &str = "~/Documents/Spectra Processing/Executable";

/// Launcher configuration layout.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LauncherConfig {
    /// Where revisions come from.
    pub source: SourceSettings,

    /// Where revisions are installed.
    pub install: InstallSettings,

    /// How the application is started.
    pub launch: LaunchSettings,

    /// User data files to seed after installs.
    #[serde(rename = "seed")]
    pub seeds: Vec<SeedSettings>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            source: SourceSettings::default(),
            install: InstallSettings::default(),
            launch: LaunchSettings::default(),
            seeds: SeedSettings::defaults(),
        }
    }
}

impl LauncherConfig {
    /// Load configuration from target path.
    ///
    /// A missing file is not an error, the default configuration is used
    /// instead.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if file exists but cannot be read.
    /// - Return [`ConfigError::Deserialize`] if file contents are invalid.
    /// - Return [`ConfigError::ShellExpansion`] if a path cannot be expanded.
    #[instrument(skip(path), level = "debug")]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match read_to_string(path) {
            Ok(data) => {
                debug!("load configuration from {:?}", path.display());
                data.parse()
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("no configuration at {:?}, using defaults", path.display());
                Self::with_defaults()
            }
            Err(err) => Err(ConfigError::Read {
                source: err,
                path: path.to_path_buf(),
            }),
        }
    }

    /// Built-in configuration with default paths resolved.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::ShellExpansion`] if a path cannot be expanded.
    pub fn with_defaults() -> Result<Self> {
        Self::default().expanded()
    }

    // INVARIANT: Every path field is shell expanded exactly once, after parsing.
    fn expanded(mut self) -> Result<Self> {
        self.install.app_root = expand_path(&self.install.app_root)?;
        for seed in &mut self.seeds {
            seed.dest = expand_path(&seed.dest)?;
        }

        Ok(self)
    }
}

impl FromStr for LauncherConfig {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let config: LauncherConfig = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;
        config.expanded()
    }
}

impl Display for LauncherConfig {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Remote repository to pull revisions from.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceSettings {
    /// Owner of the remote repository.
    pub owner: String,

    /// Name of the remote repository.
    pub repo: String,

    /// Branch to track instead of the repository's default branch.
    pub branch: Option<String>,

    /// Base URL of the REST API.
    pub api_url: String,

    /// Environment variable holding the access token.
    pub token_env: String,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            owner: "marksocaciu".into(),
            repo: "Spectra-Processing-Tool".into(),
            branch: None,
            api_url: "https://api.github.com".into(),
            token_env: "GITHUB_TOKEN".into(),
        }
    }
}

/// Install location settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InstallSettings {
    /// Root directory holding the versions store and current pointer.
    pub app_root: PathBuf,
}

impl Default for InstallSettings {
    fn default() -> Self {
        Self {
            app_root: PathBuf::from(DEFAULT_APP_ROOT),
        }
    }
}

/// Application launch settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LaunchSettings {
    /// Base interpreter used to create runtime environments.
    pub python: String,

    /// Arguments handed to the environment's interpreter.
    pub args: Vec<String>,
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self {
            python: if cfg!(windows) { "python" } else { "python3" }.into(),
            args: vec![
                "-c".into(),
                "from spectra_processing.app import main; main()".into(),
            ],
        }
    }
}

/// User data file to seed from an installed artifact.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct SeedSettings {
    /// Destination of seeded file. Never overwritten.
    pub dest: PathBuf,

    /// Candidate source files relative to artifact directory, in order of
    /// preference.
    pub candidates: Vec<PathBuf>,
}

impl SeedSettings {
    /// Default seed entries.
    pub fn defaults() -> Vec<Self> {
        vec![Self {
            dest: Path::new(DEFAULT_DATA_DIR).join("fluorophor_data.txt"),
            candidates: vec![
                PathBuf::from("src/spectra_processing/resources/fluorophor_data.txt"),
                PathBuf::from("fluorophor_data.txt"),
            ],
        }]
    }
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.to_string_lossy().as_ref())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned(),
    ))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read configuration at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
