// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use relaunch::{
    config::LauncherConfig,
    environment::VirtualEnv,
    launch::ProcessLauncher,
    path::{current_file, default_config_path, versions_dir},
    pointer::JsonPointerStore,
    revision::github::GitHubProvider,
    seed::DataSeeder,
    store::LocalArtifactStore,
    Orchestrator,
};

use anyhow::Result;
use clap::Parser;
use std::{ffi::OsString, path::PathBuf, process::exit};
use tracing::{debug, error};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install or update the application from its latest revision, then run it.
#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "relaunch [options] [-- <app_args>...]",
    version
)]
struct Cli {
    /// Skip update check, and run currently installed version.
    ///
    /// Takes precedence over `--force`.
    #[arg(long)]
    pub no_update: bool,

    /// Reinstall even if the latest revision matches the current one.
    #[arg(long)]
    pub force: bool,

    /// Path to configuration file.
    #[arg(short, long, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Arguments passed through to the application.
    #[arg(last = true, value_name = "app_args")]
    pub app_args: Vec<OsString>,
}

impl Cli {
    fn run(self) -> Result<i32> {
        let config_path = match self.config {
            Some(path) => path,
            None => default_config_path()?,
        };
        let config = LauncherConfig::load(&config_path)?;
        debug!("using application root {:?}", config.install.app_root.display());

        let app_root = &config.install.app_root;
        let store = LocalArtifactStore::open(versions_dir(app_root))?;
        let pointer = JsonPointerStore::new(current_file(app_root));
        let provider = GitHubProvider::new(&config.source)?;
        let environment = VirtualEnv::new(&config.launch.python);
        let launcher = ProcessLauncher::new(&config.launch.args).with_passthrough(self.app_args);

        let orchestrator = Orchestrator::new(provider, store, pointer, environment, launcher)
            .with_seeder(DataSeeder::new(config.seeds.clone()));

        Ok(orchestrator.resolve_and_run(self.no_update, self.force)?)
    }
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    match run() {
        Ok(code) => exit(code),
        Err(error) => {
            error!("{error:?}");
            exit(1);
        }
    }
}

fn run() -> Result<i32> {
    Cli::parse().run()
}
