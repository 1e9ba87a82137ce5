// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Self-updating application launcher.
//!
//! Relaunch resolves the latest revision of an application's source
//! repository, installs it into a cache of immutable artifact directories
//! keyed by revision, prepares an isolated runtime environment for it, and
//! finally launches the application from that environment.
//!
//! # Moving Parts
//!
//! - [`revision`]: revision identifiers, and the providers resolving them.
//! - [`store`]: the artifact store of installed revisions.
//! - [`pointer`]: the record of which revision is current.
//! - [`environment`]: runtime environment preparation.
//! - [`launch`]: running the application.
//! - [`orchestrator`]: deciding when to install, and in what order.

pub mod config;
pub mod environment;
pub mod launch;
pub mod orchestrator;
pub mod path;
pub mod pointer;
pub mod revision;
pub mod seed;
pub mod store;

pub use orchestrator::{needs_install, LaunchError, Orchestrator};
