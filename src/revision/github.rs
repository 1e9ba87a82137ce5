// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Revision provider backed by the GitHub REST API.
//!
//! The default branch comes from the repository endpoint, the latest
//! revision from the first entry of the commit listing, and archives from
//! the zipball endpoint. Access tokens are optional, and only ever leave
//! the process as an `Authorization` header.
//!
//! # See Also
//!
//! - [GitHub REST API - Repositories](https://docs.github.com/en/rest/repos/repos)
//! - [GitHub REST API - Commits](https://docs.github.com/en/rest/commits/commits)

use crate::{
    config::SourceSettings,
    revision::{ProviderError, Revision, RevisionProvider},
};

use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{
    blocking::{Client, RequestBuilder, Response},
    header::ACCEPT,
};
use serde::{de::DeserializeOwned, Deserialize};
use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    io::Read,
    time::Duration,
};
use tracing::{debug, info, instrument};

const USER_AGENT: &str = concat!("relaunch/", env!("CARGO_PKG_VERSION"));
const API_MEDIA_TYPE: &str = "application/vnd.github+json";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const API_TIMEOUT: Duration = Duration::from_secs(30);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);
const DOWNLOAD_TEMPLATE: &str =
    "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}] {bytes}";

/// Access token for authenticated API requests.
///
/// Debug output never shows the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    /// Construct new token.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Read token from target environment variable.
    ///
    /// Unset, or blank variables mean no token.
    pub fn from_env(var: impl AsRef<str>) -> Option<Self> {
        std::env::var(var.as_ref())
            .ok()
            .filter(|secret| !secret.trim().is_empty())
            .map(Self)
    }
}

impl Debug for Token {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str("Token(<redacted>)")
    }
}

/// Revision provider for one GitHub repository.
#[derive(Debug)]
pub struct GitHubProvider {
    client: Client,
    repo_url: String,
    branch: Option<String>,
    token: Option<Token>,
}

impl GitHubProvider {
    /// Construct new provider from source settings.
    ///
    /// Reads the access token from the environment variable named by the
    /// settings, if any.
    ///
    /// # Errors
    ///
    /// - Return [`ProviderError::Client`] if HTTP client cannot be built.
    pub fn new(settings: &SourceSettings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(ProviderError::Client)?;

        Ok(Self {
            client,
            repo_url: repo_url(settings),
            branch: settings.branch.clone(),
            token: Token::from_env(&settings.token_env),
        })
    }

    fn request(&self, url: &str, timeout: Duration) -> RequestBuilder {
        let request = self.client.get(url).timeout(timeout);
        match &self.token {
            Some(token) => request.bearer_auth(&token.0),
            None => request,
        }
    }

    fn send(&self, url: &str, request: RequestBuilder) -> Result<Response> {
        request
            .send()
            .and_then(Response::error_for_status)
            .map_err(|err| ProviderError::Unavailable {
                url: url.into(),
                source: err.into(),
            })
    }

    fn api_request(&self, url: &str) -> RequestBuilder {
        self.request(url, API_TIMEOUT).header(ACCEPT, API_MEDIA_TYPE)
    }

    fn commits_request(&self, branch: &str) -> (String, RequestBuilder) {
        let url = format!("{}/commits", self.repo_url);
        // INVARIANT: Branch names go through query encoding, never raw into the URL.
        let request = self
            .api_request(&url)
            .query(&[("sha", branch), ("per_page", "1")]);

        (url, request)
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str, request: RequestBuilder) -> Result<T> {
        self.send(url, request)?.json::<T>().map_err(|err| {
            // INVARIANT: Body cut short by the network is not a malformed body.
            if err.is_decode() {
                ProviderError::Malformed {
                    url: url.into(),
                    source: err.into(),
                }
            } else {
                ProviderError::Unavailable {
                    url: url.into(),
                    source: err.into(),
                }
            }
        })
    }
}

impl RevisionProvider for GitHubProvider {
    #[instrument(skip(self), level = "debug")]
    fn default_branch(&self) -> Result<String> {
        if let Some(branch) = &self.branch {
            debug!("use pinned branch {branch:?}");
            return Ok(branch.clone());
        }

        let request = self.api_request(&self.repo_url);
        let repository: RepositoryInfo = self.get_json(&self.repo_url, request)?;
        debug!("default branch is {:?}", repository.default_branch);

        Ok(repository.default_branch)
    }

    #[instrument(skip(self), level = "debug")]
    fn latest_revision(&self, branch: &str) -> Result<Revision> {
        let (url, request) = self.commits_request(branch);
        let commits: Vec<CommitInfo> = self.get_json(&url, request)?;

        newest_commit(branch, commits)
    }

    #[instrument(skip(self), level = "debug")]
    fn fetch_archive(&self, revision: &Revision) -> Result<Vec<u8>> {
        let url = format!("{}/zipball/{revision}", self.repo_url);
        info!("download archive of {revision}");
        let response = self.send(&url, self.request(&url, DOWNLOAD_TIMEOUT))?;

        let bar = match response.content_length() {
            Some(length) => ProgressBar::new(length),
            None => ProgressBar::no_length(),
        };
        bar.set_style(download_style());
        bar.set_message(revision.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));

        let mut archive = Vec::new();
        let result = bar.wrap_read(response).read_to_end(&mut archive);
        bar.finish_and_clear();
        result.map_err(|err| ProviderError::Unavailable {
            url: url.clone(),
            source: err.into(),
        })?;
        debug!("downloaded {} bytes from {url}", archive.len());

        Ok(archive)
    }
}

#[derive(Debug, Deserialize)]
struct RepositoryInfo {
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct CommitInfo {
    sha: String,
}

fn repo_url(settings: &SourceSettings) -> String {
    format!(
        "{}/repos/{}/{}",
        settings.api_url.trim_end_matches('/'),
        settings.owner,
        settings.repo
    )
}

fn download_style() -> ProgressStyle {
    ProgressStyle::with_template(DOWNLOAD_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("-Cco.")
}

fn newest_commit(branch: &str, commits: Vec<CommitInfo>) -> Result<Revision> {
    let commit = commits
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::NoRevisions {
            branch: branch.into(),
        })?;

    Ok(Revision::new(commit.sha)?)
}

/// Friendly result alias :3
type Result<T, E = ProviderError> = std::result::Result<T, E>;
