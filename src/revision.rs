// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Revision identifiers and the providers that resolve them.
//!
//! A __revision__ is an immutable snapshot of the application's source
//! tree, identified by an opaque token such as a commit hash. Two equal
//! revision identifiers always denote byte-identical source trees, which
//! is what lets the artifact store use them as content-address keys.
//!
//! A __revision provider__ is the remote host that knows which revision is
//! the latest one, and can hand over a downloadable archive of it. Relaunch
//! only ever asks three questions of a provider: what the default branch
//! is, what the newest revision on that branch is, and what the archive
//! bytes for a given revision are.

pub mod github;

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

/// Opaque, immutable identifier of a source snapshot.
///
/// # Invariants
///
/// - Never empty.
/// - Never contains path separators or NUL bytes.
/// - Never starts with a dot.
///
/// These rules hold because the identifier names a directory in the
/// artifact store verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct Revision(String);

impl Revision {
    /// Construct new revision identifier.
    ///
    /// # Errors
    ///
    /// - Return [`RevisionError::Invalid`] if identifier cannot be used as
    ///   an artifact store key.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let reason = if id.is_empty() {
            Some("identifier is empty")
        } else if id.starts_with('.') {
            Some("identifier starts with a dot")
        } else if id.contains(['/', '\\', '\0']) {
            Some("identifier contains a path separator or NUL byte")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(RevisionError::Invalid { id, reason }),
            None => Ok(Self(id)),
        }
    }

    /// Treat revision as string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl FromStr for Revision {
    type Err = RevisionError;

    fn from_str(id: &str) -> Result<Self, Self::Err> {
        Self::new(id)
    }
}

impl TryFrom<String> for Revision {
    type Error = RevisionError;

    fn try_from(id: String) -> Result<Self, Self::Error> {
        Self::new(id)
    }
}

impl From<Revision> for String {
    fn from(revision: Revision) -> Self {
        revision.0
    }
}

impl Display for Revision {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.as_str())
    }
}

/// Remote source of revisions.
///
/// Every call may block on the network. Implementations must bound each
/// call with a finite timeout, and report hangs as
/// [`ProviderError::Unavailable`].
pub trait RevisionProvider {
    /// Name of the branch to track.
    fn default_branch(&self) -> Result<String, ProviderError>;

    /// Newest revision on target branch.
    fn latest_revision(&self, branch: &str) -> Result<Revision, ProviderError>;

    /// Downloadable archive of target revision.
    fn fetch_archive(&self, revision: &Revision) -> Result<Vec<u8>, ProviderError>;
}

/// Revision identifier cannot be used as an artifact store key.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RevisionError {
    #[error("invalid revision identifier {id:?}: {reason}")]
    Invalid { id: String, reason: &'static str },
}

/// All possible error types for revision provider interaction.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// HTTP client cannot be constructed.
    #[error("failed to build http client")]
    Client(#[source] reqwest::Error),

    /// Network, authentication, timeout, or HTTP status failure.
    #[error("revision provider unavailable at {url}")]
    Unavailable {
        url: String,
        #[source]
        source: BoxError,
    },

    /// Response body could not be decoded.
    #[error("revision provider sent malformed response from {url}")]
    Malformed {
        url: String,
        #[source]
        source: BoxError,
    },

    /// Branch exists, but has no history.
    #[error("no revisions found for branch {branch:?}")]
    NoRevisions { branch: String },

    /// Provider handed back an identifier that cannot be stored.
    #[error(transparent)]
    Revision(#[from] RevisionError),
}

/// Type-erased transport failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Friendly result alias :3
type Result<T, E = RevisionError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    #[test_case(""; "empty")]
    #[test_case("."; "current directory")]
    #[test_case(".."; "parent directory")]
    #[test_case(".staging-abc"; "hidden name")]
    #[test_case("abc/def"; "forward slash")]
    #[test_case("abc\\def"; "backslash")]
    #[test_case("abc\0def"; "nul byte")]
    #[test]
    fn reject_unstorable_identifiers(id: &str) {
        assert!(matches!(
            Revision::new(id),
            Err(RevisionError::Invalid { .. })
        ));
    }

    #[test]
    fn accept_commit_hash() -> anyhow::Result<()> {
        let revision: Revision = "3f5c2a9e0b7d41c8a6e2f1d09b8c7a6e5d4c3b2a".parse()?;
        assert_eq!(
            revision.to_string(),
            "3f5c2a9e0b7d41c8a6e2f1d09b8c7a6e5d4c3b2a"
        );

        Ok(())
    }

    #[test]
    fn deserialize_validates_identifier() {
        let result: Result<Revision, _> = serde_json::from_str(r#""../escape""#);
        assert!(result.is_err());

        let result: Revision = serde_json::from_str(r#""abc123""#).unwrap();
        assert_eq!(result.as_str(), "abc123");
    }
}
