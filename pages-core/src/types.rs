//! Domain types shared by the resolver, the build pipeline and the daemon.
//!
//! All types that cross a crate boundary are serializable via serde so that
//! parsed webhook events can be logged and replayed as JSON.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed repository name (the last path segment of the clone URL).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoName(pub String);

impl fmt::Display for RepoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for RepoName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RepoName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A strongly-typed branch name, without the `refs/heads/` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BranchName(pub String);

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for BranchName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for BranchName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl BranchName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The name with `/` replaced by `-`, for use inside a single file name.
    pub fn file_stem(&self) -> String {
        self.0.replace('/', "-")
    }
}

// ---------------------------------------------------------------------------
// Webhook event
// ---------------------------------------------------------------------------

/// Name and email of a commit author, committer or pusher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    pub email: String,
}

impl fmt::Display for Person {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.email)
    }
}

/// Head commit of a push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub id: String,
    pub message: String,
    pub timestamp: String,
}

/// A push notification normalized across webhook providers.
///
/// `branch` is the full ref (`refs/heads/<name>`) as delivered by the provider;
/// builder dispatch extracts the branch name from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildEvent {
    pub branch: String,
    pub collection: String,
    pub repository: String,
    pub commit: CommitInfo,
    pub author: Person,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub committer: Option<Person>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pusher: Option<Person>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
