//! Bitbucket Server POST service payloads.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use pages_core::{BuildEvent, CommitInfo, Person};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostService {
    ref_changes: Vec<RefChange>,
    repository: Repository,
    changesets: Changesets,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefChange {
    ref_id: String,
}

#[derive(Debug, Deserialize)]
struct Repository {
    slug: String,
    project: Project,
}

#[derive(Debug, Deserialize)]
struct Project {
    key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Changesets {
    is_last_page: bool,
    values: Vec<Changeset>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Changeset {
    to_commit: Commit,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Commit {
    id: String,
    message: String,
    author_timestamp: i64,
    author: Author,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Author {
    name: String,
    #[serde(default)]
    email_address: String,
}

/// `None` unless the payload is complete and `changesets.isLastPage` is set.
pub fn parse(payload: &Value) -> Option<BuildEvent> {
    let hook = PostService::deserialize(payload).ok()?;
    if !hook.changesets.is_last_page {
        return None;
    }
    let branch = hook.ref_changes.into_iter().next()?.ref_id;
    let commit = hook.changesets.values.into_iter().next()?.to_commit;
    let timestamp = DateTime::<Utc>::from_timestamp_millis(commit.author_timestamp)?
        .format("%Y-%m-%d %H:%M:%S")
        .to_string();

    Some(BuildEvent {
        branch,
        collection: hook.repository.project.key.to_lowercase(),
        repository: hook.repository.slug,
        commit: CommitInfo {
            id: commit.id,
            message: commit.message,
            timestamp,
        },
        author: Person {
            name: commit.author.name,
            email: commit.author.email_address,
        },
        committer: None,
        pusher: None,
    })
}
