//! GitHub `push` event payloads.
//!
//! <https://docs.github.com/en/webhooks/webhook-events-and-payloads#push>

use serde::Deserialize;
use serde_json::Value;

use pages_core::{BuildEvent, CommitInfo, Person};

#[derive(Debug, Deserialize)]
struct PushEvent {
    #[serde(rename = "ref")]
    git_ref: String,
    repository: Repository,
    head_commit: Commit,
    pusher: Identity,
}

#[derive(Debug, Deserialize)]
struct Repository {
    name: String,
    #[serde(default)]
    organization: Option<String>,
    #[serde(default)]
    owner: Option<Owner>,
}

#[derive(Debug, Deserialize)]
struct Owner {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    login: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Commit {
    id: String,
    message: String,
    timestamp: String,
    author: Identity,
    committer: Identity,
}

#[derive(Debug, Deserialize)]
struct Identity {
    name: String,
    #[serde(default)]
    email: Option<String>,
}

impl From<Identity> for Person {
    fn from(identity: Identity) -> Self {
        Person {
            name: identity.name,
            email: identity.email.unwrap_or_default(),
        }
    }
}

/// `None` unless `ref`, `repository`, `head_commit` and `pusher` are all present.
pub fn parse(payload: &Value) -> Option<BuildEvent> {
    let event = PushEvent::deserialize(payload).ok()?;
    let owner = event.repository.owner;
    let collection = event
        .repository
        .organization
        .or_else(|| owner.as_ref().and_then(|o| o.name.clone()))
        .or_else(|| owner.as_ref().and_then(|o| o.login.clone()))?;

    Some(BuildEvent {
        branch: event.git_ref,
        collection,
        repository: event.repository.name,
        commit: CommitInfo {
            id: event.head_commit.id,
            message: event.head_commit.message,
            timestamp: event.head_commit.timestamp,
        },
        author: event.head_commit.author.into(),
        committer: Some(event.head_commit.committer.into()),
        pusher: Some(event.pusher.into()),
    })
}
