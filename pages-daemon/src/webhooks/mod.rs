//! Webhook payload parsers.
//!
//! Each provider module turns its JSON payload into a [`BuildEvent`], or
//! `None` when the payload is not a usable push notification.

pub mod bitbucket;
pub mod github;

use serde_json::Value;

use pages_core::{BuildEvent, WebhookType};

/// Parse `payload` with the parser selected by `webhook_type`.
pub fn parse_webhook(webhook_type: WebhookType, payload: &Value) -> Option<BuildEvent> {
    match webhook_type {
        WebhookType::Github => github::parse(payload),
        WebhookType::Bitbucket => bitbucket::parse(payload),
    }
}
