//! Webhook related structures and push-event validation

use axum::body::Bytes;
use axum::http::HeaderMap;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::utils::{header_str, lenient_string};

pub const EVENT_HEADER: &str = "x-github-event";
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";
pub const DELIVERY_HEADER: &str = "x-github-delivery";

/// One inbound webhook request, body untouched
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub body: Bytes,
    pub headers: HeaderMap,
}

impl WebhookEvent {
    pub fn new(body: Bytes, headers: HeaderMap) -> Self {
        Self { body, headers }
    }

    pub fn event_type(&self) -> Option<&str> {
        header_str(&self.headers, EVENT_HEADER)
    }

    pub fn signature(&self) -> Option<&str> {
        header_str(&self.headers, SIGNATURE_HEADER)
    }

    pub fn delivery_id(&self) -> Option<&str> {
        header_str(&self.headers, DELIVERY_HEADER)
    }
}

/// The parts of GitHub's push payload this service reads
#[derive(Debug, Clone, Deserialize)]
pub struct PushPayload {
    pub repository: Repository,
    #[serde(default)]
    pub commits: Vec<CommitSummary>,
    #[serde(rename = "ref", default, deserialize_with = "lenient_string")]
    pub git_ref: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub before: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub after: Option<String>,
}

impl PushPayload {
    /// Branch (or tag) name without the `refs/heads/` prefix.
    pub fn branch(&self) -> Option<&str> {
        self.git_ref.as_deref().map(|r| {
            r.strip_prefix("refs/heads/")
                .or_else(|| r.strip_prefix("refs/tags/"))
                .unwrap_or(r)
        })
    }

    /// Only the final commit of a push is ever notified.
    pub fn latest_commit(&self) -> Option<&CommitSummary> {
        self.commits.last()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub full_name: String,
}

/// A commit as listed in the push payload. Only `id` is required; the other
/// fields read as empty when null or of the wrong type.
#[derive(Debug, Clone, Deserialize)]
pub struct CommitSummary {
    pub id: String,
    #[serde(default, deserialize_with = "lenient_message")]
    pub message: String,
    #[serde(default, deserialize_with = "lenient_author")]
    pub author: Option<CommitAuthor>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub timestamp: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub url: Option<String>,
}

impl CommitSummary {
    pub fn author_name(&self) -> Option<&str> {
        self.author.as_ref().and_then(|a| a.name.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitAuthor {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: Option<String>,
}

fn lenient_message<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_string(deserializer)?.unwrap_or_default())
}

fn lenient_author<'de, D>(deserializer: D) -> Result<Option<CommitAuthor>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if !value.is_object() {
        return Ok(None);
    }
    Ok(CommitAuthor::deserialize(value).ok())
}

/// Result of checking an inbound event before any outbound call is made
#[derive(Debug)]
pub enum ValidationOutcome {
    /// A push for the configured repository
    Accepted(PushPayload),
    /// Not a push event; acknowledged so GitHub does not retry
    Ignored { event: String },
    /// Well-formed push for some other repository
    Unauthorized { repository: String },
    /// Payload is missing required structure
    Malformed(String),
}

/// Checks, in order: event type, repository presence, repository name shape,
/// repository identity. Only then is the payload decoded into `PushPayload`.
pub fn validate_push(
    event_type: Option<&str>,
    payload: &Value,
    target_repository: &str,
) -> ValidationOutcome {
    if event_type != Some("push") {
        return ValidationOutcome::Ignored {
            event: event_type.unwrap_or("unknown").to_string(),
        };
    }

    let Some(repository) = payload.get("repository").filter(|r| r.is_object()) else {
        return ValidationOutcome::Malformed("missing repository object".to_string());
    };

    let full_name = match repository.get("full_name").and_then(Value::as_str) {
        Some(name) if !name.is_empty() && name.contains('/') => name,
        _ => {
            return ValidationOutcome::Malformed(
                "repository.full_name must be a non-empty owner/repo string".to_string(),
            );
        }
    };

    if full_name != target_repository {
        return ValidationOutcome::Unauthorized {
            repository: full_name.to_string(),
        };
    }

    match PushPayload::deserialize(payload) {
        Ok(push) => ValidationOutcome::Accepted(push),
        Err(e) => ValidationOutcome::Malformed(format!("invalid push payload: {}", e)),
    }
}
