//! Per-request pipeline: verify, validate, fetch, format, publish.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::{NotifierConfig, WebhookSecret};
use crate::format::{
    DIFF_UNAVAILABLE, DiffLimits, NotificationContext, build_notification, format_diff,
};
use crate::github::CommitFetcher;
use crate::notify::{NotificationMessage, NotificationPublisher};
use crate::stats::{Counter, WebhookStats};
use crate::utils::verify_github_signature;
use crate::webhook::{ValidationOutcome, WebhookEvent, validate_push};

/// How a webhook delivery was resolved. Always rendered as JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookResponse {
    Processed {
        total_commits: usize,
        commit_id: String,
        diff_available: bool,
    },
    DryRun {
        commit_id: String,
        notification: NotificationMessage,
    },
    Ignored {
        event: String,
    },
    NoCommits,
    InvalidSignature,
    Unauthorized {
        repository: String,
    },
    BadRequest {
        reason: String,
    },
    PublishFailed,
}

impl WebhookResponse {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Processed { .. }
            | Self::DryRun { .. }
            | Self::Ignored { .. }
            | Self::NoCommits => StatusCode::OK,
            Self::InvalidSignature => StatusCode::UNAUTHORIZED,
            Self::Unauthorized { .. } => StatusCode::FORBIDDEN,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::PublishFailed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> Value {
        match self {
            Self::Processed {
                total_commits,
                commit_id,
                diff_available,
            } => json!({
                "message": "Notification sent",
                "total_commits": total_commits,
                "processed_commit": commit_id,
                "diff_available": diff_available,
            }),
            Self::DryRun {
                commit_id,
                notification,
            } => json!({
                "message": "Dry run, notification not published",
                "processed_commit": commit_id,
                "subject": notification.subject,
                "body": notification.message,
            }),
            Self::Ignored { event } => json!({
                "message": format!("Ignored {} event", event),
                "event": event,
            }),
            Self::NoCommits => json!({ "message": "No commits in push" }),
            Self::InvalidSignature => json!({ "message": "Invalid signature" }),
            Self::Unauthorized { repository } => json!({
                "message": "Repository not allowed",
                "repository": repository,
            }),
            Self::BadRequest { reason } => json!({
                "message": "Malformed payload",
                "reason": reason,
            }),
            Self::PublishFailed => json!({ "message": "Failed to publish notification" }),
        }
    }
}

impl IntoResponse for WebhookResponse {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

/// Immutable per-process settings the pipeline needs
#[derive(Debug, Clone)]
pub struct NotifierSettings {
    pub repository: String,
    pub webhook_secret: WebhookSecret,
    pub environment: String,
    pub limits: DiffLimits,
}

impl From<&NotifierConfig> for NotifierSettings {
    fn from(config: &NotifierConfig) -> Self {
        Self {
            repository: config.github.repository.clone(),
            webhook_secret: config.github.webhook_secret.clone(),
            environment: config.notification.environment.clone(),
            limits: config.notification.limits,
        }
    }
}

pub struct PushNotifier {
    settings: NotifierSettings,
    fetcher: Arc<dyn CommitFetcher>,
    publisher: Arc<dyn NotificationPublisher>,
    stats: Arc<WebhookStats>,
}

impl PushNotifier {
    pub fn new(
        settings: NotifierSettings,
        fetcher: Arc<dyn CommitFetcher>,
        publisher: Arc<dyn NotificationPublisher>,
    ) -> Self {
        Self {
            settings,
            fetcher,
            publisher,
            stats: Arc::new(WebhookStats::new()),
        }
    }

    pub fn settings(&self) -> &NotifierSettings {
        &self.settings
    }

    pub fn stats(&self) -> &WebhookStats {
        &self.stats
    }

    /// Handles one delivery end to end. Never fails: every outcome is a response.
    pub async fn handle(&self, event: &WebhookEvent, dry_run: bool) -> WebhookResponse {
        self.stats.incr(Counter::Received);

        if !verify_github_signature(
            self.settings.webhook_secret.expose(),
            &event.body,
            event.signature(),
        ) {
            warn!(has_signature = event.signature().is_some(), "Signature verification failed");
            self.stats.incr(Counter::SignatureFailure);
            return WebhookResponse::InvalidSignature;
        }

        let payload: Value = match serde_json::from_slice(&event.body) {
            Ok(v) => v,
            Err(e) => {
                info!("Could not parse JSON body: {}", e);
                self.stats.incr(Counter::Malformed);
                return WebhookResponse::BadRequest {
                    reason: format!("invalid JSON: {}", e),
                };
            }
        };

        let push = match validate_push(event.event_type(), &payload, &self.settings.repository) {
            ValidationOutcome::Accepted(push) => push,
            ValidationOutcome::Ignored { event } => {
                info!(%event, "Not a push event, ignoring");
                self.stats.incr(Counter::Ignored);
                return WebhookResponse::Ignored { event };
            }
            ValidationOutcome::Unauthorized { repository } => {
                warn!(
                    %repository,
                    expected = %self.settings.repository,
                    "Push for unexpected repository"
                );
                self.stats.incr(Counter::Rejected);
                return WebhookResponse::Unauthorized { repository };
            }
            ValidationOutcome::Malformed(reason) => {
                warn!(%reason, "Rejecting malformed push payload");
                self.stats.incr(Counter::Malformed);
                return WebhookResponse::BadRequest { reason };
            }
        };

        let Some(commit) = push.latest_commit() else {
            info!("Push carried no commits");
            self.stats.incr(Counter::NoCommits);
            return WebhookResponse::NoCommits;
        };
        let total_commits = push.commits.len();
        debug!(commit = %commit.id, total_commits, "Selected most recent commit");

        let (diff_text, diff_available) = match self
            .fetcher
            .fetch_commit_diff(&self.settings.repository, &commit.id)
            .await
        {
            Ok(diff) => (format_diff(&diff.files, self.settings.limits), true),
            Err(e) => {
                error!(commit = %commit.id, "Failed to fetch commit diff: {}", e);
                self.stats.incr(Counter::FetchFailure);
                (DIFF_UNAVAILABLE.to_string(), false)
            }
        };

        let notification = build_notification(&NotificationContext {
            repository: &self.settings.repository,
            environment: &self.settings.environment,
            branch: push.branch(),
            commit,
            total_commits,
            diff_text: &diff_text,
        });

        if dry_run {
            info!(commit = %commit.id, "[DRY_RUN] Notification composed, not published");
            self.stats.incr(Counter::DryRun);
            return WebhookResponse::DryRun {
                commit_id: commit.id.clone(),
                notification,
            };
        }

        if let Err(e) = self.publisher.publish(&notification).await {
            error!(commit = %commit.id, "{}", e);
            self.stats.incr(Counter::PublishFailure);
            return WebhookResponse::PublishFailed;
        }

        info!(commit = %commit.id, total_commits, diff_available, "Push notification sent");
        self.stats.incr(Counter::Processed);
        WebhookResponse::Processed {
            total_commits,
            commit_id: commit.id.clone(),
            diff_available,
        }
    }
}
