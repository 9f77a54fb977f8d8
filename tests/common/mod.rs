#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use git_push_notify::AppState;
use git_push_notify::api::router;
use git_push_notify::config::WebhookSecret;
use git_push_notify::error::{FetchError, PublishError};
use git_push_notify::format::DiffLimits;
use git_push_notify::github::{CommitDiff, CommitFetcher, FileChange, FileStatus};
use git_push_notify::notifier::{NotifierSettings, PushNotifier};
use git_push_notify::notify::{NotificationMessage, NotificationPublisher};
use git_push_notify::retry::Sleeper;
use git_push_notify::utils::sign_payload;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

pub const SECRET: &str = "test-webhook-secret";
pub const TARGET_REPO: &str = "octo/widgets";

/// Returns a canned diff (or a 404-style failure) and records every request
#[derive(Default)]
pub struct FakeFetcher {
    pub files: Vec<FileChange>,
    pub fail: bool,
    pub calls: Mutex<Vec<(String, String)>>,
}

impl FakeFetcher {
    pub fn with_files(files: Vec<FileChange>) -> Self {
        Self {
            files,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl CommitFetcher for FakeFetcher {
    async fn fetch_commit_diff(
        &self,
        repository: &str,
        sha: &str,
    ) -> Result<CommitDiff, FetchError> {
        self.calls
            .lock()
            .unwrap()
            .push((repository.to_string(), sha.to_string()));
        if self.fail {
            return Err(FetchError::Status {
                status: 404,
                url: format!("https://api.github.com/repos/{}/commits/{}", repository, sha),
            });
        }
        Ok(CommitDiff {
            files: self.files.clone(),
        })
    }
}

#[derive(Default)]
pub struct FakePublisher {
    pub fail: bool,
    pub sent: Mutex<Vec<NotificationMessage>>,
}

impl FakePublisher {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<NotificationMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationPublisher for FakePublisher {
    async fn publish(&self, notification: &NotificationMessage) -> Result<(), PublishError> {
        self.sent.lock().unwrap().push(notification.clone());
        if self.fail {
            return Err(PublishError::Delivery {
                topic: "arn:aws:sns:us-east-1:123456789012:pushes".to_string(),
                message: "throttled".to_string(),
            });
        }
        Ok(())
    }
}

/// Records backoff waits instead of sleeping
#[derive(Default)]
pub struct RecordingSleeper {
    pub slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn slept(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}

pub struct Harness<F = FakeFetcher> {
    pub app: Router,
    pub state: Arc<AppState>,
    pub fetcher: Arc<F>,
    pub publisher: Arc<FakePublisher>,
}

impl Harness {
    pub fn new(fetcher: FakeFetcher, publisher: FakePublisher) -> Self {
        Self::with_fetcher(fetcher, publisher)
    }
}

impl<F: CommitFetcher + 'static> Harness<F> {
    /// Wires any fetcher, including a real `GitHubClient`, behind the router.
    pub fn with_fetcher(fetcher: F, publisher: FakePublisher) -> Self {
        let fetcher = Arc::new(fetcher);
        let publisher = Arc::new(publisher);
        let settings = NotifierSettings {
            repository: TARGET_REPO.to_string(),
            webhook_secret: WebhookSecret::new(SECRET),
            environment: "test".to_string(),
            limits: DiffLimits::default(),
        };
        let notifier = PushNotifier::new(settings, fetcher.clone(), publisher.clone());
        let state = Arc::new(AppState::new(notifier, 1));

        Self {
            app: router(state.clone()),
            state,
            fetcher,
            publisher,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }
}

pub fn file(name: &str) -> FileChange {
    FileChange {
        filename: name.to_string(),
        status: FileStatus::Modified,
        additions: 4,
        deletions: 2,
        patch: Some("@@ -1,2 +1,4 @@".to_string()),
    }
}

pub fn commit(id: &str, message: &str) -> Value {
    json!({
        "id": id,
        "message": message,
        "author": { "name": "Ada Lovelace", "email": "ada@example.com" },
        "timestamp": "2024-05-01T10:00:00Z",
        "url": format!("https://github.com/{}/commit/{}", TARGET_REPO, id),
    })
}

pub fn push_payload(repository: &str, commits: Vec<Value>) -> Value {
    json!({
        "ref": "refs/heads/main",
        "before": "0000000000000000000000000000000000000000",
        "after": commits.last().and_then(|c| c["id"].as_str()).unwrap_or(""),
        "repository": { "full_name": repository },
        "commits": commits,
    })
}

/// Builds a signed `POST /webhook` request
pub fn webhook_request(event: &str, body: &[u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json")
        .header("x-github-event", event)
        .header("x-github-delivery", "72d3162e-cc78-11e3-81ab-4c9367dc0958")
        .header("x-hub-signature-256", sign_payload(SECRET, body).unwrap())
        .body(Body::from(body.to_vec()))
        .unwrap()
}

pub fn unsigned_request(event: &str, body: &[u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json")
        .header("x-github-event", event)
        .body(Body::from(body.to_vec()))
        .unwrap()
}
