//! Commit diff retrieval from the GitHub REST API

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::error::FetchError;
use crate::retry::{RetryPolicy, Sleeper, TokioSleeper, retry_with_backoff};
use crate::utils::{lenient_count, lenient_string};

pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";
/// Cap on one whole fetch, every attempt and backoff included
pub const DEFAULT_FETCH_DEADLINE: Duration = Duration::from_secs(20);
const ACCEPT_V3_JSON: &str = "application/vnd.github.v3+json";

/// Change kind GitHub reports for a file in a commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileStatus {
    Added,
    Modified,
    Removed,
    Renamed,
    Copied,
    Changed,
    Unchanged,
    #[default]
    Unknown,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Modified => "modified",
            Self::Removed => "removed",
            Self::Renamed => "renamed",
            Self::Copied => "copied",
            Self::Changed => "changed",
            Self::Unchanged => "unchanged",
            Self::Unknown => "unknown",
        }
    }
}

impl From<&str> for FileStatus {
    fn from(status: &str) -> Self {
        match status {
            "added" => Self::Added,
            "modified" => Self::Modified,
            "removed" => Self::Removed,
            "renamed" => Self::Renamed,
            "copied" => Self::Copied,
            "changed" => Self::Changed,
            "unchanged" => Self::Unchanged,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One file touched by a commit.
///
/// Every field decodes leniently: missing, null or wrongly typed values fall
/// back to safe defaults instead of failing the whole diff.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FileChange {
    #[serde(default = "unknown_filename", deserialize_with = "lenient_filename")]
    pub filename: String,
    #[serde(default, deserialize_with = "lenient_status")]
    pub status: FileStatus,
    #[serde(default, deserialize_with = "lenient_count")]
    pub additions: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub deletions: u64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub patch: Option<String>,
}

impl Default for FileChange {
    fn default() -> Self {
        Self {
            filename: unknown_filename(),
            status: FileStatus::Unknown,
            additions: 0,
            deletions: 0,
            patch: None,
        }
    }
}

fn unknown_filename() -> String {
    "unknown".to_string()
}

fn lenient_filename<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_string(deserializer)?
        .filter(|name| !name.is_empty())
        .unwrap_or_else(unknown_filename))
}

fn lenient_status<'de, D>(deserializer: D) -> Result<FileStatus, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_string(deserializer)?
        .map(|status| FileStatus::from(status.as_str()))
        .unwrap_or_default())
}

/// A non-array `files` is an empty list; an entry that is not an object
/// becomes a default `FileChange`.
fn lenient_files<'de, D>(deserializer: D) -> Result<Vec<FileChange>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Array(entries) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(entries
        .into_iter()
        .map(|entry| FileChange::deserialize(entry).unwrap_or_default())
        .collect())
}

/// The `files` section of `GET /repos/{repo}/commits/{sha}`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CommitDiff {
    #[serde(default, deserialize_with = "lenient_files")]
    pub files: Vec<FileChange>,
}

#[async_trait]
pub trait CommitFetcher: Send + Sync {
    async fn fetch_commit_diff(
        &self,
        repository: &str,
        sha: &str,
    ) -> Result<CommitDiff, FetchError>;
}

/// Unauthenticated GitHub REST client with bounded retry
pub struct GitHubClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
    deadline: Duration,
    sleeper: Arc<dyn Sleeper>,
}

impl GitHubClient {
    pub fn new(
        base_url: impl Into<String>,
        user_agent: &str,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry,
            deadline: DEFAULT_FETCH_DEADLINE,
            sleeper: Arc::new(TokioSleeper),
        })
    }

    /// Bounds one `fetch_commit_diff` call, retries and backoff included.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Replaces the clock used between attempts.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn commit_url(&self, repository: &str, sha: &str) -> String {
        format!("{}/repos/{}/commits/{}", self.base_url, repository, sha)
    }

    async fn fetch_once(&self, url: &str) -> Result<CommitDiff, FetchError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, ACCEPT_V3_JSON)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

fn is_commit_id(sha: &str) -> bool {
    (4..=64).contains(&sha.len()) && sha.bytes().all(|b| b.is_ascii_hexdigit())
}

#[async_trait]
impl CommitFetcher for GitHubClient {
    #[instrument(skip(self))]
    async fn fetch_commit_diff(
        &self,
        repository: &str,
        sha: &str,
    ) -> Result<CommitDiff, FetchError> {
        if !is_commit_id(sha) {
            return Err(FetchError::InvalidCommitId(sha.to_string()));
        }

        let url = self.commit_url(repository, sha);
        let attempts = retry_with_backoff(
            &self.retry,
            self.sleeper.as_ref(),
            FetchError::is_retryable,
            |attempt| {
                debug!(attempt, %url, "Fetching commit diff");
                self.fetch_once(&url)
            },
        );
        let diff = tokio::time::timeout(self.deadline, attempts)
            .await
            .map_err(|_| FetchError::DeadlineExceeded(self.deadline))??;

        debug!(files = diff.files.len(), "Fetched commit diff");
        Ok(diff)
    }
}
