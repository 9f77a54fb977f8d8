//! Process configuration: defaults, optional TOML file, environment overrides.
//!
//! Everything is validated once at startup. Handlers only ever see a fully
//! populated [`NotifierConfig`].

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::format::DiffLimits;
use crate::github::{DEFAULT_API_BASE_URL, DEFAULT_FETCH_DEADLINE};
use crate::retry::RetryPolicy;

pub const DEFAULT_CONFIG_PATH: &str = "notifier.toml";
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_LOG_FILTER: &str = "info";
pub const MAX_RETRY_ATTEMPTS: u32 = 10;

/// Wall-clock limit the hosting platform puts on one invocation.
pub const PLATFORM_BUDGET: Duration = Duration::from_secs(30);

/// Shared webhook secret. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct WebhookSecret(String);

impl WebhookSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for WebhookSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WebhookSecret(<REDACTED>)")
    }
}

#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub server: ServerConfig,
    pub github: GitHubConfig,
    pub notification: NotificationConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
}

#[derive(Debug, Clone)]
pub struct GitHubConfig {
    /// `owner/repo` whose pushes are notified
    pub repository: String,
    pub webhook_secret: WebhookSecret,
    pub api_base_url: String,
    pub user_agent: String,
    pub request_timeout: Duration,
    /// Upper bound on one whole diff fetch, retries included
    pub fetch_deadline: Duration,
    pub retry: RetryPolicy,
}

impl GitHubConfig {
    /// Longest a single diff fetch can keep a request waiting.
    pub fn fetch_budget(&self) -> Duration {
        self.fetch_deadline.min(self.retry.worst_case(self.request_timeout))
    }
}

#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub topic_arn: String,
    /// Label such as `dev` or `prod`, shown in every message
    pub environment: String,
    pub aws_region: Option<String>,
    /// Email endpoints subscribed to the topic
    pub subscribers: Vec<String>,
    pub limits: DiffLimits,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub filter: String,
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawConfig {
    server: RawServer,
    github: RawGitHub,
    notification: RawNotification,
    logging: RawLogging,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawServer {
    bind_address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawGitHub {
    repository: Option<String>,
    webhook_secret: Option<String>,
    api_base_url: Option<String>,
    user_agent: Option<String>,
    request_timeout_secs: Option<u64>,
    fetch_deadline_secs: Option<u64>,
    retry: RawRetry,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawRetry {
    max_attempts: Option<u32>,
    initial_delay_secs: Option<f64>,
    backoff_multiplier: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawNotification {
    topic_arn: Option<String>,
    environment: Option<String>,
    aws_region: Option<String>,
    subscribers: Option<Vec<String>>,
    max_files: Option<usize>,
    max_patch_chars: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawLogging {
    filter: Option<String>,
    directory: Option<PathBuf>,
}

impl RawConfig {
    fn apply_env(&mut self, env: &impl Fn(&str) -> Option<String>) {
        let var = |name: &str| env(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = var("BIND_ADDRESS") {
            self.server.bind_address = Some(v);
        }
        if let Some(v) = var("GITHUB_REPOSITORY") {
            self.github.repository = Some(v);
        }
        if let Some(v) = env("GITHUB_WEBHOOK_SECRET").filter(|v| !v.is_empty()) {
            self.github.webhook_secret = Some(v);
        }
        if let Some(v) = var("GITHUB_API_URL") {
            self.github.api_base_url = Some(v);
        }
        if let Some(v) = var("SNS_TOPIC_ARN") {
            self.notification.topic_arn = Some(v);
        }
        if let Some(v) = var("ENVIRONMENT") {
            self.notification.environment = Some(v);
        }
        if let Some(v) = var("AWS_REGION") {
            self.notification.aws_region = Some(v);
        }
        if let Some(v) = var("NOTIFY_EMAILS") {
            self.notification.subscribers = Some(
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect(),
            );
        }
        if let Some(v) = var("LOG_DIR") {
            self.logging.directory = Some(PathBuf::from(v));
        }
    }

    fn validate(self) -> Result<NotifierConfig, ConfigError> {
        let repository = required(self.github.repository, "github.repository")?;
        if !is_owner_repo(&repository) {
            return Err(ConfigError::invalid(
                "github.repository",
                format!("'{}' is not in owner/repo form", repository),
            ));
        }

        let webhook_secret = self
            .github
            .webhook_secret
            .filter(|s| !s.is_empty())
            .map(WebhookSecret::new)
            .ok_or(ConfigError::Missing("github.webhook_secret"))?;

        let topic_arn = required(self.notification.topic_arn, "notification.topic_arn")?;
        if !topic_arn.starts_with("arn:") {
            return Err(ConfigError::invalid(
                "notification.topic_arn",
                format!("'{}' is not an ARN", topic_arn),
            ));
        }

        let environment = required(self.notification.environment, "notification.environment")?;

        let subscribers = self.notification.subscribers.unwrap_or_default();
        if let Some(bad) = subscribers.iter().find(|s| !is_email_like(s)) {
            return Err(ConfigError::invalid(
                "notification.subscribers",
                format!("'{}' is not an email address", bad),
            ));
        }

        let limits = DiffLimits {
            max_files: self.notification.max_files.unwrap_or(DiffLimits::default().max_files),
            max_patch_chars: self
                .notification
                .max_patch_chars
                .unwrap_or(DiffLimits::default().max_patch_chars),
        };
        if limits.max_files == 0 {
            return Err(ConfigError::invalid("notification.max_files", "must be at least 1"));
        }

        let request_timeout_secs = self
            .github
            .request_timeout_secs
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        if request_timeout_secs == 0 {
            return Err(ConfigError::invalid("github.request_timeout_secs", "must be positive"));
        }

        let fetch_deadline = match self.github.fetch_deadline_secs {
            Some(secs) if secs == 0 || Duration::from_secs(secs) >= PLATFORM_BUDGET => {
                return Err(ConfigError::invalid(
                    "github.fetch_deadline_secs",
                    format!("must be between 1 and {}", PLATFORM_BUDGET.as_secs() - 1),
                ));
            }
            Some(secs) => Duration::from_secs(secs),
            None => DEFAULT_FETCH_DEADLINE,
        };

        let retry = build_retry_policy(self.github.retry)?;
        if retry.total_backoff() >= fetch_deadline {
            return Err(ConfigError::invalid(
                "github.retry",
                format!(
                    "backoff of {:?} leaves no time for the last attempt within {:?}",
                    retry.total_backoff(),
                    fetch_deadline
                ),
            ));
        }

        let api_base_url = self
            .github
            .api_base_url
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        if !(api_base_url.starts_with("https://") || api_base_url.starts_with("http://")) {
            return Err(ConfigError::invalid(
                "github.api_base_url",
                format!("'{}' is not an http(s) URL", api_base_url),
            ));
        }

        Ok(NotifierConfig {
            server: ServerConfig {
                bind_address: self
                    .server
                    .bind_address
                    .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string()),
            },
            github: GitHubConfig {
                repository,
                webhook_secret,
                api_base_url,
                user_agent: self.github.user_agent.unwrap_or_else(default_user_agent),
                request_timeout: Duration::from_secs(request_timeout_secs),
                fetch_deadline,
                retry,
            },
            notification: NotificationConfig {
                topic_arn,
                environment,
                aws_region: self.notification.aws_region,
                subscribers,
                limits,
            },
            logging: LoggingConfig {
                filter: self
                    .logging
                    .filter
                    .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
                directory: self.logging.directory,
            },
        })
    }
}

fn build_retry_policy(raw: RawRetry) -> Result<RetryPolicy, ConfigError> {
    let default = RetryPolicy::default();

    let max_attempts = raw.max_attempts.unwrap_or(default.max_attempts);
    if !(1..=MAX_RETRY_ATTEMPTS).contains(&max_attempts) {
        return Err(ConfigError::invalid(
            "github.retry.max_attempts",
            format!("must be between 1 and {}", MAX_RETRY_ATTEMPTS),
        ));
    }

    let initial_delay = match raw.initial_delay_secs {
        None => default.initial_delay,
        Some(secs) => Duration::try_from_secs_f64(secs)
            .ok()
            .filter(|delay| !delay.is_zero())
            .ok_or_else(|| {
                ConfigError::invalid(
                    "github.retry.initial_delay_secs",
                    "must be a positive number of seconds",
                )
            })?,
    };

    let backoff_multiplier = raw.backoff_multiplier.unwrap_or(default.backoff_multiplier);
    if !(backoff_multiplier.is_finite() && backoff_multiplier >= 1.0) {
        return Err(ConfigError::invalid("github.retry.backoff_multiplier", "must be >= 1.0"));
    }

    Ok(RetryPolicy::new(max_attempts, initial_delay, backoff_multiplier))
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ConfigError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(field))
}

fn default_user_agent() -> String {
    format!("git-push-notify/{}", env!("CARGO_PKG_VERSION"))
}

/// `owner/repo`: exactly one slash, both halves present, no whitespace.
pub fn is_owner_repo(value: &str) -> bool {
    match value.split_once('/') {
        Some((owner, repo)) => {
            !owner.is_empty()
                && !repo.is_empty()
                && !repo.contains('/')
                && !value.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

fn is_email_like(value: &str) -> bool {
    matches!(
        value.split_once('@'),
        Some((local, domain)) if !local.is_empty() && !domain.is_empty()
    )
}

impl NotifierConfig {
    /// Builds the configuration from an optional TOML document and an environment lookup.
    pub fn from_sources(
        toml_source: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut raw: RawConfig = match toml_source {
            Some(source) => toml::from_str(source)?,
            None => RawConfig::default(),
        };
        raw.apply_env(&env);
        raw.validate()
    }
}

/// Load the configuration from `NOTIFIER_CONFIG` (or `notifier.toml` when it
/// exists) and the process environment.
pub fn load_config() -> Result<NotifierConfig, ConfigError> {
    let source = match std::env::var("NOTIFIER_CONFIG") {
        Ok(path) => Some(read_config_file(Path::new(&path))?),
        Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            Some(read_config_file(Path::new(DEFAULT_CONFIG_PATH))?)
        }
        Err(_) => None,
    };
    NotifierConfig::from_sources(source.as_deref(), |name| std::env::var(name).ok())
}

fn read_config_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
        path: path.display().to_string(),
        source,
    })
}
