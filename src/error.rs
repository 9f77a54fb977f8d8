use std::io;

/// Raised while building the process configuration. Never reached per request.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration value: {0}")]
    Missing(&'static str),

    #[error("Invalid configuration value for {field}: {message}")]
    Invalid { field: &'static str, message: String },

    #[error("Failed to read config file '{path}': {source}")]
    Unreadable { path: String, source: io::Error },

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }
}

/// Failure to obtain a commit diff from the GitHub REST API
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Request to GitHub failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("GitHub API returned {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Could not decode commit response: {0}")]
    Decode(String),

    #[error("Refusing to fetch malformed commit id {0:?}")]
    InvalidCommitId(String),

    #[error("Gave up on GitHub after {0:?}")]
    DeadlineExceeded(std::time::Duration),
}

impl FetchError {
    /// Only transport failures and non-2xx answers are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Status { .. })
    }
}

/// Failure to hand the notification to the pub/sub topic
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Failed to publish to {topic}: {message}")]
    Delivery { topic: String, message: String },
}

/// Startup errors surfaced by the binary
#[derive(Debug, thiserror::Error)]
pub enum NotifierError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] FetchError),
}

/// Helper type for Results that use NotifierError
pub type Result<T> = std::result::Result<T, NotifierError>;
