pub mod api;
pub mod config;
pub mod error;
pub mod format;
pub mod github;
pub mod logging;
pub mod notifier;
pub mod notify;
pub mod retry;
pub mod stats;
pub mod utils;
pub mod webhook;

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;

use crate::notifier::PushNotifier;

pub struct AppState {
    pub notifier: PushNotifier,
    pub subscriber_count: usize,
    pub start_time: Instant,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(notifier: PushNotifier, subscriber_count: usize) -> Self {
        Self {
            notifier,
            subscriber_count,
            start_time: Instant::now(),
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<AppState>;
