use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-lifetime webhook counters
#[derive(Debug, Default)]
pub struct WebhookStats {
    received: AtomicU64,
    signature_failures: AtomicU64,
    ignored: AtomicU64,
    rejected: AtomicU64,
    malformed: AtomicU64,
    no_commits: AtomicU64,
    processed: AtomicU64,
    fetch_failures: AtomicU64,
    publish_failures: AtomicU64,
    dry_runs: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Received,
    SignatureFailure,
    Ignored,
    Rejected,
    Malformed,
    NoCommits,
    Processed,
    FetchFailure,
    PublishFailure,
    DryRun,
}

/// Point-in-time copy of the counters for the status endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub received: u64,
    pub signature_failures: u64,
    pub ignored: u64,
    pub rejected: u64,
    pub malformed: u64,
    pub no_commits: u64,
    pub processed: u64,
    pub fetch_failures: u64,
    pub publish_failures: u64,
    pub dry_runs: u64,
}

impl WebhookStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, counter: Counter) -> &AtomicU64 {
        match counter {
            Counter::Received => &self.received,
            Counter::SignatureFailure => &self.signature_failures,
            Counter::Ignored => &self.ignored,
            Counter::Rejected => &self.rejected,
            Counter::Malformed => &self.malformed,
            Counter::NoCommits => &self.no_commits,
            Counter::Processed => &self.processed,
            Counter::FetchFailure => &self.fetch_failures,
            Counter::PublishFailure => &self.publish_failures,
            Counter::DryRun => &self.dry_runs,
        }
    }

    pub fn incr(&self, counter: Counter) {
        self.slot(counter).fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.slot(counter).load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.get(Counter::Received),
            signature_failures: self.get(Counter::SignatureFailure),
            ignored: self.get(Counter::Ignored),
            rejected: self.get(Counter::Rejected),
            malformed: self.get(Counter::Malformed),
            no_commits: self.get(Counter::NoCommits),
            processed: self.get(Counter::Processed),
            fetch_failures: self.get(Counter::FetchFailure),
            publish_failures: self.get(Counter::PublishFailure),
            dry_runs: self.get(Counter::DryRun),
        }
    }
}
