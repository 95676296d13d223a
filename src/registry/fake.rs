use super::{PollBackend, RegistrySnapshot};
use crate::error::PollError;
use crate::models::{OptionCounts, Poll};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Scripted in-memory backend. Votes increment the held counts the way the
/// real collaborator would.
#[derive(Default)]
pub struct FakeBackend {
    snapshot: Mutex<RegistrySnapshot>,
    pub fail_results: AtomicBool,
    pub fail_votes: AtomicBool,
    pub results_delay: Mutex<Option<Duration>>,
    pub vote_delay: Mutex<Option<Duration>>,
    pub results_calls: AtomicUsize,
    pub vote_calls: AtomicUsize,
}

impl FakeBackend {
    pub fn new(polls: Vec<Poll>) -> Self {
        Self {
            snapshot: Mutex::new(RegistrySnapshot {
                polls,
                votes: Default::default(),
            }),
            ..Default::default()
        }
    }

    pub fn with_counts(self, poll_id: &str, counts: &[(&str, u64)]) -> Self {
        self.set_counts(poll_id, counts);
        self
    }

    pub fn set_counts(&self, poll_id: &str, counts: &[(&str, u64)]) {
        let map: OptionCounts = counts.iter().map(|(o, c)| (o.to_string(), *c)).collect();
        self.snapshot.lock().unwrap().votes.insert(poll_id.to_string(), map);
    }

    pub fn counts(&self, poll_id: &str) -> OptionCounts {
        self.snapshot.lock().unwrap().counts_for(poll_id)
    }

    pub fn set_results_delay(&self, delay: Duration) {
        *self.results_delay.lock().unwrap() = Some(delay);
    }

    pub fn set_vote_delay(&self, delay: Duration) {
        *self.vote_delay.lock().unwrap() = Some(delay);
    }
}

#[async_trait]
impl PollBackend for FakeBackend {
    async fn fetch_all(&self) -> Result<RegistrySnapshot, PollError> {
        Ok(self.snapshot.lock().unwrap().clone())
    }

    async fn fetch_results(&self, poll_id: &str) -> Result<OptionCounts, PollError> {
        self.results_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.results_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_results.load(Ordering::SeqCst) {
            return Err(PollError::Status(503));
        }
        Ok(self.counts(poll_id))
    }

    async fn cast_vote(&self, poll_id: &str, option: &str) -> Result<(), PollError> {
        self.vote_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.vote_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_votes.load(Ordering::SeqCst) {
            return Err(PollError::Status(500));
        }
        let mut snapshot = self.snapshot.lock().unwrap();
        *snapshot
            .votes
            .entry(poll_id.to_string())
            .or_default()
            .entry(option.to_string())
            .or_insert(0) += 1;
        Ok(())
    }
}
