use crate::error::PollError;
use crate::models::Poll;
use crate::registry::PollBackend;
use async_trait::async_trait;
use log::{debug, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);
pub const DEFAULT_LIMIT: usize = 8;

#[async_trait]
pub trait SuggestionSource: Send + Sync {
    async fn suggest(&self, query: &str, limit: usize) -> Result<Vec<Poll>, PollError>;
}

/// Case-insensitive match over question and tags. Inactive polls are skipped.
pub fn search_polls(polls: &[Poll], query: &str, limit: usize) -> Vec<Poll> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    polls
        .iter()
        .filter(|poll| poll.active)
        .filter(|poll| {
            poll.question.to_lowercase().contains(&needle)
                || poll.tags.iter().any(|tag| tag.to_lowercase().contains(&needle))
        })
        .take(limit)
        .cloned()
        .collect()
}

/// Suggestions served from the registry endpoint.
pub struct RegistrySource {
    backend: Arc<dyn PollBackend>,
}

impl RegistrySource {
    pub fn new(backend: Arc<dyn PollBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl SuggestionSource for RegistrySource {
    async fn suggest(&self, query: &str, limit: usize) -> Result<Vec<Poll>, PollError> {
        let snapshot = self.backend.fetch_all().await?;
        Ok(search_polls(&snapshot.polls, query, limit))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Suggestions {
    pub query: String,
    pub polls: Vec<Poll>,
    pub unavailable: bool,
}

/// Search-as-you-type. Each input replaces the pending one; only the
/// latest query can publish.
pub struct SuggestionSearch {
    source: Arc<dyn SuggestionSource>,
    delay: Duration,
    limit: usize,
    generation: Arc<AtomicU64>,
    pending: Mutex<Option<JoinHandle<()>>>,
    results: Arc<watch::Sender<Suggestions>>,
}

impl SuggestionSearch {
    pub fn new(source: Arc<dyn SuggestionSource>, delay: Duration, limit: usize) -> Self {
        let (results, _) = watch::channel(Suggestions::default());
        Self {
            source,
            delay,
            limit,
            generation: Arc::new(AtomicU64::new(0)),
            pending: Mutex::new(None),
            results: Arc::new(results),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Suggestions> {
        self.results.subscribe()
    }

    pub fn latest(&self) -> Suggestions {
        self.results.borrow().clone()
    }

    fn replace_pending(&self, task: Option<JoinHandle<()>>) {
        let mut pending = self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(previous) = pending.take() {
            previous.abort();
        }
        *pending = task;
    }

    pub fn input(&self, query: &str) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        if query.trim().is_empty() {
            self.replace_pending(None);
            self.results.send_replace(Suggestions {
                query: query.to_string(),
                ..Default::default()
            });
            return;
        }

        let source = self.source.clone();
        let current = self.generation.clone();
        let results = self.results.clone();
        let delay = self.delay;
        let limit = self.limit;
        let query = query.to_string();

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if current.load(Ordering::SeqCst) != generation {
                return;
            }
            let outcome = source.suggest(&query, limit).await;
            if current.load(Ordering::SeqCst) != generation {
                debug!("Dropping superseded suggestions for '{}'", query);
                return;
            }
            let update = match outcome {
                Ok(polls) => Suggestions {
                    query,
                    polls,
                    unavailable: false,
                },
                Err(e) => {
                    warn!("Suggestions for '{}' unavailable: {}", query, e);
                    Suggestions {
                        query,
                        polls: Vec::new(),
                        unavailable: true,
                    }
                }
            };
            results.send_replace(update);
        });
        self.replace_pending(Some(task));
    }
}

impl Drop for SuggestionSearch {
    fn drop(&mut self) {
        self.replace_pending(None);
    }
}
