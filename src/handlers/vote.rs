use crate::db::{self, KeyValueStore};
use crate::error::PollError;
use crate::handlers::share::SiteLinks;
use crate::models::{ClientVoteState, OptionCounts, Poll};
use crate::registry::PollBackend;
use crate::voting::results::{percent, total_for};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub const DEFAULT_WATCHDOG: Duration = Duration::from_millis(1500);
pub const LOADING_NOTICE: &str = "Loading poll...";
pub const OFFLINE_NOTICE: &str = "Poll service offline. Votes not available (you can still vote).";
pub const VOTE_FAILED_NOTICE: &str = "Vote failed. Try again.";
pub const YOUR_VOTE: &str = "Your vote";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetState {
    InitialLoading,
    Unvoted,
    Unavailable,
    Voting,
    Voted,
    VoteFailed,
}

impl WidgetState {
    /// Counts are on screen once a vote has been submitted.
    pub fn shows_results(self) -> bool {
        matches!(self, WidgetState::Voting | WidgetState::Voted)
    }
}

/// Point-in-time copy of a widget, for rendering and assertions.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetView {
    pub poll: Poll,
    pub state: WidgetState,
    pub counts: OptionCounts,
    pub total: u64,
    pub my_vote: Option<String>,
    pub unavailable: bool,
    pub last_error: Option<String>,
}

struct Inner {
    poll: Poll,
    state: WidgetState,
    counts: OptionCounts,
    my_vote: Option<String>,
    unavailable: bool,
    last_error: Option<String>,
    // Bumped on every mount, unmount, poll change and vote; late responses
    // carrying an older value are dropped.
    generation: u64,
    fetch: Option<JoinHandle<()>>,
    // Option counted locally while the backend has not confirmed it yet.
    pending_vote: Option<String>,
}

impl Inner {
    fn settled_state(&self) -> WidgetState {
        if self.my_vote.is_some() {
            WidgetState::Voted
        } else if self.unavailable {
            WidgetState::Unavailable
        } else {
            WidgetState::Unvoted
        }
    }

    fn abort_fetch(&mut self) {
        if let Some(handle) = self.fetch.take() {
            handle.abort();
        }
    }
}

// Clears the in-flight flag however the vote ends.
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn lock_inner(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn apply_fetch(inner: &Mutex<Inner>, generation: u64, outcome: Result<OptionCounts, PollError>) {
    let mut inner = lock_inner(inner);
    if inner.generation != generation {
        debug!("Dropping stale results for poll {}", inner.poll.id);
        return;
    }
    inner.fetch = None;

    match outcome {
        Ok(mut counts) => {
            if let Some(option) = inner.pending_vote.clone() {
                let count = counts.entry(option).or_insert(0);
                *count = count.saturating_add(1);
            }
            inner.counts = counts;
            inner.unavailable = false;
            if matches!(inner.state, WidgetState::InitialLoading | WidgetState::Unavailable) {
                inner.state = inner.settled_state();
            }
        }
        Err(e) if e.is_aborted() => {
            debug!("Results request for poll {} aborted", inner.poll.id);
        }
        Err(e) => {
            warn!("Results for poll {} unavailable: {}", inner.poll.id, e);
            inner.unavailable = true;
            if matches!(inner.state, WidgetState::InitialLoading | WidgetState::Unvoted) {
                inner.state = inner.settled_state();
            }
        }
    }
}

/// One poll on screen: loads counts, remembers the visitor's vote and submits votes.
#[derive(Clone)]
pub struct VoteWidget {
    inner: Arc<Mutex<Inner>>,
    backend: Arc<dyn PollBackend>,
    profile: Arc<dyn KeyValueStore>,
    in_flight: Arc<AtomicBool>,
    watchdog: Duration,
}

impl VoteWidget {
    pub fn new(poll: Poll, backend: Arc<dyn PollBackend>, profile: Arc<dyn KeyValueStore>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                poll,
                state: WidgetState::InitialLoading,
                counts: OptionCounts::new(),
                my_vote: None,
                unavailable: false,
                last_error: None,
                generation: 0,
                fetch: None,
                pending_vote: None,
            })),
            backend,
            profile,
            in_flight: Arc::new(AtomicBool::new(false)),
            watchdog: DEFAULT_WATCHDOG,
        }
    }

    pub fn with_watchdog(mut self, watchdog: Duration) -> Self {
        self.watchdog = watchdog;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        lock_inner(&self.inner)
    }

    pub fn state(&self) -> WidgetState {
        self.lock().state
    }

    pub fn view(&self) -> WidgetView {
        let inner = self.lock();
        WidgetView {
            poll: inner.poll.clone(),
            state: inner.state,
            total: total_for(&inner.poll, &inner.counts),
            counts: inner.counts.clone(),
            my_vote: inner.my_vote.clone(),
            unavailable: inner.unavailable,
            last_error: inner.last_error.clone(),
        }
    }

    /// Loads state for the current poll. A supplied snapshot is used as-is and
    /// skips the results request. Otherwise the request runs in the background
    /// and this returns once it settles or the watchdog fires, whichever is first.
    pub async fn mount(&self, snapshot: Option<OptionCounts>) {
        let poll = self.lock().poll.clone();
        let remembered = db::load_vote_state(self.profile.as_ref(), &poll.id).await;
        let my_vote = remembered.voted_option.filter(|option| {
            let known = poll.has_option(option);
            if !known {
                debug!("Ignoring remembered vote '{}' for poll {}", option, poll.id);
            }
            known
        });

        let generation = {
            let mut inner = self.lock();
            if inner.poll.id != poll.id {
                return;
            }
            inner.generation += 1;
            inner.abort_fetch();
            inner.my_vote = my_vote;
            inner.unavailable = false;
            inner.last_error = None;

            if let Some(counts) = snapshot {
                inner.counts = counts;
                inner.state = inner.settled_state();
                return;
            }
            inner.counts = OptionCounts::new();
            inner.state = if inner.my_vote.is_some() {
                WidgetState::Voted
            } else {
                WidgetState::InitialLoading
            };
            inner.generation
        };

        let (done_tx, done_rx) = oneshot::channel();
        let task = {
            let backend = self.backend.clone();
            let shared = self.inner.clone();
            let poll_id = poll.id.clone();
            tokio::spawn(async move {
                let outcome = backend.fetch_results(&poll_id).await;
                apply_fetch(&shared, generation, outcome);
                let _ = done_tx.send(());
            })
        };
        {
            let mut inner = self.lock();
            if inner.generation == generation {
                inner.fetch = Some(task);
            } else {
                task.abort();
            }
        }

        match tokio::time::timeout(self.watchdog, done_rx).await {
            Ok(Ok(())) => {}
            // Sender dropped unsent: the fetch task was aborted
            Ok(Err(_)) => apply_fetch(&self.inner, generation, Err(PollError::Aborted)),
            Err(_) => {
                let mut inner = self.lock();
                if inner.generation == generation && inner.state == WidgetState::InitialLoading {
                    info!("Results for poll {} still pending after {:?}, showing the poll", poll.id, self.watchdog);
                    inner.state = inner.settled_state();
                }
            }
        }
    }

    /// Cancels any outstanding request; its late answer is ignored.
    pub fn unmount(&self) {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.abort_fetch();
    }

    /// Switches the widget to another poll and mounts it.
    pub async fn set_poll(&self, poll: Poll, snapshot: Option<OptionCounts>) {
        {
            let mut inner = self.lock();
            inner.generation += 1;
            inner.abort_fetch();
            inner.poll = poll;
            inner.counts = OptionCounts::new();
            inner.my_vote = None;
            inner.pending_vote = None;
            inner.state = WidgetState::InitialLoading;
        }
        self.mount(snapshot).await;
    }

    /// Submits a vote. The choice is counted locally before the backend answers;
    /// a rejected vote is rolled back and leaves the widget retryable. A results
    /// request still pending from `mount` keeps running and lands with the local
    /// vote added on top.
    pub async fn vote(&self, option: &str) -> Result<(), PollError> {
        let (poll_id, generation, created, _guard) = {
            let mut inner = self.lock();
            if !inner.poll.has_option(option) {
                return Err(PollError::UnknownOption {
                    poll_id: inner.poll.id.clone(),
                    option: option.to_string(),
                });
            }
            if inner.state == WidgetState::Voted {
                return Err(PollError::AlreadyVoted(inner.poll.id.clone()));
            }
            if self.in_flight.swap(true, Ordering::SeqCst) {
                return Err(PollError::VoteInProgress);
            }
            let guard = InFlight(self.in_flight.clone());

            let created = !inner.counts.contains_key(option);
            let count = inner.counts.entry(option.to_string()).or_insert(0);
            *count = count.saturating_add(1);
            inner.pending_vote = Some(option.to_string());
            inner.my_vote = Some(option.to_string());
            inner.last_error = None;
            inner.state = WidgetState::Voting;
            (inner.poll.id.clone(), inner.generation, created, guard)
        };

        info!("Submitting vote for '{}' in poll {}", option, poll_id);
        if let Err(e) = self.backend.cast_vote(&poll_id, option).await {
            let mut inner = self.lock();
            if inner.generation == generation {
                inner.pending_vote = None;
                let remaining = inner.counts.get_mut(option).map(|count| {
                    *count = count.saturating_sub(1);
                    *count
                });
                if created && remaining == Some(0) {
                    inner.counts.remove(option);
                }
                inner.my_vote = None;
                inner.state = WidgetState::VoteFailed;
                inner.last_error = Some(e.to_string());
            }
            warn!("Vote for '{}' in poll {} failed: {}", option, poll_id, e);
            return Err(e);
        }

        let state = ClientVoteState {
            poll_id: poll_id.clone(),
            voted_option: Some(option.to_string()),
        };
        if let Err(e) = db::save_vote_state(self.profile.as_ref(), &state).await {
            warn!("Could not remember vote for poll {}: {}", poll_id, e);
        }

        {
            let mut inner = self.lock();
            if inner.generation == generation {
                inner.pending_vote = None;
                // Counts fetched before the vote landed are stale now
                inner.abort_fetch();
                inner.state = WidgetState::Voted;
            }
        }

        match self.backend.fetch_results(&poll_id).await {
            Ok(counts) => {
                let mut inner = self.lock();
                if inner.generation == generation {
                    inner.counts = counts;
                    inner.unavailable = false;
                }
            }
            Err(e) => warn!("Keeping local counts for poll {}, refresh failed: {}", poll_id, e),
        }
        Ok(())
    }

    /// Text rendering of the widget.
    pub fn render(&self, links: &SiteLinks) -> Vec<String> {
        let view = self.view();
        let mut lines = vec![format!("**{}**", view.poll.question)];

        if view.state == WidgetState::InitialLoading {
            lines.push(LOADING_NOTICE.to_string());
        }
        if view.unavailable {
            lines.push(OFFLINE_NOTICE.to_string());
        }

        if view.state.shows_results() {
            for option in &view.poll.options {
                let votes = view.counts.get(option).copied().unwrap_or(0);
                let mut line = format!("{}: {} ({}%)", option, votes, percent(votes, view.total));
                if view.my_vote.as_deref() == Some(option.as_str()) {
                    line.push_str(&format!(" [{}]", YOUR_VOTE));
                }
                lines.push(line);
            }
            lines.push(format!("Total votes: {}", view.total));
        } else {
            for (i, option) in view.poll.options.iter().enumerate() {
                lines.push(format!("{}. {}", i + 1, option));
            }
        }

        if view.state == WidgetState::VoteFailed {
            lines.push(VOTE_FAILED_NOTICE.to_string());
        }
        lines.push(format!("Results: {}", links.results_link(&view.poll)));
        lines
    }
}
