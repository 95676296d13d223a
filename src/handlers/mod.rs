pub mod search;
pub mod share;
pub mod vote;

use crate::db::KeyValueStore;
use crate::handlers::share::{EmbedMode, SiteLinks};
use crate::handlers::vote::VoteWidget;
use crate::models::{Board, FeedCard, Poll};
use crate::registry::{PollBackend, RegistrySnapshot};
use std::sync::Arc;

/// Board polls in display order (featured first), with the next break card
/// inserted after every `every` polls. Break cards rotate and never trail the feed.
pub fn compose_feed(board: &Board, breaks: &[FeedCard], every: usize) -> Vec<FeedCard> {
    let polls: Vec<&Poll> = board.featured.iter().chain(board.rest.iter()).collect();
    let mut feed = Vec::with_capacity(polls.len() + polls.len() / every.max(1));
    let mut next_break = breaks.iter().cycle();

    for (i, poll) in polls.iter().enumerate() {
        feed.push(FeedCard::Poll((*poll).clone()));
        let placed = i + 1;
        if every > 0 && placed % every == 0 && placed < polls.len() {
            if let Some(card) = next_break.next() {
                feed.push(card.clone());
            }
        }
    }
    feed
}

// Exhaustive render switch over card kinds
pub fn render_card(card: &FeedCard, links: &SiteLinks) -> Vec<String> {
    match card {
        FeedCard::Poll(poll) => {
            let mut lines = vec![format!("**{}**", poll.question)];
            for (i, option) in poll.options.iter().enumerate() {
                lines.push(format!("{}. {}", i + 1, option));
            }
            lines.push(format!("Results: {}", links.results_link(poll)));
            lines.push(format!("Embed: {}", links.embed_link(poll, EmbedMode::Live)));
            lines
        }
        FeedCard::CallToAction { title, href } => vec![format!(">> {} <{}>", title, href)],
        FeedCard::Trivia { question, answer } => {
            vec![format!("Did you know? {}", question), format!("   {}", answer)]
        }
    }
}

/// Renders a feed. Poll cards go through one vote widget hydrated from the
/// snapshot, so polls already voted on show their results.
pub async fn render_feed(
    feed: &[FeedCard],
    links: &SiteLinks,
    snapshot: &RegistrySnapshot,
    backend: Arc<dyn PollBackend>,
    profile: Arc<dyn KeyValueStore>,
) -> Vec<String> {
    let mut lines = Vec::new();
    let mut widget: Option<VoteWidget> = None;

    for card in feed {
        match card {
            FeedCard::Poll(poll) => {
                let counts = Some(snapshot.counts_for(&poll.id));
                let current = match widget.take() {
                    Some(w) => {
                        w.set_poll(poll.clone(), counts).await;
                        w
                    }
                    None => {
                        let w = VoteWidget::new(poll.clone(), backend.clone(), profile.clone());
                        w.mount(counts).await;
                        w
                    }
                };
                lines.extend(current.render(links));
                lines.push(format!("Embed: {}", links.embed_link(poll, EmbedMode::Live)));
                widget = Some(current);
            }
            other => lines.extend(render_card(other, links)),
        }
        lines.push(String::new());
    }

    if let Some(widget) = widget {
        widget.unmount();
    }
    lines
}
