//! Poll registry client.
//!
//! The backend collaborator owns polls and durable counts. This module only
//! reads them (and forwards votes), and it never trusts the payload shape:
//! anything malformed degrades to an empty collection.

#[cfg(test)]
pub mod fake;

use crate::error::PollError;
use crate::models::{OptionCounts, Poll, VoteCounts};
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::{Client, Url};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistrySnapshot {
    pub polls: Vec<Poll>,
    pub votes: VoteCounts,
}

impl RegistrySnapshot {
    pub fn counts_for(&self, poll_id: &str) -> OptionCounts {
        self.votes.get(poll_id).cloned().unwrap_or_default()
    }

    pub fn find(&self, id_or_slug: &str) -> Option<&Poll> {
        self.polls
            .iter()
            .find(|p| p.id == id_or_slug)
            .or_else(|| self.polls.iter().find(|p| p.slug.as_deref() == Some(id_or_slug)))
    }
}

#[async_trait]
pub trait PollBackend: Send + Sync {
    /// `GET /api/poll/all`
    async fn fetch_all(&self) -> Result<RegistrySnapshot, PollError>;
    /// `GET /api/poll/results/{id}`
    async fn fetch_results(&self, poll_id: &str) -> Result<OptionCounts, PollError>;
    /// `POST /api/poll/vote`
    async fn cast_vote(&self, poll_id: &str, option: &str) -> Result<(), PollError>;
}

#[derive(Serialize)]
struct VoteBody<'a> {
    poll_id: &'a str,
    option: &'a str,
}

pub struct HttpBackend {
    client: Client,
    base: Url,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Result<Self, PollError> {
        let base = Url::parse(base_url).map_err(|e| PollError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(PollError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self {
            client: Client::new(),
            base,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, PollError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| PollError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json(&self, url: Url) -> Result<Value, PollError> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PollError::Status(status.as_u16()));
        }
        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl PollBackend for HttpBackend {
    async fn fetch_all(&self) -> Result<RegistrySnapshot, PollError> {
        let url = self.endpoint(&["api", "poll", "all"])?;
        let payload = self.get_json(url).await?;
        let snapshot = parse_snapshot(&payload);
        info!(
            "Fetched registry: {} poll(s), counts for {} poll(s)",
            snapshot.polls.len(),
            snapshot.votes.len()
        );
        Ok(snapshot)
    }

    async fn fetch_results(&self, poll_id: &str) -> Result<OptionCounts, PollError> {
        let url = self.endpoint(&["api", "poll", "results", poll_id])?;
        let payload = self.get_json(url).await?;
        Ok(parse_results(&payload))
    }

    async fn cast_vote(&self, poll_id: &str, option: &str) -> Result<(), PollError> {
        let url = self.endpoint(&["api", "poll", "vote"])?;
        info!("Casting vote: poll_id={}, option={}", poll_id, option);
        let response = self
            .client
            .post(url)
            .json(&VoteBody { poll_id, option })
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            warn!("Vote for poll {} rejected with status {}", poll_id, status);
            return Err(PollError::Status(status.as_u16()));
        }
        Ok(())
    }
}

/// Accepts `{ polls, votes }`, `{ votes }` alone, or a legacy flat
/// `{ pollId: { option: count } }` mapping.
pub fn parse_snapshot(payload: &Value) -> RegistrySnapshot {
    let Some(object) = payload.as_object() else {
        warn!("Registry payload is not an object; treating as empty");
        return RegistrySnapshot::default();
    };

    let polls: Vec<Poll> = object
        .get("polls")
        .and_then(Value::as_array)
        .map(|rows| rows.iter().filter_map(parse_poll).collect())
        .unwrap_or_default();

    let votes_value = match object.get("votes") {
        Some(votes) => Some(votes),
        None if !object.contains_key("polls") => Some(payload),
        None => None,
    };
    let votes = votes_value
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter(|(_, counts)| counts.is_object())
                .map(|(poll_id, counts)| (poll_id.clone(), parse_counts(counts)))
                .collect()
        })
        .unwrap_or_default();

    RegistrySnapshot { polls, votes }
}

/// `{ results: {...} }` or the bare count map.
pub fn parse_results(payload: &Value) -> OptionCounts {
    match payload.get("results") {
        Some(results) => parse_counts(results),
        None => parse_counts(payload),
    }
}

/// Keeps only finite, non-negative numeric counts (numbers or numeric strings).
pub fn parse_counts(value: &Value) -> OptionCounts {
    let Some(map) = value.as_object() else {
        return OptionCounts::new();
    };
    map.iter()
        .filter_map(|(option, raw)| {
            let count = match raw {
                Value::Number(n) => n.as_u64().or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64)),
                Value::String(s) => s.trim().parse::<u64>().ok(),
                _ => None,
            };
            count.map(|c| (option.clone(), c))
        })
        .collect()
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(as_text).collect())
        .unwrap_or_default()
}

/// One registry row. Rows without an id, a question or two distinct options are skipped.
pub fn parse_poll(row: &Value) -> Option<Poll> {
    let id = row.get("id").or_else(|| row.get("poll_id")).and_then(as_text)?;
    let Some(question) = row.get("question").and_then(as_text) else {
        warn!("Skipping poll {} without a question", id);
        return None;
    };

    let mut options: Vec<String> = Vec::new();
    for option in string_list(row.get("options")) {
        if !options.contains(&option) {
            options.push(option);
        }
    }
    if options.len() < 2 {
        warn!("Skipping poll {} with {} distinct option(s)", id, options.len());
        return None;
    }

    Some(Poll {
        id,
        question,
        options,
        tags: string_list(row.get("tags")),
        active: row.get("active").and_then(Value::as_bool).unwrap_or(true),
        slug: row.get("slug").and_then(as_text),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_full_snapshot() {
        let payload = json!({
            "polls": [
                { "id": "p1", "question": "Limo or bus?", "options": ["Limo", "Bus"], "tags": ["limo"], "slug": "limo-or-bus" },
                { "id": 7, "question": "Inactive", "options": ["A", "B"], "tags": null, "active": false }
            ],
            "votes": { "p1": { "Limo": 3, "Bus": "1" } }
        });
        let snapshot = parse_snapshot(&payload);
        assert_eq!(snapshot.polls.len(), 2);
        assert_eq!(snapshot.polls[0].slug.as_deref(), Some("limo-or-bus"));
        assert_eq!(snapshot.polls[1].id, "7");
        assert!(snapshot.polls[1].tags.is_empty());
        assert!(!snapshot.polls[1].active);
        assert_eq!(snapshot.counts_for("p1").get("Bus"), Some(&1));
        assert!(snapshot.counts_for("missing").is_empty());
        assert_eq!(snapshot.find("limo-or-bus").map(|p| p.id.as_str()), Some("p1"));
    }

    #[test]
    fn skips_invalid_polls_and_dedupes_options() {
        let payload = json!({
            "polls": [
                { "id": "one-option", "question": "?", "options": ["A", "A"] },
                { "question": "no id", "options": ["A", "B"] },
                { "id": "dupes", "question": "Pick", "options": ["A", "B", "A", ""] }
            ]
        });
        let snapshot = parse_snapshot(&payload);
        assert_eq!(snapshot.polls.len(), 1);
        assert_eq!(snapshot.polls[0].options, vec!["A", "B"]);
        assert!(snapshot.votes.is_empty());
    }

    #[test]
    fn legacy_flat_votes_and_garbage() {
        let flat = json!({ "p1": { "A": 2 }, "note": "ignored" });
        let snapshot = parse_snapshot(&flat);
        assert!(snapshot.polls.is_empty());
        assert_eq!(snapshot.counts_for("p1").get("A"), Some(&2));
        assert!(!snapshot.votes.contains_key("note"));

        assert_eq!(parse_snapshot(&json!([1, 2, 3])), RegistrySnapshot::default());
        assert_eq!(parse_snapshot(&Value::Null), RegistrySnapshot::default());
    }

    #[test]
    fn counts_drop_negative_and_non_numeric() {
        let counts = parse_counts(&json!({ "A": 3, "B": -1, "C": "x", "D": 2.0, "E": null }));
        assert_eq!(counts.len(), 2);
        assert_eq!(counts["A"], 3);
        assert_eq!(counts["D"], 2);
    }

    #[test]
    fn results_wrapped_or_bare() {
        assert_eq!(parse_results(&json!({ "poll_id": "p1", "results": { "A": 1 } }))["A"], 1);
        assert_eq!(parse_results(&json!({ "A": 4 }))["A"], 4);
        assert!(parse_results(&json!("oops")).is_empty());
    }

    #[test]
    fn endpoints_encode_ids() {
        let backend = HttpBackend::new("http://127.0.0.1:8000/").unwrap();
        let url = backend.endpoint(&["api", "poll", "results", "a b/c"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8000/api/poll/results/a%20b%2Fc");

        let nested = HttpBackend::new("http://host/backend").unwrap();
        assert_eq!(
            nested.endpoint(&["api", "poll", "all"]).unwrap().as_str(),
            "http://host/backend/api/poll/all"
        );
        assert!(HttpBackend::new("not a url").is_err());
    }
}
