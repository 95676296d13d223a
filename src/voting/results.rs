use crate::models::{OptionCounts, Poll, VoteCounts};
use crate::taxonomy::{self, PollMetadata};
use crate::voting::{OptionResult, ResultGroup, ResultRow};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    #[default]
    Registry,
    VotesDesc,
    Alpha,
    /// Lowest consensus first, among polls past `SETTLED_MIN_VOTES`.
    Hardest,
    /// Highest consensus first, among polls past `SETTLED_MIN_VOTES`.
    Easiest,
    /// Highest consensus first, among polls with a modest vote count.
    HiddenGems,
}

/// Vote count a poll must exceed before its consensus is ranked.
pub const SETTLED_MIN_VOTES: u64 = 10;
/// Exclusive bounds on the vote count of a hidden gem.
pub const GEM_VOTES: (u64, u64) = (5, 50);

impl SortBy {
    /// Whether a row belongs in this view at all.
    pub fn admits(self, row: &ResultRow) -> bool {
        match self {
            SortBy::Registry | SortBy::VotesDesc | SortBy::Alpha => true,
            SortBy::Hardest | SortBy::Easiest => row.total > SETTLED_MIN_VOTES,
            SortBy::HiddenGems => row.total > GEM_VOTES.0 && row.total < GEM_VOTES.1,
        }
    }
}

impl FromStr for SortBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "registry" | "" => Ok(SortBy::Registry),
            "votes_desc" | "votes" | "popular" => Ok(SortBy::VotesDesc),
            "alpha" | "alphabetical" => Ok(SortBy::Alpha),
            "hardest" => Ok(SortBy::Hardest),
            "easiest" => Ok(SortBy::Easiest),
            "hidden_gems" | "hidden-gems" | "gems" => Ok(SortBy::HiddenGems),
            other => Err(format!("unknown sort order: {}", other)),
        }
    }
}

/// Whole-number share of `count` in `total`, rounded half up. Zero when nothing was cast.
pub fn percent(count: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    ((count as f64 * 100.0) / total as f64).round().min(100.0) as u32
}

/// Sum of the counts that belong to the poll's own options, saturating at `u64::MAX`.
pub fn total_for(poll: &Poll, counts: &OptionCounts) -> u64 {
    poll.options
        .iter()
        .map(|option| counts.get(option).copied().unwrap_or(0))
        .fold(0u64, u64::saturating_add)
}

pub fn tally(poll: &Poll, counts: &OptionCounts) -> ResultRow {
    let total = total_for(poll, counts);
    let options = poll
        .options
        .iter()
        .map(|option| {
            let votes = counts.get(option).copied().unwrap_or(0);
            OptionResult {
                option: option.clone(),
                votes,
                percent: percent(votes, total),
            }
        })
        .collect();

    ResultRow {
        poll: poll.clone(),
        options,
        total,
    }
}

/// One row per registry poll in registry order; polls without counts read as zero.
pub fn build_rows(polls: &[Poll], votes: &VoteCounts) -> Vec<ResultRow> {
    let empty = OptionCounts::new();
    polls
        .iter()
        .map(|poll| tally(poll, votes.get(&poll.id).unwrap_or(&empty)))
        .collect()
}

pub fn matches_query(row: &ResultRow, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    row.poll.question.to_lowercase().contains(&needle)
        || row
            .poll
            .options
            .iter()
            .any(|option| option.to_lowercase().contains(&needle))
}

pub fn filter_rows(rows: Vec<ResultRow>, query: &str) -> Vec<ResultRow> {
    rows.into_iter()
        .filter(|row| matches_query(row, query))
        .collect()
}

pub fn sort_rows(rows: &mut [ResultRow], sort: SortBy) {
    match sort {
        SortBy::Registry => {}
        SortBy::VotesDesc => rows.sort_by(|a, b| b.total.cmp(&a.total)),
        SortBy::Alpha => rows.sort_by(|a, b| compare_questions(&a.poll.question, &b.poll.question)),
        SortBy::Hardest => rows.sort_by_key(|row| row.consensus()),
        SortBy::Easiest | SortBy::HiddenGems => rows.sort_by(|a, b| b.consensus().cmp(&a.consensus())),
    }
}

fn compare_questions(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Groups rows under their first normalized category. Groups follow catalog order
/// with the miscellaneous bucket last; rows keep their incoming order.
pub fn group_rows(rows: Vec<ResultRow>) -> Vec<ResultGroup> {
    let mut order: Vec<String> = Vec::new();
    let mut buckets: HashMap<String, Vec<ResultRow>> = HashMap::new();

    for row in rows {
        let key = taxonomy::normalize(&PollMetadata::from(&row.poll))
            .into_iter()
            .next()
            .unwrap_or_else(|| taxonomy::MISC_KEY.to_string());
        if !buckets.contains_key(&key) {
            order.push(key.clone());
        }
        buckets.entry(key).or_default().push(row);
    }

    order.sort_by(|a, b| {
        taxonomy::catalog_rank(a)
            .cmp(&taxonomy::catalog_rank(b))
            .then_with(|| (a == taxonomy::MISC_KEY).cmp(&(b == taxonomy::MISC_KEY)))
            .then_with(|| a.cmp(b))
    });

    order
        .into_iter()
        .map(|key| {
            let rows = buckets.remove(&key).unwrap_or_default();
            ResultGroup {
                title: taxonomy::title_for(&key),
                category_key: key,
                rows,
            }
        })
        .collect()
}

/// Rows for the results page: join, filter, then sort. Consensus views also
/// drop polls outside their vote-count window.
pub fn aggregate(polls: &[Poll], votes: &VoteCounts, query: &str, sort: SortBy) -> Vec<ResultRow> {
    let mut rows = filter_rows(build_rows(polls, votes), query);
    rows.retain(|row| sort.admits(row));
    sort_rows(&mut rows, sort);
    rows
}
