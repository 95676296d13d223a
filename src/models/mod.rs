use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Votes per option label for a single poll.
pub type OptionCounts = HashMap<String, u64>;

/// Snapshot of every poll's counts, keyed by poll id.
pub type VoteCounts = HashMap<String, OptionCounts>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    pub id: String,
    pub question: String,
    pub options: Vec<String>,
    pub tags: Vec<String>,
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryGroup {
    Vehicles,
    Events,
    Features,
    Pricing,
    Safety,
    Policies,
    Operations,
    States,
    Other,
}

impl CategoryGroup {
    // Display order for grouped views
    pub const ORDER: [CategoryGroup; 9] = [
        CategoryGroup::Vehicles,
        CategoryGroup::Events,
        CategoryGroup::Features,
        CategoryGroup::Pricing,
        CategoryGroup::Safety,
        CategoryGroup::Policies,
        CategoryGroup::Operations,
        CategoryGroup::States,
        CategoryGroup::Other,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub key: String,
    pub label: String,
    pub group: CategoryGroup,
    pub synonyms: Vec<String>,
}

/// What the visitor's profile remembers about one poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientVoteState {
    pub poll_id: String,
    pub voted_option: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Board {
    pub category_key: String,
    pub featured: Vec<Poll>,
    pub rest: Vec<Poll>,
}

/// One entry of a composed feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedCard {
    Poll(Poll),
    CallToAction { title: String, href: String },
    Trivia { question: String, answer: String },
}

impl Poll {
    /// Slug when the registry has one, otherwise the id. Used in public links.
    pub fn public_handle(&self) -> &str {
        self.slug.as_deref().filter(|s| !s.is_empty()).unwrap_or(&self.id)
    }

    pub fn has_option(&self, option: &str) -> bool {
        self.options.iter().any(|o| o == option)
    }
}

#[cfg(test)]
impl Poll {
    pub fn new(id: &str, question: &str, options: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            question: question.to_string(),
            options: options.iter().map(|o| o.to_string()).collect(),
            tags: Vec::new(),
            active: true,
            slug: None,
        }
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

impl Board {
    pub fn total_polls(&self) -> usize {
        self.featured.len() + self.rest.len()
    }
}
