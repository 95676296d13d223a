pub mod export;
pub mod results;

use crate::models::Poll;
use serde::Serialize;

// One option line of a poll's results
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionResult {
    pub option: String,
    pub votes: u64,
    pub percent: u32,
}

// A poll joined with its counts
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub poll: Poll,
    pub options: Vec<OptionResult>,
    pub total: u64,
}

// Rows sharing a primary category
#[derive(Debug, Clone, PartialEq)]
pub struct ResultGroup {
    pub category_key: String,
    pub title: String,
    pub rows: Vec<ResultRow>,
}

impl ResultRow {
    /// Option with the most votes; the earliest option wins ties. None without votes.
    pub fn leader(&self) -> Option<&OptionResult> {
        if self.total == 0 {
            return None;
        }
        self.options
            .iter()
            .fold(None, |best: Option<&OptionResult>, o| match best {
                Some(b) if b.votes >= o.votes => Some(b),
                _ => Some(o),
            })
    }

    /// The leader's share of the vote; how much voters agree. Zero without votes.
    pub fn consensus(&self) -> u32 {
        self.leader().map(|l| l.percent).unwrap_or(0)
    }

    /// Text block listing every option, the leader in bold.
    pub fn summary(&self) -> String {
        if self.total == 0 {
            return "No votes yet.".to_string();
        }
        let leader = self.leader().map(|l| l.option.as_str());
        let mut summary = String::new();
        for result in &self.options {
            let line = if Some(result.option.as_str()) == leader {
                format!("**{}**: {} votes ({}%)", result.option, result.votes, result.percent)
            } else {
                format!("{}: {} votes ({}%)", result.option, result.votes, result.percent)
            };
            summary.push_str(&line);
            summary.push('\n');
        }
        summary.push_str(&format!("\n{} votes in total.", self.total));
        summary
    }
}
