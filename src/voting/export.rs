use crate::voting::ResultRow;
use chrono::NaiveDate;
use serde::Serialize;

pub const CSV_HEADER: &str = "poll_id,question,option,votes,percent,total_votes";

/// Flattened (poll, option) pair as written to CSV and JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRow {
    pub poll_id: String,
    pub question: String,
    pub option: String,
    pub votes: u64,
    pub percent: u32,
    pub total_votes: u64,
}

#[derive(Debug, Serialize)]
struct ExportDocument<'a> {
    rows: &'a [ExportRow],
}

pub fn flatten(rows: &[ResultRow]) -> Vec<ExportRow> {
    rows.iter()
        .flat_map(|row| {
            row.options.iter().map(move |result| ExportRow {
                poll_id: row.poll.id.clone(),
                question: row.poll.question.clone(),
                option: result.option.clone(),
                votes: result.votes,
                percent: result.percent,
                total_votes: row.total,
            })
        })
        .collect()
}

// Always quoted; embedded quotes are doubled
fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

pub fn to_csv(rows: &[ResultRow]) -> String {
    let mut lines = vec![CSV_HEADER.to_string()];
    for row in flatten(rows) {
        lines.push(format!(
            "{},{},{},{},{}%,{}",
            quote(&row.poll_id),
            quote(&row.question),
            quote(&row.option),
            row.votes,
            row.percent,
            row.total_votes
        ));
    }
    lines.join("\n")
}

pub fn to_json(rows: &[ResultRow]) -> Result<String, serde_json::Error> {
    let flat = flatten(rows);
    serde_json::to_string_pretty(&ExportDocument { rows: &flat })
}

pub fn csv_filename(date: NaiveDate) -> String {
    format!("poll-results-{}.csv", date.format("%Y-%m-%d"))
}
