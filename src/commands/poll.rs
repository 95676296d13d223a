use crate::board::{BoardComposer, BoardFilter, CategoryIndex};
use crate::commands::{AppContext, ExportFormat};
use crate::error::PollError;
use crate::handlers::search::{RegistrySource, SuggestionSearch, DEFAULT_LIMIT};
use crate::handlers::share::EmbedMode;
use crate::handlers::vote::{VoteWidget, VOTE_FAILED_NOTICE};
use crate::handlers::{compose_feed, render_feed};
use crate::models::FeedCard;
use crate::taxonomy;
use crate::voting::export::{csv_filename, to_csv, to_json};
use crate::voting::results::{aggregate, group_rows, SortBy};
use crate::voting::ResultRow;
use chrono::Utc;
use log::{info, warn};
use rand::Rng;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

type CommandResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

fn break_cards(app: &AppContext) -> Vec<FeedCard> {
    vec![
        FeedCard::CallToAction {
            title: "See how everyone voted".to_string(),
            href: app.links.results_page(),
        },
        FeedCard::Trivia {
            question: "How many votes can you cast per poll?".to_string(),
            answer: "One. Your pick is remembered on this device.".to_string(),
        },
    ]
}

pub async fn handle_boards<R: Rng + ?Sized>(
    app: &AppContext,
    categories: Option<Vec<String>>,
    query: Option<String>,
    category: Option<String>,
    break_every: usize,
    rng: &mut R,
    out: &mut dyn Write,
) -> CommandResult {
    let snapshot = app.backend.fetch_all().await?;
    let index = CategoryIndex::build(&snapshot.polls);
    let composer = BoardComposer::new(app.session.as_ref(), app.config.board_options(categories));
    let boards = composer.compose(&index, rng).await;

    if boards.is_empty() {
        writeln!(out, "No polls to show yet.")?;
        return Ok(());
    }

    let filter = BoardFilter { query, category };
    let breaks = break_cards(app);
    for board in &boards {
        let board = if filter.is_empty() { board.clone() } else { filter.apply(board, &index) };
        writeln!(out, "## {} ({} polls)", taxonomy::title_for(&board.category_key), board.total_polls())?;
        if board.total_polls() == 0 {
            writeln!(out, "No polls match.")?;
            writeln!(out)?;
            continue;
        }
        let feed = compose_feed(&board, &breaks, break_every);
        let lines = render_feed(&feed, &app.links, &snapshot, app.backend.clone(), app.profile.clone()).await;
        for line in lines {
            writeln!(out, "{}", line)?;
        }
    }
    Ok(())
}

pub async fn handle_vote(app: &AppContext, poll_ref: &str, option: &str, out: &mut dyn Write) -> CommandResult {
    let snapshot = app.backend.fetch_all().await?;
    let Some(poll) = snapshot.find(poll_ref).cloned() else {
        writeln!(out, "No poll found for '{}'", poll_ref)?;
        return Ok(());
    };

    let counts = snapshot.counts_for(&poll.id);
    let widget = VoteWidget::new(poll, app.backend.clone(), app.profile.clone()).with_watchdog(app.config.watchdog);
    widget.mount(Some(counts)).await;

    match widget.vote(option).await {
        Ok(()) => info!("Vote recorded for '{}'", option),
        Err(PollError::AlreadyVoted(id)) => writeln!(out, "You already voted in poll {}.", id)?,
        Err(e @ PollError::UnknownOption { .. }) => {
            writeln!(out, "{}", e)?;
            return Ok(());
        }
        Err(e) => {
            for line in widget.render(&app.links) {
                writeln!(out, "{}", line)?;
            }
            return Err(e.into());
        }
    }

    for line in widget.render(&app.links) {
        writeln!(out, "{}", line)?;
    }
    let poll = widget.view().poll;
    writeln!(out, "Embed: {}", app.links.embed_snippet(&poll, EmbedMode::Results))?;
    Ok(())
}

fn write_row(out: &mut dyn Write, row: &ResultRow, app: &AppContext) -> std::io::Result<()> {
    writeln!(out, "### {}", row.poll.question)?;
    writeln!(out, "{}", row.summary())?;
    if row.total > 0 {
        writeln!(out, "Consensus: {}%", row.consensus())?;
    }
    writeln!(out, "{}", app.links.results_link(&row.poll))?;
    writeln!(out)
}

pub async fn handle_results(
    app: &AppContext,
    query: &str,
    sort: SortBy,
    grouped: bool,
    out: &mut dyn Write,
) -> CommandResult {
    let snapshot = app.backend.fetch_all().await?;
    let rows = aggregate(&snapshot.polls, &snapshot.votes, query, sort);
    if rows.is_empty() {
        writeln!(out, "No polls match.")?;
        return Ok(());
    }

    if grouped {
        for group in group_rows(rows) {
            writeln!(out, "## {} ({})", group.title, group.rows.len())?;
            for row in &group.rows {
                write_row(out, row, app)?;
            }
        }
    } else {
        for row in &rows {
            write_row(out, row, app)?;
        }
    }
    Ok(())
}

/// Exports the same rows `results` shows for `query` and `sort`.
pub async fn handle_export(
    app: &AppContext,
    format: ExportFormat,
    query: &str,
    sort: SortBy,
    path: Option<PathBuf>,
    save: bool,
    out: &mut dyn Write,
) -> CommandResult {
    let snapshot = app.backend.fetch_all().await?;
    let rows = aggregate(&snapshot.polls, &snapshot.votes, query, sort);
    let document = match format {
        ExportFormat::Csv => to_csv(&rows),
        ExportFormat::Json => to_json(&rows)?,
    };

    let target = match (path, save, format) {
        (Some(path), _, _) => Some(path),
        (None, true, ExportFormat::Csv) => Some(PathBuf::from(csv_filename(Utc::now().date_naive()))),
        (None, true, ExportFormat::Json) => Some(PathBuf::from(
            csv_filename(Utc::now().date_naive()).replace(".csv", ".json"),
        )),
        (None, false, _) => None,
    };

    match target {
        Some(path) => {
            std::fs::write(&path, document)?;
            info!("Exported {} polls to {}", rows.len(), path.display());
            writeln!(out, "Wrote {}", path.display())?;
        }
        None => writeln!(out, "{}", document)?,
    }
    Ok(())
}

pub async fn handle_suggest(app: &AppContext, query: &str, out: &mut dyn Write) -> CommandResult {
    let source = Arc::new(RegistrySource::new(app.backend.clone()));
    let search = SuggestionSearch::new(source, app.config.debounce, DEFAULT_LIMIT);
    let mut updates = search.subscribe();

    search.input(query);
    if query.trim().is_empty() {
        writeln!(out, "Type something to search.")?;
        return Ok(());
    }

    let wait = app.config.debounce + Duration::from_secs(30);
    if tokio::time::timeout(wait, updates.changed()).await.is_err() {
        warn!("No suggestions for '{}' within {:?}", query, wait);
    }
    let suggestions = search.latest();
    if suggestions.unavailable {
        writeln!(out, "Suggestions unavailable right now.")?;
    } else if suggestions.polls.is_empty() {
        writeln!(out, "No polls match '{}'.", query)?;
    }
    for poll in &suggestions.polls {
        writeln!(out, "{} ({})", poll.question, app.links.results_link(poll))?;
    }
    Ok(())
}
