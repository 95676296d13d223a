use crate::board::{BoardOptions, DEFAULT_BOARD_COUNT, DEFAULT_FEATURED_SIZE};
use crate::error::PollError;
use crate::handlers::search::DEFAULT_DEBOUNCE;
use crate::handlers::vote::DEFAULT_WATCHDOG;
use log::{info, warn};
#[cfg(test)]
use std::collections::HashMap;
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000";
pub const DEFAULT_SITE_URL: &str = "http://localhost:3000";
pub const DEFAULT_DATABASE_URL: &str = "sqlite:poll_board.db";
pub const DEFAULT_PREFERRED: &str = "event:wedding,vehicle:party-bus,vehicle:limousine";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base: String,
    pub site_url: String,
    pub database_url: String,
    pub session_id: String,
    /// Set when the session id came from the environment and should outlive this run.
    pub resume_session: bool,
    pub board_count: usize,
    pub featured_size: usize,
    pub preferred_boards: Vec<String>,
    pub watchdog: Duration,
    pub debounce: Duration,
    pub rng_seed: Option<u64>,
}

impl Config {
    /// Reads the process environment. Call after `dotenvy::dotenv()`.
    pub fn load() -> Result<Self, PollError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    #[cfg(test)]
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, PollError> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, PollError> {
        let (session_id, resume_session) = match lookup("POLL_SESSION_ID").filter(|s| !s.trim().is_empty()) {
            Some(id) => (id, true),
            None => {
                let id = Uuid::new_v4().to_string();
                info!("POLL_SESSION_ID not set, starting session {}", id);
                (id, false)
            }
        };

        let rng_seed = match lookup("POLL_RNG_SEED") {
            Some(raw) => Some(parse_value::<u64>("POLL_RNG_SEED", &raw)?),
            None => None,
        };

        Ok(Self {
            api_base: text(&lookup, "POLL_API_BASE", DEFAULT_API_BASE),
            site_url: text(&lookup, "POLL_SITE_URL", DEFAULT_SITE_URL),
            database_url: text(&lookup, "DATABASE_URL", DEFAULT_DATABASE_URL),
            session_id,
            resume_session,
            board_count: try_load(&lookup, "POLL_BOARD_COUNT", DEFAULT_BOARD_COUNT)?,
            featured_size: try_load(&lookup, "POLL_FEATURED_SIZE", DEFAULT_FEATURED_SIZE)?,
            preferred_boards: split_list(&text(&lookup, "POLL_PREFERRED_BOARDS", DEFAULT_PREFERRED)),
            watchdog: Duration::from_millis(try_load(
                &lookup,
                "POLL_WATCHDOG_MS",
                DEFAULT_WATCHDOG.as_millis() as u64,
            )?),
            debounce: Duration::from_millis(try_load(
                &lookup,
                "POLL_DEBOUNCE_MS",
                DEFAULT_DEBOUNCE.as_millis() as u64,
            )?),
            rng_seed,
        })
    }

    pub fn board_options(&self, overrides: Option<Vec<String>>) -> BoardOptions {
        BoardOptions {
            count: self.board_count,
            featured_size: self.featured_size,
            preferred: self.preferred_boards.clone(),
            overrides,
        }
    }

    /// Store namespace for this visit's session scope.
    pub fn session_namespace(&self) -> String {
        format!("session:{}", self.session_id)
    }
}

pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn text(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key).filter(|v| !v.trim().is_empty()).unwrap_or_else(|| {
        info!("{} not set, using default: {}", key, default);
        default.to_string()
    })
}

fn try_load<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, PollError>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => parse_value(key, &raw),
        None => {
            info!("{} not set, using default: {}", key, default);
            Ok(default)
        }
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, PollError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim().parse().map_err(|e| {
        warn!("Invalid {} value '{}': {}", key, raw, e);
        PollError::Config(format!("{}: {}", key, e))
    })
}
