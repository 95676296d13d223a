use thiserror::Error;

#[derive(Error, Debug)]
pub enum PollError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend answered with status {0}")]
    Status(u16),

    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("Malformed payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("A vote for this poll is already being submitted")]
    VoteInProgress,

    #[error("Already voted in poll {0}")]
    AlreadyVoted(String),

    #[error("Poll {poll_id} has no option '{option}'")]
    UnknownOption { poll_id: String, option: String },

    #[error("Request aborted")]
    Aborted,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PollError {
    /// Cancellation is not a failure and must never reach the user.
    pub fn is_aborted(&self) -> bool {
        matches!(self, PollError::Aborted)
    }
}
