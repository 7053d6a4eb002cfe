use thiserror::Error;

/// Errors surfaced by [`crate::runner::BotRunner`] operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunnerError {
    #[error("a bot is already running in this session")]
    AlreadyRunning,

    #[error("no bot is running in this session")]
    NotRunning,

    #[error("bot execution failed: {0}")]
    WorkerFailure(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
