use serde::Serialize;

use crate::config::{AppConfig, EnvCredentials};
use crate::log_sink::LogEntry;
use crate::runner::BotRunner;

/// Shared state behind every dashboard route: the one session this process
/// serves, plus the settings it was started with.
pub struct DashboardState {
    pub config: AppConfig,
    pub credentials: EnvCredentials,
    pub runner: BotRunner,
}

impl DashboardState {
    pub fn new(config: AppConfig, credentials: EnvCredentials, runner: BotRunner) -> Self {
        Self {
            config,
            credentials,
            runner,
        }
    }

    /// Log lines ready for display, newest first.
    pub fn lines_newest_first(&self) -> Vec<LogLine> {
        self.runner
            .snapshot()
            .iter()
            .rev()
            .map(LogLine::from)
            .collect()
    }
}

/// A log entry as rendered in HTML and sent over the API.
#[derive(Debug, Clone, Serialize)]
pub struct LogLine {
    pub timestamp: String,
    pub level: &'static str,
    pub text: String,
}

impl From<&LogEntry> for LogLine {
    fn from(entry: &LogEntry) -> Self {
        Self {
            timestamp: entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            level: entry.level.as_str(),
            text: entry.text.clone(),
        }
    }
}
