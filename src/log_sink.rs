use chrono::{DateTime, Local};
use parking_lot::Mutex;
use regex::Regex;
use serde::Serialize;
use std::sync::{Arc, LazyLock};
use tokio::sync::broadcast;

/// Capacity of the live-push channel. Slow WebSocket clients that fall this
/// far behind skip entries; the polled snapshot is unaffected.
const PUSH_CAPACITY: usize = 256;

// Matches "[ERROR]" style tags as well as Python logging's " - ERROR - ".
static LEVEL_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\[|\s-\s)(DEBUG|INFO|POLL|SUCCESS|WARNING|WARN|ERROR|CRITICAL)(?:\]|\s-\s)")
        .unwrap()
});

/// Severity attached to each log line, used for colouring in the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Poll,
    Success,
    Warning,
    Error,
}

impl Level {
    /// Classify a raw line by the first level tag it carries. Untagged lines
    /// are `Info`.
    pub fn classify(line: &str) -> Self {
        let Some(tag) = LEVEL_TAG_RE.captures(line).and_then(|c| c.get(1)) else {
            return Self::Info;
        };
        match tag.as_str() {
            "DEBUG" => Self::Debug,
            "POLL" => Self::Poll,
            "SUCCESS" => Self::Success,
            "WARNING" | "WARN" => Self::Warning,
            "ERROR" | "CRITICAL" => Self::Error,
            _ => Self::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Poll => "poll",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// A single timestamped line of worker output.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub level: Level,
    pub text: String,
}

/// Ordered, append-only buffer bridging worker output to the dashboard.
///
/// Cloning a `LogSink` yields another handle to the same buffer. Appends are
/// also pushed to any live subscribers.
#[derive(Clone)]
pub struct LogSink {
    entries: Arc<Mutex<Vec<LogEntry>>>,
    events: broadcast::Sender<LogEntry>,
}

impl LogSink {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(PUSH_CAPACITY);
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
            events,
        }
    }

    /// Append a line, classifying its level from any tag it carries.
    pub fn append(&self, line: impl Into<String>) {
        let text = line.into();
        let level = Level::classify(&text);
        self.push(level, text);
    }

    /// Append a line with an explicit level.
    pub fn append_with_level(&self, level: Level, line: impl Into<String>) {
        self.push(level, line.into());
    }

    fn push(&self, level: Level, text: String) {
        tracing::debug!(target: "pollbot::worker", level = level.as_str(), "{}", text);
        let entry = LogEntry {
            timestamp: Local::now(),
            level,
            text,
        };
        self.entries.lock().push(entry.clone());
        // No subscribers is the common case.
        let _ = self.events.send(entry);
    }

    /// Copy of every entry, oldest first.
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    /// Entries appended after the first `offset` ones.
    pub fn since(&self, offset: usize) -> Vec<LogEntry> {
        let entries = self.entries.lock();
        entries.get(offset..).map(<[LogEntry]>::to_vec).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry. Only called when a new run starts.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.events.subscribe()
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}
