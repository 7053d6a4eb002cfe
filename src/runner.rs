use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::bot::{BotConfig, CancelFlag, PollBot};
use crate::error::RunnerError;
use crate::log_sink::{Level, LogEntry, LogSink};

/// Lifecycle of a session's worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Stopping,
    Stopped,
    Failed,
}

impl RunState {
    /// A worker thread exists and has not been joined.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Stopping)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct Worker {
    handle: JoinHandle<()>,
    cancel: CancelFlag,
}

/// Supervises at most one background worker running the external bot.
///
/// All operations take `&self`; `status()` never waits on the worker, even
/// while `stop()` is joining it on another thread.
pub struct BotRunner {
    bot: Arc<dyn PollBot>,
    sink: LogSink,
    state: Arc<Mutex<RunState>>,
    worker: Mutex<Option<Worker>>,
}

impl BotRunner {
    pub fn new(bot: Arc<dyn PollBot>) -> Self {
        Self {
            bot,
            sink: LogSink::new(),
            state: Arc::new(Mutex::new(RunState::Idle)),
            worker: Mutex::new(None),
        }
    }

    pub fn status(&self) -> RunState {
        *self.state.lock()
    }

    pub fn sink(&self) -> &LogSink {
        &self.sink
    }

    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.sink.snapshot()
    }

    /// Clear the log and spawn a worker running the bot with `config`.
    pub fn start(&self, config: BotConfig) -> Result<(), RunnerError> {
        let mut slot = self.worker.lock();
        {
            let mut state = self.state.lock();
            if state.is_active() {
                return Err(RunnerError::AlreadyRunning);
            }
            *state = RunState::Running;
        }

        // A previous worker has already exited; reap it.
        if let Some(previous) = slot.take() {
            let _ = previous.handle.join();
        }

        self.sink.clear();
        let cancel = CancelFlag::new();
        let bot = Arc::clone(&self.bot);
        let sink = self.sink.clone();
        let state = Arc::clone(&self.state);
        let worker_cancel = cancel.clone();

        tracing::info!(
            account = config.account(),
            session = config.session(),
            login_type = %config.login_type(),
            "starting bot worker"
        );

        let spawned = thread::Builder::new()
            .name("poll-bot".to_string())
            .spawn(move || run_worker(bot, config, sink, state, worker_cancel));

        match spawned {
            Ok(handle) => {
                *slot = Some(Worker { handle, cancel });
                Ok(())
            }
            Err(e) => {
                let message = format!("failed to spawn worker thread: {e}");
                self.sink.append_with_level(Level::Error, message.clone());
                *self.state.lock() = RunState::Failed;
                Err(RunnerError::WorkerFailure(message))
            }
        }
    }

    /// Signal cancellation and block until the worker has exited.
    pub fn stop(&self) -> Result<(), RunnerError> {
        let worker = {
            let mut slot = self.worker.lock();
            let mut state = self.state.lock();
            if *state != RunState::Running {
                return Err(RunnerError::NotRunning);
            }
            *state = RunState::Stopping;
            let worker = slot.take();
            if let Some(w) = &worker {
                w.cancel.cancel();
            }
            worker
        };

        tracing::info!("stop requested, waiting for bot worker to exit");
        if let Some(worker) = worker {
            if worker.handle.join().is_err() {
                tracing::error!("bot worker thread panicked while stopping");
            }
        }

        *self.state.lock() = RunState::Stopped;
        tracing::info!("bot worker stopped");
        Ok(())
    }
}

impl Drop for BotRunner {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().as_ref() {
            worker.cancel.cancel();
        }
    }
}

fn run_worker(
    bot: Arc<dyn PollBot>,
    config: BotConfig,
    sink: LogSink,
    state: Arc<Mutex<RunState>>,
    cancel: CancelFlag,
) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| bot.run(&config, &sink, &cancel)));

    let failure = match outcome {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(format!("{e:#}")),
        Err(payload) => Some(panic_message(payload.as_ref())),
    };

    // Reason must be in the log before Failed is observable.
    if let Some(message) = &failure {
        let failure = RunnerError::WorkerFailure(message.clone());
        sink.append_with_level(Level::Error, failure.to_string());
    }

    let final_state = {
        let mut state = state.lock();
        *state = match (*state, &failure) {
            (RunState::Stopping, _) => RunState::Stopped,
            (_, None) => RunState::Stopped,
            (_, Some(_)) => RunState::Failed,
        };
        *state
    };
    match &failure {
        None => tracing::info!(state = %final_state, "bot worker exited"),
        Some(message) => tracing::error!(state = %final_state, "bot worker failed: {message}"),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("worker panicked: {detail}")
}
