use anyhow::{anyhow, Context, Result};
use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use wait_timeout::ChildExt;

use crate::bot::{BotConfig, CancelFlag, PollBot};
use crate::config::AppConfig;
use crate::log_sink::{Level, LogSink};

/// How long output readers may keep draining after the bot's process group
/// has been killed.
const READER_GRACE: Duration = Duration::from_secs(1);

/// Runs the external polling bot as a child process.
///
/// The configuration is handed over through environment variables
/// (`EMAIL`, `PASSWORD`, `HOST`, `LOGIN_TYPE`, `LIFETIME`), and every line the
/// process writes to stdout or stderr is appended to the log as it arrives.
/// On unix the child leads its own process group, so wrappers such as
/// `sh run.sh` or `uv run` are torn down together with the bot they launch.
pub struct ProcessBot {
    program: String,
    args: Vec<String>,
    poll_interval: Duration,
}

impl ProcessBot {
    pub fn new(program: &str, args: &[String], poll_interval: Duration) -> Self {
        Self {
            program: program.to_string(),
            args: args.to_vec(),
            poll_interval,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            &config.bot_program,
            &config.bot_args,
            Duration::from_millis(config.process_poll_millis.max(1)),
        )
    }

    fn spawn(&self, config: &BotConfig) -> Result<Child> {
        let mut command = Command::new(&self.program);
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        command
            .args(&self.args)
            .env("EMAIL", config.account())
            .env("PASSWORD", config.secret())
            .env("HOST", config.session())
            .env("LOGIN_TYPE", config.login_type().as_str())
            .env("LIFETIME", config.lifetime().as_secs().to_string())
            .env("PYTHONUNBUFFERED", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to spawn bot process: {}", self.program))
    }
}

impl PollBot for ProcessBot {
    fn run(&self, config: &BotConfig, log: &LogSink, cancel: &CancelFlag) -> Result<()> {
        let mut process = self.spawn(config)?;
        tracing::debug!(pid = process.id(), program = %self.program, "bot process spawned");

        let readers = [
            forward_lines(process.stdout.take(), log.clone(), "stdout"),
            forward_lines(process.stderr.take(), log.clone(), "stderr"),
        ];

        let status = loop {
            if cancel.is_cancelled() {
                kill_tree(&mut process);
                let _ = process.wait();
                join_readers(readers, READER_GRACE);
                log.append_with_level(Level::Info, "Bot stopped.");
                return Ok(());
            }
            match process
                .wait_timeout(self.poll_interval)
                .context("Failed to wait for bot process")?
            {
                Some(status) => break status,
                None => continue,
            }
        };

        // Strays left behind by a wrapper would hold the pipes open.
        kill_tree(&mut process);
        join_readers(readers, READER_GRACE);

        if status.success() {
            Ok(())
        } else {
            Err(anyhow!("bot process exited with {status}"))
        }
    }
}

/// Kill the bot together with everything it spawned.
#[cfg(unix)]
fn kill_tree(process: &mut Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    // The child is the group leader, so its pid is the group id.
    let group = Pid::from_raw(process.id() as i32);
    if let Err(e) = killpg(group, Signal::SIGKILL) {
        // ESRCH: the whole group is already gone.
        if e != nix::errno::Errno::ESRCH {
            tracing::warn!("failed to kill bot process group: {e}");
        }
        let _ = process.kill();
    }
}

#[cfg(not(unix))]
fn kill_tree(process: &mut Child) {
    let _ = process.kill();
}

/// Stream a child pipe into the log, one entry per line. Bytes that are not
/// valid UTF-8 are replaced rather than ending the stream.
fn forward_lines<R: Read + Send + 'static>(
    pipe: Option<R>,
    log: LogSink,
    name: &str,
) -> Option<JoinHandle<()>> {
    let pipe = pipe?;
    thread::Builder::new()
        .name(format!("poll-bot-{name}"))
        .spawn(move || {
            let mut reader = BufReader::new(pipe);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\r', '\n']);
                if !line.trim().is_empty() {
                    log.append(line);
                }
            }
        })
        .map_err(|e| tracing::warn!("could not forward bot {name}: {e}"))
        .ok()
}

/// Wait up to `grace` for the readers to drain; stragglers are detached.
fn join_readers(readers: [Option<JoinHandle<()>>; 2], grace: Duration) {
    let deadline = Instant::now() + grace;
    for reader in readers.into_iter().flatten() {
        while !reader.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        if reader.is_finished() {
            let _ = reader.join();
        } else {
            tracing::warn!("bot output reader still busy after kill, detaching it");
        }
    }
}
