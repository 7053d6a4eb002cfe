//! Configuration handed to the external bot and the contract it must honour.

use anyhow::Result;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::RunnerError;
use crate::log_sink::LogSink;

/// Shortest session lifetime accepted from the form.
pub const MIN_LIFETIME: Duration = Duration::from_secs(60);
pub const DEFAULT_LIFETIME: Duration = Duration::from_secs(4800);

/// How the bot authenticates against the polling service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginType {
    #[default]
    PollEv,
    /// University single sign-on.
    Uw,
}

impl LoginType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PollEv => "pollev",
            Self::Uw => "uw",
        }
    }
}

impl FromStr for LoginType {
    type Err = RunnerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pollev" => Ok(Self::PollEv),
            "uw" => Ok(Self::Uw),
            other => Err(RunnerError::InvalidConfig(format!(
                "unknown login type '{other}' (expected pollev or uw)"
            ))),
        }
    }
}

impl fmt::Display for LoginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable run configuration collected from the form.
#[derive(Clone, PartialEq, Eq)]
pub struct BotConfig {
    account: String,
    secret: String,
    session: String,
    login_type: LoginType,
    lifetime: Duration,
}

impl BotConfig {
    /// Validate and build a configuration. Account, secret and session must
    /// be non-blank; the lifetime must be at least [`MIN_LIFETIME`].
    pub fn new(
        account: &str,
        secret: &str,
        session: &str,
        login_type: LoginType,
        lifetime: Duration,
    ) -> Result<Self, RunnerError> {
        let account = account.trim();
        let session = session.trim();
        if account.is_empty() || secret.trim().is_empty() || session.is_empty() {
            return Err(RunnerError::InvalidConfig(
                "please provide username, password, and host".to_string(),
            ));
        }
        if lifetime < MIN_LIFETIME {
            return Err(RunnerError::InvalidConfig(format!(
                "session lifetime must be at least {} seconds",
                MIN_LIFETIME.as_secs()
            )));
        }
        Ok(Self {
            account: account.to_string(),
            secret: secret.to_string(),
            session: session.to_string(),
            login_type,
            lifetime,
        })
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn login_type(&self) -> LoginType {
        self.login_type
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }
}

impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("account", &self.account)
            .field("secret", &"<redacted>")
            .field("session", &self.session)
            .field("login_type", &self.login_type)
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

/// Cooperative cancellation signal shared between the runner and its worker.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` in short slices, returning early with `false`
    /// if cancellation is requested. Returns `true` when the full duration
    /// elapsed.
    pub fn sleep(&self, duration: Duration) -> bool {
        const SLICE: Duration = Duration::from_millis(50);
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep(SLICE.min(deadline - now));
        }
    }
}

/// The external polling bot, treated as an opaque collaborator.
///
/// `run` drives the bot's main loop on the calling (worker) thread. It must
/// write its human-readable progress into `log`, check `cancel` between
/// blocking calls and return `Ok(())` once cancelled. Any error it returns
/// ends the run as failed; the runner never retries.
pub trait PollBot: Send + Sync + 'static {
    fn run(&self, config: &BotConfig, log: &LogSink, cancel: &CancelFlag) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Result<BotConfig, RunnerError> {
        BotConfig::new("u", "p", "123", LoginType::PollEv, DEFAULT_LIFETIME)
    }

    #[test]
    fn test_valid_config() {
        let cfg = valid().unwrap();
        assert_eq!(cfg.account(), "u");
        assert_eq!(cfg.secret(), "p");
        assert_eq!(cfg.session(), "123");
        assert_eq!(cfg.login_type(), LoginType::PollEv);
        assert_eq!(cfg.lifetime(), DEFAULT_LIFETIME);
    }

    #[test]
    fn test_fields_are_trimmed() {
        let cfg = BotConfig::new("  u ", "p", " cs3410 ", LoginType::Uw, MIN_LIFETIME).unwrap();
        assert_eq!(cfg.account(), "u");
        assert_eq!(cfg.session(), "cs3410");
    }

    #[test]
    fn test_blank_fields_rejected() {
        for (a, s, h) in [("", "p", "h"), ("u", "  ", "h"), ("u", "p", "\t")] {
            let err = BotConfig::new(a, s, h, LoginType::PollEv, DEFAULT_LIFETIME).unwrap_err();
            assert!(matches!(err, RunnerError::InvalidConfig(_)));
        }
    }

    #[test]
    fn test_short_lifetime_rejected() {
        let err = BotConfig::new("u", "p", "h", LoginType::PollEv, Duration::from_secs(59))
            .unwrap_err();
        assert!(err.to_string().contains("at least 60 seconds"));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let cfg = BotConfig::new("u", "hunter2", "h", LoginType::PollEv, DEFAULT_LIFETIME).unwrap();
        let dbg = format!("{cfg:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn test_login_type_parse() {
        assert_eq!("pollev".parse::<LoginType>().unwrap(), LoginType::PollEv);
        assert_eq!(" UW ".parse::<LoginType>().unwrap(), LoginType::Uw);
        assert!("saml".parse::<LoginType>().is_err());
        assert_eq!(LoginType::Uw.to_string(), "uw");
    }

    #[test]
    fn test_cancel_flag_interrupts_sleep() {
        let flag = CancelFlag::new();
        let remote = flag.clone();
        let handle = std::thread::spawn(move || remote.sleep(Duration::from_secs(30)));
        flag.cancel();
        assert!(!handle.join().unwrap());
        assert!(flag.is_cancelled());
    }

    #[test]
    fn test_cancel_flag_full_sleep() {
        let flag = CancelFlag::new();
        assert!(flag.sleep(Duration::from_millis(10)));
    }
}
