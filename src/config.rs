use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::bot::{LoginType, DEFAULT_LIFETIME};

const CONFIG_FILE: &str = "pollbot.toml";

/// Application configuration, loaded from `pollbot.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Program launched for each run of the external bot.
    pub bot_program: String,
    pub bot_args: Vec<String>,
    /// Form defaults.
    pub login_type: String,
    pub lifetime_secs: u64,
    /// How often the log viewer refreshes.
    pub refresh_interval_secs: u64,
    /// How often the worker checks for cancellation while the bot runs.
    pub process_poll_millis: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
            bot_program: "python3".to_string(),
            bot_args: vec!["main.py".to_string()],
            login_type: LoginType::default().as_str().to_string(),
            lifetime_secs: DEFAULT_LIFETIME.as_secs(),
            refresh_interval_secs: 2,
            process_poll_millis: 200,
        }
    }
}

impl AppConfig {
    /// Load configuration with the chain: `./pollbot.toml` -> `~/pollbot.toml` -> defaults.
    pub fn load() -> Self {
        let candidates = Self::config_paths();
        for path in &candidates {
            if let Ok(contents) = fs::read_to_string(path) {
                match toml::from_str::<AppConfig>(&contents) {
                    Ok(cfg) => {
                        tracing::info!("loaded configuration from {}", path.display());
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!("failed to parse {}: {}", path.display(), e);
                    }
                }
            }
        }
        Self::default()
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE)];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(CONFIG_FILE));
        }
        paths
    }

    /// Default login type for the form; unknown values fall back to pollev.
    pub fn default_login_type(&self) -> LoginType {
        self.login_type.parse().unwrap_or_default()
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }
}

/// Credentials supplied through the environment (or `.env`), used to pre-fill
/// the form. Never written anywhere.
///
/// The session code comes from `HOST`, matching the bot's own script. Many
/// shells export `HOST` as the machine name, so the form flags a pre-filled
/// session for the user to check.
#[derive(Clone, Default)]
pub struct EnvCredentials {
    pub account: Option<String>,
    pub secret: Option<String>,
    pub session: Option<String>,
}

impl EnvCredentials {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            account: read("EMAIL"),
            secret: read("PASSWORD"),
            session: read("HOST"),
        }
    }

    pub fn has_secret(&self) -> bool {
        self.secret.is_some()
    }
}

impl std::fmt::Debug for EnvCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvCredentials")
            .field("account", &self.account)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("session", &self.session)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.port, 8501);
        assert_eq!(cfg.bot_program, "python3");
        assert_eq!(cfg.bot_args, vec!["main.py"]);
        assert_eq!(cfg.login_type, "pollev");
        assert_eq!(cfg.lifetime_secs, 4800);
        assert_eq!(cfg.refresh_interval_secs, 2);
        assert_eq!(cfg.process_poll_millis, 200);
    }

    #[test]
    fn test_partial_toml_deserialize() {
        let toml_str = r#"
            port = 9000
            bot_args = ["-m", "pollevbot"]
        "#;
        let cfg: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.bot_args, vec!["-m", "pollevbot"]);
        // Other fields should be defaults
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.lifetime_secs, 4800);
    }

    #[test]
    fn test_full_toml_deserialize() {
        let toml_str = r#"
            host = "0.0.0.0"
            port = 8080
            bot_program = "/usr/bin/python3.12"
            bot_args = ["bot/main.py"]
            login_type = "uw"
            lifetime_secs = 600
            refresh_interval_secs = 5
            process_poll_millis = 50
        "#;
        let cfg: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.bot_program, "/usr/bin/python3.12");
        assert_eq!(cfg.default_login_type(), LoginType::Uw);
        assert_eq!(cfg.lifetime_secs, 600);
        assert_eq!(cfg.refresh_interval(), Duration::from_secs(5));
        assert_eq!(cfg.process_poll_millis, 50);
    }

    #[test]
    fn test_unknown_login_type_falls_back() {
        let cfg = AppConfig {
            login_type: "saml".to_string(),
            ..AppConfig::default()
        };
        assert_eq!(cfg.default_login_type(), LoginType::PollEv);
    }

    #[test]
    fn test_refresh_interval_never_zero() {
        let cfg = AppConfig {
            refresh_interval_secs: 0,
            ..AppConfig::default()
        };
        assert_eq!(cfg.refresh_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_env_credentials_lookup() {
        let vars: HashMap<&str, &str> =
            HashMap::from([("EMAIL", "u@example.edu"), ("PASSWORD", "p"), ("HOST", "  ")]);
        let creds = EnvCredentials::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(creds.account.as_deref(), Some("u@example.edu"));
        assert!(creds.has_secret());
        assert_eq!(creds.session, None);
        assert!(!format!("{creds:?}").contains("\"p\""));
    }
}
