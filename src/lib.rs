use anyhow::Result;
use dotenvy::dotenv;
use std::sync::Arc;

pub mod bot;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod interface;
pub mod log_sink;
pub mod process_bot;
pub mod runner;

/// Run the application: load `.env` and config, then serve the dashboard.
///
/// `host` and `port` override the values from `pollbot.toml`.
pub async fn run(host: Option<String>, port: Option<u16>) -> Result<()> {
    dotenv().ok();

    let mut config = config::AppConfig::load();
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }

    let credentials = config::EnvCredentials::from_env();
    let bot = Arc::new(process_bot::ProcessBot::from_config(&config));
    let runner = runner::BotRunner::new(bot);

    interface::print_banner();
    interface::print_startup(&config, &credentials);

    let host = config.host.clone();
    let port = config.port;
    let state = Arc::new(dashboard::DashboardState::new(config, credentials, runner));
    dashboard::start_dashboard(state, &host, port).await
}

// Re-exports for library consumers: common useful types
pub use bot::{BotConfig, CancelFlag, LoginType, PollBot};
pub use config::AppConfig;
pub use error::RunnerError;
pub use log_sink::{Level, LogEntry, LogSink};
pub use process_bot::ProcessBot;
pub use runner::{BotRunner, RunState};
