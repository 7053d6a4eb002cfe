use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "pollbot-dashboard")]
#[command(version, about = "Web form and live log viewer for a PollEv answering bot")]
struct Cli {
    /// Address to bind (default from pollbot.toml, else 127.0.0.1)
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (default from pollbot.toml, else 8501)
    #[arg(long)]
    port: Option<u16>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();
    pollbot_dashboard::run(cli.host, cli.port).await
}
