use colored::*;

use crate::config::{AppConfig, EnvCredentials};

/// Welcome banner printed before the server starts listening.
pub fn print_banner() {
    println!("{}", "====================================".bright_cyan());
    println!("{}", "         POLLEV BOT DASHBOARD       ".bright_cyan().bold());
    println!("{}", "====================================".bright_cyan());
}

/// Summarise where the dashboard lives and what it will launch.
pub fn print_startup(config: &AppConfig, credentials: &EnvCredentials) {
    println!(
        "{} {}",
        "✓ Dashboard:".green(),
        format!("http://{}:{}", config.host, config.port).bright_white()
    );
    println!(
        "{} {} {}",
        "✓ Bot command:".green(),
        config.bot_program,
        config.bot_args.join(" ").dimmed()
    );
    if credentials.account.is_some() || credentials.has_secret() {
        println!("{}", "✓ Credentials found in environment, form pre-filled.".green());
    } else {
        println!("{}", "  No credentials in environment; enter them in the form.".dimmed());
    }
    println!("{}\n", " Press Ctrl-C to quit".dimmed());
}
