use askama::Template;

use super::state::{DashboardState, LogLine};
use crate::bot::LoginType;
use crate::runner::RunState;

// ── Askama Templates ─────────────────────────────────────────────────

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate<'a> {
    pub running: bool,
    pub state: &'a str,
    pub finished: bool,
    pub error: Option<&'a str>,
    pub account: &'a str,
    pub session: &'a str,
    pub session_from_env: bool,
    pub secret_from_env: bool,
    pub uw_selected: bool,
    pub lifetime_secs: u64,
    pub refresh_secs: u64,
    pub lines: &'a [LogLine],
}

#[derive(Template)]
#[template(path = "partials/logs.html")]
pub struct LogsTemplate<'a> {
    pub lines: &'a [LogLine],
}

#[derive(Template)]
#[template(path = "partials/status.html")]
pub struct StatusTemplate<'a> {
    pub state: &'a str,
    pub finished: bool,
}

// ── Render helpers (called from routes.rs) ───────────────────────────

pub fn render_index(state: &DashboardState, error: Option<&str>) -> axum::response::Html<String> {
    let run_state = state.runner.status();
    let lines = state.lines_newest_first();
    let creds = &state.credentials;
    let template = IndexTemplate {
        running: run_state.is_active(),
        state: run_state.as_str(),
        finished: is_finished(run_state),
        error,
        account: creds.account.as_deref().unwrap_or_default(),
        session: creds.session.as_deref().unwrap_or_default(),
        session_from_env: creds.session.is_some(),
        secret_from_env: creds.has_secret(),
        uw_selected: state.config.default_login_type() == LoginType::Uw,
        lifetime_secs: state.config.lifetime_secs,
        refresh_secs: state.config.refresh_interval().as_secs(),
        lines: &lines,
    };
    axum::response::Html(template.render().unwrap_or_else(|e| {
        let msg = e
            .to_string()
            .replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;");
        format!("<h1>Template error: {}</h1>", msg)
    }))
}

pub fn render_logs(lines: &[LogLine]) -> String {
    let template = LogsTemplate { lines };
    rendered_or_error(template.render(), "logs")
}

pub fn render_status(run_state: RunState) -> String {
    let template = StatusTemplate {
        state: run_state.as_str(),
        finished: is_finished(run_state),
    };
    rendered_or_error(template.render(), "status")
}

/// Partials are swapped in by HTMX, so a failure is logged and shown in
/// place of the fragment rather than blanking it.
fn rendered_or_error(rendered: askama::Result<String>, partial: &str) -> String {
    rendered.unwrap_or_else(|e| {
        tracing::error!("failed to render {partial} partial: {e}");
        let msg = e
            .to_string()
            .replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;");
        format!(r#"<div class="text-red-400">Template error: {}</div>"#, msg)
    })
}

fn is_finished(run_state: RunState) -> bool {
    matches!(run_state, RunState::Stopped | RunState::Failed)
}
