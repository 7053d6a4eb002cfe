use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Json, Redirect, Response},
    Form,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::state::{DashboardState, LogLine};
use super::templates;
use crate::bot::{BotConfig, LoginType};
use crate::error::RunnerError;
use crate::runner::RunState;

// ── GET / — form or running layout ───────────────────────────────────

pub async fn index(State(state): State<Arc<DashboardState>>) -> impl IntoResponse {
    templates::render_index(&state, None)
}

// ── POST /start — validate the form and start the worker ─────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StartForm {
    pub account: String,
    pub secret: String,
    pub session: String,
    pub login_type: String,
    /// Kept as text so a cleared number input reaches the handler.
    pub lifetime_secs: String,
}

pub async fn start(
    State(state): State<Arc<DashboardState>>,
    Form(form): Form<StartForm>,
) -> Response {
    match config_from_form(&state, &form).and_then(|config| state.runner.start(config)) {
        Ok(()) => Redirect::to("/").into_response(),
        Err(e) => rejected(&state, &e),
    }
}

// ── POST /stop — cancel and join the worker ──────────────────────────

pub async fn stop(State(state): State<Arc<DashboardState>>) -> Response {
    let runner_state = Arc::clone(&state);
    let result = tokio::task::spawn_blocking(move || runner_state.runner.stop())
        .await
        .unwrap_or_else(|e| Err(RunnerError::WorkerFailure(format!("stop task failed: {e}"))));

    match result {
        Ok(()) => Redirect::to("/").into_response(),
        Err(e) => rejected(&state, &e),
    }
}

// ── GET /api/status — run state as JSON ──────────────────────────────

#[derive(Serialize)]
pub struct StatusResponse {
    pub state: RunState,
    pub entries: usize,
}

pub async fn get_status(State(state): State<Arc<DashboardState>>) -> impl IntoResponse {
    Json(StatusResponse {
        state: state.runner.status(),
        entries: state.runner.sink().len(),
    })
}

// ── GET /api/status/html — HTML partial for HTMX ─────────────────────

pub async fn get_status_html(State(state): State<Arc<DashboardState>>) -> impl IntoResponse {
    Html(templates::render_status(state.runner.status()))
}

// ── GET /api/logs — JSON snapshot, oldest first ──────────────────────

pub async fn get_logs(State(state): State<Arc<DashboardState>>) -> impl IntoResponse {
    let lines: Vec<LogLine> = state.runner.snapshot().iter().map(LogLine::from).collect();
    Json(lines)
}

// ── GET /api/logs/html — HTML partial for HTMX, newest first ─────────

pub async fn get_logs_html(State(state): State<Arc<DashboardState>>) -> impl IntoResponse {
    Html(templates::render_logs(&state.lines_newest_first()))
}

// ── Helpers ──────────────────────────────────────────────────────────

fn config_from_form(state: &DashboardState, form: &StartForm) -> Result<BotConfig, RunnerError> {
    // A blank password field falls back to the one from the environment.
    let secret = match (form.secret.trim().is_empty(), &state.credentials.secret) {
        (true, Some(env_secret)) => env_secret.as_str(),
        _ => form.secret.as_str(),
    };
    let login_type = if form.login_type.trim().is_empty() {
        state.config.default_login_type()
    } else {
        form.login_type.parse::<LoginType>()?
    };
    let lifetime_secs = match form.lifetime_secs.trim() {
        "" => state.config.lifetime_secs,
        raw => raw.parse::<u64>().map_err(|_| {
            RunnerError::InvalidConfig(format!("session lifetime '{raw}' is not a number of seconds"))
        })?,
    };
    let lifetime = Duration::from_secs(lifetime_secs);
    BotConfig::new(&form.account, secret, &form.session, login_type, lifetime)
}

fn status_code(err: &RunnerError) -> StatusCode {
    match err {
        RunnerError::AlreadyRunning | RunnerError::NotRunning => StatusCode::CONFLICT,
        RunnerError::InvalidConfig(_) => StatusCode::UNPROCESSABLE_ENTITY,
        RunnerError::WorkerFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn rejected(state: &DashboardState, err: &RunnerError) -> Response {
    tracing::warn!("rejected dashboard action: {err}");
    let message = err.to_string();
    (status_code(err), templates::render_index(state, Some(&message))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::{CancelFlag, PollBot};
    use crate::config::{AppConfig, EnvCredentials};
    use crate::log_sink::LogSink;
    use crate::runner::BotRunner;

    struct Watching;

    impl PollBot for Watching {
        fn run(&self, config: &BotConfig, log: &LogSink, cancel: &CancelFlag) -> anyhow::Result<()> {
            log.append(format!("Watching {} as {}", config.session(), config.account()));
            while cancel.sleep(Duration::from_millis(10)) {}
            Ok(())
        }
    }

    fn dashboard(credentials: EnvCredentials) -> Arc<DashboardState> {
        Arc::new(DashboardState::new(
            AppConfig::default(),
            credentials,
            BotRunner::new(Arc::new(Watching)),
        ))
    }

    fn form(account: &str, secret: &str, session: &str) -> StartForm {
        StartForm {
            account: account.to_string(),
            secret: secret.to_string(),
            session: session.to_string(),
            ..StartForm::default()
        }
    }

    #[tokio::test]
    async fn test_start_then_stop() {
        let state = dashboard(EnvCredentials::default());

        let resp = start(State(state.clone()), Form(form("u", "p", "123"))).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(state.runner.status(), RunState::Running);

        let resp = stop(State(state.clone())).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(state.runner.status(), RunState::Stopped);
    }

    #[tokio::test]
    async fn test_second_start_conflicts() {
        let state = dashboard(EnvCredentials::default());
        start(State(state.clone()), Form(form("u", "p", "123"))).await;

        let resp = start(State(state.clone()), Form(form("u", "p", "123"))).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert_eq!(state.runner.status(), RunState::Running);

        stop(State(state.clone())).await;
    }

    #[tokio::test]
    async fn test_stop_when_idle_conflicts() {
        let state = dashboard(EnvCredentials::default());
        let resp = stop(State(state.clone())).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert_eq!(state.runner.status(), RunState::Idle);
    }

    #[tokio::test]
    async fn test_blank_fields_are_unprocessable() {
        let state = dashboard(EnvCredentials::default());
        let resp = start(State(state.clone()), Form(form("u", "", "123"))).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(state.runner.status(), RunState::Idle);
    }

    #[tokio::test]
    async fn test_blank_secret_falls_back_to_environment() {
        let state = dashboard(EnvCredentials {
            secret: Some("from-env".to_string()),
            ..EnvCredentials::default()
        });
        let config = config_from_form(&state, &form("u", "", "123")).unwrap();
        assert_eq!(config.secret(), "from-env");

        let config = config_from_form(&state, &form("u", "typed", "123")).unwrap();
        assert_eq!(config.secret(), "typed");
    }

    #[tokio::test]
    async fn test_form_login_type_and_lifetime() {
        let state = dashboard(EnvCredentials::default());
        let mut f = form("u", "p", "123");
        f.login_type = "uw".to_string();
        f.lifetime_secs = "120".to_string();
        let config = config_from_form(&state, &f).unwrap();
        assert_eq!(config.login_type(), LoginType::Uw);
        assert_eq!(config.lifetime(), Duration::from_secs(120));

        f.login_type = "saml".to_string();
        assert!(matches!(
            config_from_form(&state, &f),
            Err(RunnerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(status_code(&RunnerError::AlreadyRunning), StatusCode::CONFLICT);
        assert_eq!(status_code(&RunnerError::NotRunning), StatusCode::CONFLICT);
        assert_eq!(
            status_code(&RunnerError::WorkerFailure("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_blank_lifetime_uses_configured_default() {
        let state = dashboard(EnvCredentials::default());
        let mut f = form("u", "p", "123");
        f.lifetime_secs = "  ".to_string();
        let config = config_from_form(&state, &f).unwrap();
        assert_eq!(config.lifetime(), Duration::from_secs(state.config.lifetime_secs));

        let resp = start(State(state.clone()), Form(f)).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        stop(State(state.clone())).await;
    }

    #[tokio::test]
    async fn test_non_numeric_lifetime_renders_form_error() {
        let state = dashboard(EnvCredentials::default());
        let mut f = form("u", "p", "123");
        f.lifetime_secs = "soon".to_string();

        let resp = start(State(state.clone()), Form(f)).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(state.runner.status(), RunState::Idle);

        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8_lossy(&body);
        assert!(html.contains("is not a number of seconds"));
        assert!(html.contains("Start Bot"));
    }

    #[tokio::test]
    async fn test_empty_lifetime_field_is_accepted_by_extractor() {
        use axum::extract::FromRequest;

        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/start")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(axum::body::Body::from(
                "account=u&secret=p&session=123&login_type=pollev&lifetime_secs=",
            ))
            .unwrap();
        let Form(f) = Form::<StartForm>::from_request(request, &()).await.unwrap();
        assert_eq!(f.account, "u");
        assert_eq!(f.lifetime_secs, "");

        let state = dashboard(EnvCredentials::default());
        let resp = start(State(state.clone()), Form(f)).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        stop(State(state.clone())).await;
    }
}
