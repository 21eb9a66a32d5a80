use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rocket::figment::Figment;
use rocket::http::{ContentType, Status};
use rocket::serde::json::{Error as JsonError, Json};
use rocket::{get, post, routes, Build, Rocket, State};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use common::ServerConfig;

use crate::report::{RunSummary, RAW_ARTICLES_FILE, REPORT_FILE, RESULTS_FILE};
use crate::service::{AnalysisService, RunRequest};

/// Outcome of the most recent successful run.
#[derive(Debug, Clone, Serialize)]
pub struct LastRun {
    pub run_id: Uuid,
    pub finished_at: DateTime<Utc>,
    pub summary: RunSummary,
}

/// Application state stored inside Rocket managed state.
pub struct AppState {
    pub started_at: DateTime<Utc>,
    pub service: Arc<AnalysisService>,
    /// Held for the whole duration of a run, so at most one runs at a time
    pub run_guard: Mutex<()>,
    pub last_run: RwLock<Option<LastRun>>,
}

impl AppState {
    pub fn new(service: Arc<AnalysisService>) -> Self {
        Self {
            started_at: Utc::now(),
            service,
            run_guard: Mutex::new(()),
            last_run: RwLock::new(None),
        }
    }
}

/// Response structure for `/`.
#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    service: &'static str,
    uptime_seconds: i64,
    run_in_progress: bool,
    last_run: Option<LastRun>,
    endpoints: serde_json::Value,
}

#[derive(Serialize)]
struct AnalyzeResponse {
    status: &'static str,
    run_id: Uuid,
    summary: RunSummary,
    files: serde_json::Value,
}

#[derive(Serialize)]
pub struct ErrorBody {
    error: String,
}

type ApiError = (Status, Json<ErrorBody>);

fn api_error(status: Status, message: impl Into<String>) -> ApiError {
    (status, Json(ErrorBody { error: message.into() }))
}

/// Status endpoint returning uptime, last run and the route list.
#[get("/")]
async fn index(state: &State<AppState>) -> Json<StatusResponse> {
    let uptime = (Utc::now() - state.started_at).num_seconds();
    let run_in_progress = state.run_guard.try_lock().is_err();
    let last_run = state.last_run.read().await.clone();

    Json(StatusResponse {
        status: "running",
        service: "News analyzer with dual LLM validation",
        uptime_seconds: uptime,
        run_in_progress,
        last_run,
        endpoints: serde_json::json!({
            "POST /analyze": "Run full analysis pipeline",
            "GET /report": "Get latest Markdown report",
            "GET /results": "Get latest JSON results",
        }),
    })
}

#[get("/health")]
async fn health() -> &'static str {
    "OK"
}

/// An empty body means defaults; anything else must be a valid `RunRequest`.
fn read_run_request(body: Result<Json<RunRequest>, JsonError<'_>>) -> Result<RunRequest, ApiError> {
    match body {
        Ok(json) => Ok(json.into_inner()),
        Err(JsonError::Parse(raw, _)) if raw.trim().is_empty() => Ok(RunRequest::default()),
        Err(JsonError::Parse(_, e)) => Err(api_error(
            Status::UnprocessableEntity,
            format!("Invalid request body: {}", e),
        )),
        Err(JsonError::Io(e)) => Err(api_error(
            Status::BadRequest,
            format!("Failed to read request body: {}", e),
        )),
    }
}

/// Run the full pipeline. Body is optional: `{"query": "...", "num_articles": 10}`.
#[post("/analyze", data = "<body>")]
async fn analyze(
    state: &State<AppState>,
    body: Result<Json<RunRequest>, JsonError<'_>>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let request = read_run_request(body)?;
    let _running = state
        .run_guard
        .try_lock()
        .map_err(|_| api_error(Status::Conflict, "An analysis run is already in progress"))?;

    let report = state.service.run(request).await.map_err(|e| {
        tracing::error!(%e, "analysis run failed");
        let status = Status::from_code(e.http_status()).unwrap_or(Status::InternalServerError);
        api_error(status, e.to_string())
    })?;

    *state.last_run.write().await = Some(LastRun {
        run_id: report.run_id,
        finished_at: report.finished_at,
        summary: report.summary.clone(),
    });

    let store = state.service.store();
    Ok(Json(AnalyzeResponse {
        status: "success",
        run_id: report.run_id,
        summary: report.summary,
        files: serde_json::json!({
            "raw_articles": store.path_of(RAW_ARTICLES_FILE).display().to_string(),
            "analysis_results": store.path_of(RESULTS_FILE).display().to_string(),
            "final_report": store.path_of(REPORT_FILE).display().to_string(),
        }),
    }))
}

/// Latest Markdown report.
#[get("/report")]
async fn report(state: &State<AppState>) -> Result<(ContentType, String), ApiError> {
    match state.service.store().read_report().await {
        Ok(Some(markdown)) => Ok((ContentType::new("text", "markdown"), markdown)),
        Ok(None) => Err(api_error(Status::NotFound, "No report available. Run /analyze first.")),
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "failed to read report");
            Err(api_error(Status::InternalServerError, "Failed to read report"))
        }
    }
}

/// Latest structured results.
#[get("/results")]
async fn results(state: &State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    match state.service.store().read_results().await {
        Ok(Some(results)) => Ok(Json(results)),
        Ok(None) => Err(api_error(Status::NotFound, "No results available. Run /analyze first.")),
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "failed to read results");
            Err(api_error(Status::InternalServerError, "Failed to read results"))
        }
    }
}

/// Assemble the Rocket instance without launching it.
pub fn build_rocket(state: AppState, figment: Figment) -> Rocket<Build> {
    rocket::custom(figment)
        .manage(state)
        .mount("/", routes![index, health, analyze, report, results])
}

pub async fn launch_rocket(service: Arc<AnalysisService>, server: &ServerConfig) -> Result<()> {
    // Start from Rocket's own figment (Rocket.toml, ROCKET_* env) and apply [server] on top
    let mut fig = rocket::Config::figment();
    if let Some(bind) = &server.bind {
        fig = fig.merge(("address", bind.clone()));
    }
    if let Some(port) = server.port {
        fig = fig.merge(("port", port));
    }

    build_rocket(AppState::new(service), fig)
        .launch()
        .await
        .map_err(|e| anyhow::anyhow!("Rocket server failed: {}", e))?;
    Ok(())
}
