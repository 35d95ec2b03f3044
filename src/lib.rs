mod activity;
pub mod config;
pub mod db;
pub mod errors;
mod members;
mod metrics;
pub mod models;
mod projects;
mod tasks;
mod validation;

use crate::config::{AllowedOrigins, ServerConfig};
use crate::db::Workbook;
use crate::errors::{AppError, AppResult};
use crate::models::{
    ActivityLogEntry, ActivityQuery, CreateProjectPayload, CreateTaskPayload, CreateTeamMemberPayload,
    MetricsResponse, Project, StatusResponse, Task, TaskFilters, TeamMemberView, UpdateProjectPayload,
    UpdateTaskPayload, UpdateTeamMemberPayload,
};
use anyhow::Context;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path as UrlPath, Query, State};
use axum::http::HeaderValue;
use axum::routing::get;
use axum::{Json, Router};
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

#[derive(Clone)]
pub struct AppState {
    store: Arc<Workbook>,
}

impl AppState {
    pub fn new(store: Arc<Workbook>) -> Self {
        Self { store }
    }

    /// Runs a store operation on the blocking pool; workbook I/O is synchronous.
    async fn blocking<T, F>(&self, work: F) -> AppResult<T>
    where
        F: FnOnce(&Workbook) -> AppResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || work(&store))
            .await
            .map_err(|error| AppError::Internal(format!("storage task failed: {}", error)))?
    }
}

async fn health() -> Json<StatusResponse> {
    Json(StatusResponse::ok())
}

async fn list_team_members(State(state): State<AppState>) -> AppResult<Json<Vec<TeamMemberView>>> {
    state.blocking(members::list).await.map(Json)
}

async fn get_team_member(
    State(state): State<AppState>,
    UrlPath(member_id): UrlPath<String>,
) -> AppResult<Json<TeamMemberView>> {
    state
        .blocking(move |store| members::get(store, &member_id))
        .await
        .map(Json)
}

async fn create_team_member(
    State(state): State<AppState>,
    payload: Result<Json<CreateTeamMemberPayload>, JsonRejection>,
) -> AppResult<Json<TeamMemberView>> {
    let Json(payload) = payload.map_err(invalid_body)?;
    state
        .blocking(move |store| members::create(store, payload))
        .await
        .map(Json)
}

async fn update_team_member(
    State(state): State<AppState>,
    UrlPath(member_id): UrlPath<String>,
    payload: Result<Json<UpdateTeamMemberPayload>, JsonRejection>,
) -> AppResult<Json<TeamMemberView>> {
    let Json(payload) = payload.map_err(invalid_body)?;
    state
        .blocking(move |store| members::update(store, &member_id, payload))
        .await
        .map(Json)
}

async fn delete_team_member(
    State(state): State<AppState>,
    UrlPath(member_id): UrlPath<String>,
) -> AppResult<Json<StatusResponse>> {
    state
        .blocking(move |store| members::delete(store, &member_id))
        .await
        .map(Json)
}

async fn list_projects(State(state): State<AppState>) -> AppResult<Json<Vec<Project>>> {
    state.blocking(projects::list).await.map(Json)
}

async fn get_project(
    State(state): State<AppState>,
    UrlPath(project_id): UrlPath<String>,
) -> AppResult<Json<Project>> {
    state
        .blocking(move |store| projects::get(store, &project_id))
        .await
        .map(Json)
}

async fn create_project(
    State(state): State<AppState>,
    payload: Result<Json<CreateProjectPayload>, JsonRejection>,
) -> AppResult<Json<Project>> {
    let Json(payload) = payload.map_err(invalid_body)?;
    state
        .blocking(move |store| projects::create(store, payload))
        .await
        .map(Json)
}

async fn update_project(
    State(state): State<AppState>,
    UrlPath(project_id): UrlPath<String>,
    payload: Result<Json<UpdateProjectPayload>, JsonRejection>,
) -> AppResult<Json<Project>> {
    let Json(payload) = payload.map_err(invalid_body)?;
    state
        .blocking(move |store| projects::update(store, &project_id, payload))
        .await
        .map(Json)
}

async fn delete_project(
    State(state): State<AppState>,
    UrlPath(project_id): UrlPath<String>,
) -> AppResult<Json<StatusResponse>> {
    state
        .blocking(move |store| projects::delete(store, &project_id))
        .await
        .map(Json)
}

async fn list_tasks(
    State(state): State<AppState>,
    filters: Result<Query<TaskFilters>, QueryRejection>,
) -> AppResult<Json<Vec<Task>>> {
    let Query(filters) = filters.map_err(invalid_query)?;
    state
        .blocking(move |store| tasks::list(store, &filters))
        .await
        .map(Json)
}

async fn get_task(State(state): State<AppState>, UrlPath(task_id): UrlPath<String>) -> AppResult<Json<Task>> {
    state
        .blocking(move |store| tasks::get(store, &task_id))
        .await
        .map(Json)
}

async fn create_task(
    State(state): State<AppState>,
    payload: Result<Json<CreateTaskPayload>, JsonRejection>,
) -> AppResult<Json<Task>> {
    let Json(payload) = payload.map_err(invalid_body)?;
    state
        .blocking(move |store| tasks::create(store, payload))
        .await
        .map(Json)
}

async fn update_task(
    State(state): State<AppState>,
    UrlPath(task_id): UrlPath<String>,
    payload: Result<Json<UpdateTaskPayload>, JsonRejection>,
) -> AppResult<Json<Task>> {
    let Json(payload) = payload.map_err(invalid_body)?;
    state
        .blocking(move |store| tasks::update(store, &task_id, payload))
        .await
        .map(Json)
}

async fn delete_task(
    State(state): State<AppState>,
    UrlPath(task_id): UrlPath<String>,
) -> AppResult<Json<StatusResponse>> {
    state
        .blocking(move |store| tasks::delete(store, &task_id))
        .await
        .map(Json)
}

async fn get_metrics(State(state): State<AppState>) -> AppResult<Json<MetricsResponse>> {
    state.blocking(metrics::metrics).await.map(Json)
}

async fn list_activity(
    State(state): State<AppState>,
    query: Result<Query<ActivityQuery>, QueryRejection>,
) -> AppResult<Json<Vec<ActivityLogEntry>>> {
    let Query(query) = query.map_err(invalid_query)?;
    state
        .blocking(move |store| activity::recent(store, query.limit))
        .await
        .map(Json)
}

pub fn router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/team-members", get(list_team_members).post(create_team_member))
        .route(
            "/team-members/:member_id",
            get(get_team_member).put(update_team_member).delete(delete_team_member),
        )
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/:project_id",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/:task_id", get(get_task).put(update_task).delete(delete_task))
        .route("/metrics", get(get_metrics))
        .route("/activity", get(list_activity))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `*` allows any origin without credentials; an explicit list mirrors the
/// request's method and headers and allows credentials.
pub fn cors_layer(origins: &AllowedOrigins) -> anyhow::Result<CorsLayer> {
    match origins {
        AllowedOrigins::Any => Ok(CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)),
        AllowedOrigins::List(list) => {
            let values = list
                .iter()
                .map(|origin| {
                    HeaderValue::from_str(origin)
                        .with_context(|| format!("invalid origin '{}' in ALLOWED_ORIGINS", origin))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            Ok(CorsLayer::new()
                .allow_origin(AllowOrigin::list(values))
                .allow_methods(AllowMethods::mirror_request())
                .allow_headers(AllowHeaders::mirror_request())
                .allow_credentials(true))
        }
    }
}

pub async fn run() -> anyhow::Result<()> {
    let config = ServerConfig::from_env()?;
    init_tracing(config.log_dir.as_deref())?;

    let store = Workbook::new(&config.workbook_path)
        .with_context(|| format!("failed to open workbook {}", config.workbook_path.display()))?;
    let cors = cors_layer(&config.allowed_origins)?;
    let app = router(AppState::new(Arc::new(store)), cors);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .context("failed to bind task manager server")?;
    tracing::info!(
        addr = %config.bind_addr,
        workbook = %config.workbook_path.display(),
        credentials = config.allowed_origins.allows_credentials(),
        "task manager API listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("task manager server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

fn init_tracing(log_dir: Option<&Path>) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let Some(log_dir) = log_dir else {
        return tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init()
            .map_err(|error| anyhow::anyhow!(error.to_string()));
    };

    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "task-manager.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| anyhow::anyhow!(error.to_string()))
}

fn invalid_body(rejection: JsonRejection) -> AppError {
    AppError::Validation(rejection.body_text())
}

fn invalid_query(rejection: QueryRejection) -> AppError {
    AppError::Validation(rejection.body_text())
}
