//! Authenticated JSON HTTP façade.
//!
//! Maps REST verbs onto the store port and wraps every result in the uniform
//! envelope `{"success": bool, "data"?: T, "error"?: string}`.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/api/tasks` | List tasks (`status`, `assignedTo`, `priority` filters) |
//! | `POST`   | `/api/tasks` | Create a task |
//! | `GET`    | `/api/tasks/search?q=` | Substring search |
//! | `GET`    | `/api/tasks/{id}` | Fetch one task |
//! | `PUT`    | `/api/tasks/{id}` | Patch a task |
//! | `DELETE` | `/api/tasks/{id}` | Delete a task |
//! | *(same five + search)* | `/api/notes…` | Notes |
//! | *(same five)* | `/api/people…` | People |
//! | `GET`    | `/api/stats` | Aggregate counts |
//! | `POST`   | `/api/detect` | Heuristic task extraction |
//! | `GET`    | `/health` | Health check (no auth) |
//!
//! # Error contract
//!
//! Failures use the same envelope with `success: false`: 400 for payload
//! validation, 401 for missing/invalid credentials (with a hint naming the
//! accepted header forms), 404 for a missing id, 500 for store failures.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the browser UI can be
//! served from anywhere.

use axum::{
    extract::{FromRequest, Path, Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::auth;
use crate::config::{AuthConfig, Config};
use crate::detect;
use crate::models::{
    NewNote, NewPerson, NewTask, NotePatch, PersonPatch, TaskFilter, TaskPatch,
};
use crate::store::{self, Store};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    store: Arc<dyn Store>,
    auth: Arc<AuthConfig>,
}

/// Start the HTTP façade on the configured bind address. Runs until the
/// process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    if config.auth.is_empty() {
        anyhow::bail!(
            "refusing to serve with no credentials configured. \
             Set [auth] api_keys or [[auth.users]] in the config (or {}).",
            crate::config::API_KEY_ENV
        );
    }

    let store = store::open_store(config).await?;
    let app = build_router(store, Arc::new(config.auth.clone()));

    println!("taskdesk API listening on http://{}", config.server.bind);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the full router. Exposed separately so tests can drive the API
/// against an in-process listener.
pub fn build_router(store: Arc<dyn Store>, auth: Arc<AuthConfig>) -> Router {
    let state = AppState { store, auth };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/search", get(search_tasks))
        .route(
            "/tasks/{id}",
            get(get_task).put(update_task).delete(delete_task),
        )
        .route("/notes", get(list_notes).post(create_note))
        .route("/notes/search", get(search_notes))
        .route(
            "/notes/{id}",
            get(get_note).put(update_note).delete(delete_note),
        )
        .route("/people", get(list_people).post(create_person))
        .route(
            "/people/{id}",
            get(get_person).put(update_person).delete(delete_person),
        )
        .route("/stats", get(get_stats))
        .route("/detect", axum::routing::post(detect_task))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .nest("/api", api)
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

// ============ Envelope and errors ============

/// The uniform success envelope.
#[derive(Serialize)]
struct Envelope<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        data: Some(data),
    })
}

/// Success with no payload (used by DELETE).
fn ok_empty() -> Json<Envelope<()>> {
    Json(Envelope {
        success: true,
        data: None,
    })
}

/// Failure envelope that converts into an HTTP response.
struct AppError {
    status: StatusCode,
    message: String,
    hint: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            error: self.message,
            hint: self.hint,
        };
        (self.status, Json(body)).into_response()
    }
}

/// JSON body extractor wrapping [`Json`] so a malformed or incomplete body
/// (a missing required field included) comes back as a 400 in the uniform
/// envelope rather than axum's plain-text 422.
struct ApiJson<T>(T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(bad_request(rejection.body_text())),
        }
    }
}

/// 400 for payload/parameter validation failures.
fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        message: message.into(),
        hint: None,
    }
}

/// 404 for a missing id.
fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        message: message.into(),
        hint: None,
    }
}

/// 401 with a hint naming the accepted credential forms.
fn unauthorized() -> AppError {
    AppError {
        status: StatusCode::UNAUTHORIZED,
        message: "Unauthorized: valid API key or Basic Auth credentials required".to_string(),
        hint: Some(
            "Use the X-API-Key header, Authorization: Bearer <key>, or HTTP Basic credentials"
                .to_string(),
        ),
    }
}

/// 500 for store failures; the underlying message is surfaced.
fn internal(err: anyhow::Error) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: err.to_string(),
        hint: None,
    }
}

// ============ Auth middleware ============

/// Every `/api/*` request must carry an accepted credential. CORS preflight
/// never reaches this layer — the CORS middleware answers OPTIONS itself.
async fn require_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if auth::authenticate(&state.auth, request.headers()).is_none() {
        return Err(unauthorized());
    }
    Ok(next.run(request).await)
}

// ============ Health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ Tasks ============

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct TaskListParams {
    status: Option<String>,
    priority: Option<String>,
    assigned_to: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct SearchParams {
    q: String,
}

async fn list_tasks(
    State(state): State<AppState>,
    Query(params): Query<TaskListParams>,
) -> Result<impl IntoResponse, AppError> {
    let filter = TaskFilter::from_args(
        params.status.as_deref(),
        params.priority.as_deref(),
        params.assigned_to.as_deref(),
    )
    .map_err(|e| bad_request(e.to_string()))?;
    let tasks = state.store.list_tasks(&filter).await.map_err(internal)?;
    Ok(ok(tasks))
}

async fn create_task(
    State(state): State<AppState>,
    ApiJson(new): ApiJson<NewTask>,
) -> Result<impl IntoResponse, AppError> {
    new.validate().map_err(|e| bad_request(e.to_string()))?;
    let task = state.store.create_task(new).await.map_err(internal)?;
    Ok(ok(task))
}

async fn search_tasks(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, AppError> {
    let tasks = state.store.search_tasks(&params.q).await.map_err(internal)?;
    Ok(ok(tasks))
}

async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    match state.store.get_task(id).await.map_err(internal)? {
        Some(task) => Ok(ok(task)),
        None => Err(not_found("Task not found")),
    }
}

async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(patch): ApiJson<TaskPatch>,
) -> Result<impl IntoResponse, AppError> {
    patch.validate().map_err(|e| bad_request(e.to_string()))?;
    match state.store.update_task(id, &patch).await.map_err(internal)? {
        Some(task) => Ok(ok(task)),
        None => Err(not_found("Task not found")),
    }
}

async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if state.store.delete_task(id).await.map_err(internal)? {
        Ok(ok_empty())
    } else {
        Err(not_found("Task not found"))
    }
}

// ============ Notes ============

async fn list_notes(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let notes = state.store.list_notes().await.map_err(internal)?;
    Ok(ok(notes))
}

async fn create_note(
    State(state): State<AppState>,
    ApiJson(new): ApiJson<NewNote>,
) -> Result<impl IntoResponse, AppError> {
    new.validate().map_err(|e| bad_request(e.to_string()))?;
    let note = state.store.create_note(new).await.map_err(internal)?;
    Ok(ok(note))
}

async fn search_notes(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, AppError> {
    let notes = state.store.search_notes(&params.q).await.map_err(internal)?;
    Ok(ok(notes))
}

async fn get_note(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    match state.store.get_note(id).await.map_err(internal)? {
        Some(note) => Ok(ok(note)),
        None => Err(not_found("Note not found")),
    }
}

async fn update_note(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(patch): ApiJson<NotePatch>,
) -> Result<impl IntoResponse, AppError> {
    patch.validate().map_err(|e| bad_request(e.to_string()))?;
    match state.store.update_note(id, &patch).await.map_err(internal)? {
        Some(note) => Ok(ok(note)),
        None => Err(not_found("Note not found")),
    }
}

async fn delete_note(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if state.store.delete_note(id).await.map_err(internal)? {
        Ok(ok_empty())
    } else {
        Err(not_found("Note not found"))
    }
}

// ============ People ============

async fn list_people(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let people = state.store.list_people().await.map_err(internal)?;
    Ok(ok(people))
}

async fn create_person(
    State(state): State<AppState>,
    ApiJson(new): ApiJson<NewPerson>,
) -> Result<impl IntoResponse, AppError> {
    new.validate().map_err(|e| bad_request(e.to_string()))?;
    let person = state.store.create_person(new).await.map_err(internal)?;
    Ok(ok(person))
}

async fn get_person(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    match state.store.get_person(id).await.map_err(internal)? {
        Some(person) => Ok(ok(person)),
        None => Err(not_found("Person not found")),
    }
}

async fn update_person(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(patch): ApiJson<PersonPatch>,
) -> Result<impl IntoResponse, AppError> {
    patch.validate().map_err(|e| bad_request(e.to_string()))?;
    match state
        .store
        .update_person(id, &patch)
        .await
        .map_err(internal)?
    {
        Some(person) => Ok(ok(person)),
        None => Err(not_found("Person not found")),
    }
}

async fn delete_person(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if state.store.delete_person(id).await.map_err(internal)? {
        Ok(ok_empty())
    } else {
        Err(not_found("Person not found"))
    }
}

// ============ Stats and detection ============

async fn get_stats(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let stats = state.store.stats().await.map_err(internal)?;
    Ok(ok(stats))
}

#[derive(Deserialize)]
struct DetectRequest {
    text: String,
}

async fn detect_task(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<DetectRequest>,
) -> Result<impl IntoResponse, AppError> {
    let people = state.store.list_people().await.map_err(internal)?;
    Ok(ok(detect::detect_task(&req.text, &people)))
}
