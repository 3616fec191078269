//! In-process fake of the analysis service used by the client tests

use axum::extract::{Form, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// `admin:admin` in basic-auth form
const ADMIN_BASIC: &str = "Basic YWRtaW46YWRtaW4=";

#[derive(Default)]
pub struct FakeSonar {
    statuses: Mutex<VecDeque<String>>,
    measure_statuses: Mutex<VecDeque<u16>>,
    measures: Mutex<Vec<(String, String)>>,
    projects: Mutex<HashSet<String>>,
    creation_refusal: Mutex<Option<(u16, String)>>,
    failing_searches: AtomicUsize,
    failing_logins: AtomicUsize,
    failing_deletes: AtomicUsize,
    ignore_deletes: AtomicBool,
    hits: Mutex<HashMap<&'static str, usize>>,
}

impl FakeSonar {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Statuses returned by successive probes before settling on `UP`.
    /// `"garbage"` answers with a non-JSON body.
    pub fn script_statuses(&self, statuses: &[&str]) {
        let mut queue = self.statuses.lock().unwrap();
        queue.extend(statuses.iter().map(|s| s.to_string()));
    }

    /// Status codes of successive measure requests before the measures are
    /// served. `0` answers 200 with an empty list.
    pub fn script_measure_statuses(&self, statuses: &[u16]) {
        let mut queue = self.measure_statuses.lock().unwrap();
        queue.extend(statuses.iter().copied());
    }

    pub fn set_measures(&self, measures: &[(&str, &str)]) {
        *self.measures.lock().unwrap() = measures
            .iter()
            .map(|(m, v)| (m.to_string(), v.to_string()))
            .collect();
    }

    pub fn add_project(&self, key: &str) {
        self.projects.lock().unwrap().insert(key.to_string());
    }

    pub fn has_project(&self, key: &str) -> bool {
        self.projects.lock().unwrap().contains(key)
    }

    pub fn refuse_creation(&self, status: u16, message: &str) {
        *self.creation_refusal.lock().unwrap() = Some((status, message.to_string()));
    }

    pub fn fail_searches(&self, count: usize) {
        self.failing_searches.store(count, Ordering::SeqCst);
    }

    /// Answers the next `count` logins with 503
    pub fn fail_logins(&self, count: usize) {
        self.failing_logins.store(count, Ordering::SeqCst);
    }

    /// Answers the next `count` deletes with 500, leaving the project in place
    pub fn fail_deletes(&self, count: usize) {
        self.failing_deletes.store(count, Ordering::SeqCst);
    }

    pub fn ignore_deletes(&self, ignore: bool) {
        self.ignore_deletes.store(ignore, Ordering::SeqCst);
    }

    pub fn hits(&self, endpoint: &'static str) -> usize {
        self.hits.lock().unwrap().get(endpoint).copied().unwrap_or(0)
    }

    fn hit(&self, endpoint: &'static str) {
        *self.hits.lock().unwrap().entry(endpoint).or_insert(0) += 1;
    }

    /// Consumes one scripted failure from `counter`, if any is left
    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Serves the fake on an ephemeral local port and returns its base URL
pub async fn serve(fake: Arc<FakeSonar>) -> String {
    let router = Router::new()
        .route("/api/system/status", get(status))
        .route("/api/authentication/login", post(login))
        .route("/api/user_tokens/generate", post(generate_token))
        .route("/api/projects/create", post(create_project))
        .route("/api/projects/search", get(search_projects))
        .route("/api/projects/delete", post(delete_project))
        .route("/api/measures/component", get(measures))
        .with_state(fake);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    format!("http://{}", addr)
}

/// A base URL nothing listens on
pub async fn unreachable_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

type Params = Form<HashMap<String, String>>;

fn is_admin(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == ADMIN_BASIC)
}

async fn status(State(fake): State<Arc<FakeSonar>>) -> Response {
    fake.hit("status");
    let next = fake.statuses.lock().unwrap().pop_front();

    match next.as_deref() {
        Some("garbage") => (StatusCode::OK, "<html>starting</html>").into_response(),
        Some(status) => Json(json!({ "status": status })).into_response(),
        None => Json(json!({ "status": "UP" })).into_response(),
    }
}

async fn login(State(fake): State<Arc<FakeSonar>>, Form(params): Params) -> Response {
    fake.hit("login");
    if FakeSonar::take_failure(&fake.failing_logins) {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    let valid = params.get("login").map(String::as_str) == Some("admin")
        && params.get("password").map(String::as_str) == Some("admin");

    if valid {
        StatusCode::OK.into_response()
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

async fn generate_token(
    State(fake): State<Arc<FakeSonar>>,
    headers: HeaderMap,
    Form(params): Params,
) -> Response {
    fake.hit("token");
    if !is_admin(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if params.get("type").map(String::as_str) != Some("GLOBAL_ANALYSIS_TOKEN") {
        return (StatusCode::BAD_REQUEST, "unsupported token type").into_response();
    }

    Json(json!({
        "login": "admin",
        "name": params.get("name"),
        "token": "squ_fake_token",
    }))
    .into_response()
}

async fn create_project(State(fake): State<Arc<FakeSonar>>, Form(params): Params) -> Response {
    fake.hit("create");
    if let Some((status, message)) = fake.creation_refusal.lock().unwrap().clone() {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (status, message).into_response();
    }

    let key = params.get("project").cloned().unwrap_or_default();
    let mut projects = fake.projects.lock().unwrap();
    if !projects.insert(key.clone()) {
        let message = format!(
            r#"{{"errors":[{{"msg":"Could not create Project with key: \"{0}\". A similar key already exists: \"{0}\""}}]}}"#,
            key
        );
        return (StatusCode::BAD_REQUEST, message).into_response();
    }

    Json(json!({ "project": { "key": key, "name": params.get("name") } })).into_response()
}

async fn search_projects(
    State(fake): State<Arc<FakeSonar>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    fake.hit("search");
    if FakeSonar::take_failure(&fake.failing_searches) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let wanted = params.get("projects").cloned().unwrap_or_default();
    let projects = fake.projects.lock().unwrap();
    let components: Vec<_> = projects
        .iter()
        .filter(|key| **key == wanted)
        .map(|key| json!({ "key": key, "name": key }))
        .collect();

    Json(json!({ "paging": { "total": components.len() }, "components": components }))
        .into_response()
}

async fn delete_project(State(fake): State<Arc<FakeSonar>>, Form(params): Params) -> Response {
    fake.hit("delete");
    if FakeSonar::take_failure(&fake.failing_deletes) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "delete failed").into_response();
    }
    if !fake.ignore_deletes.load(Ordering::SeqCst) {
        if let Some(key) = params.get("project") {
            fake.projects.lock().unwrap().remove(key);
        }
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn measures(
    State(fake): State<Arc<FakeSonar>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    fake.hit("measures");
    let component = params.get("component").cloned().unwrap_or_default();
    let scripted = fake.measure_statuses.lock().unwrap().pop_front();

    let measures: Vec<_> = match scripted {
        Some(0) => Vec::new(),
        Some(200) | None => fake
            .measures
            .lock()
            .unwrap()
            .iter()
            .map(|(metric, value)| json!({ "metric": metric, "value": value }))
            .collect(),
        Some(400) => {
            return (
                StatusCode::BAD_REQUEST,
                r#"{"errors":[{"msg":"Unknown metric"}]}"#,
            )
                .into_response();
        }
        Some(other) => {
            let status = StatusCode::from_u16(other).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            return status.into_response();
        }
    };

    Json(json!({ "component": { "key": component, "measures": measures } })).into_response()
}
