//! In-process stand-in for the backend API used by the tests.
//!
//! It serves the record and auth endpoints the client touches, issues real
//! HS256 tokens, and enforces the owner-only todo access the way the backend
//! does: foreign todos are filtered out of lists, hidden from views (404), and
//! refused on create (400). Posts are read-only except for superusers.
//! Deleting a user removes their todos.

use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Map, Value};

pub(crate) const TEST_SECRET: &[u8] = b"test-secret";
pub(crate) const SUPERUSER_ID: &str = "su_admin";
pub(crate) const SUPERUSER_EMAIL: &str = "admin@example.com";
pub(crate) const SUPERUSER_PASSWORD: &str = "adminpass123";

/// HS256 token for `user_id` expiring `ttl_secs` from now.
pub(crate) fn token_for(user_id: &str, ttl_secs: i64) -> String {
    let exp = time::OffsetDateTime::now_utc().unix_timestamp() + ttl_secs;
    let claims = json!({"id": user_id, "type": "auth", "collectionId": "_pb_users_auth_", "exp": exp});
    encode(&Header::default(), &claims, &EncodingKey::from_secret(TEST_SECRET)).expect("encode token")
}

pub(crate) fn test_user(id: &str, email: &str) -> crate::model::User {
    crate::model::User {
        id: id.to_string(),
        email: email.to_string(),
        username: None,
        verified: false,
        created: String::new(),
        updated: String::new(),
    }
}

#[derive(Default)]
pub(crate) struct FakeState {
    pub records: HashMap<String, Vec<Value>>,
    pub passwords: HashMap<String, String>,
    pub fail_posts: bool,
    pub imported: Option<Value>,
    /// `METHOD path` for every request received.
    pub requests: Vec<String>,
    /// Whether each record read carried an `Authorization` header.
    pub authorized: Vec<bool>,
    seq: u64,
}

impl FakeState {
    fn next_id(&mut self) -> (String, String) {
        self.seq += 1;
        (format!("r{:014}", self.seq), format!("2025-01-01 00:00:00.{:06}Z", self.seq))
    }

    fn collection(&mut self, name: &str) -> &mut Vec<Value> {
        self.records.entry(name.to_string()).or_default()
    }
}

type Shared = Arc<Mutex<FakeState>>;

pub(crate) struct FakeBackend {
    pub url: String,
    pub state: Shared,
}

impl FakeBackend {
    pub(crate) async fn spawn() -> Self {
        let state: Shared = Arc::new(Mutex::new(FakeState::default()));
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake backend");
        listener.set_nonblocking(true).expect("nonblocking");
        let addr = listener.local_addr().expect("local addr");
        let app = router(state.clone());
        tokio::spawn(async move {
            axum::Server::from_tcp(listener)
                .expect("from_tcp")
                .serve(app.into_make_service())
                .await
                .expect("fake backend");
        });
        Self {
            url: format!("http://{addr}"),
            state,
        }
    }

    /// Insert a user directly and return its id.
    pub(crate) fn add_user(&self, email: &str, password: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let (id, stamp) = state.next_id();
        let record = json!({"id": id, "email": email, "verified": true, "created": stamp, "updated": stamp});
        state.collection("users").push(record);
        state.passwords.insert(id.clone(), password.to_string());
        id
    }

    pub(crate) fn add_record(&self, collection: &str, fields: Value) -> String {
        let mut state = self.state.lock().unwrap();
        let (id, stamp) = state.next_id();
        let mut record = fields.as_object().cloned().unwrap_or_default();
        record.insert("id".into(), json!(id));
        record.insert("created".into(), json!(stamp));
        record.insert("updated".into(), json!(stamp));
        state.collection(collection).push(Value::Object(record));
        id
    }

    pub(crate) fn count(&self, collection: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .records
            .get(collection)
            .map_or(0, Vec::len)
    }

    pub(crate) fn set_fail_posts(&self, fail: bool) {
        self.state.lock().unwrap().fail_posts = fail;
    }

    pub(crate) fn requests(&self) -> Vec<String> {
        self.state.lock().unwrap().requests.clone()
    }
}

fn router(state: Shared) -> Router {
    Router::new()
        .route("/api/collections/:collection", put(import_collections))
        .route("/api/collections/:collection/auth-with-password", post(auth_with_password))
        .route("/api/collections/:collection/auth-refresh", post(auth_refresh))
        .route("/api/collections/:collection/records", get(list).post(create))
        .route(
            "/api/collections/:collection/records/:id",
            get(view).patch(update).delete(remove),
        )
        .with_state(state)
}

fn error(status: StatusCode, message: &str, data: Value) -> axum::response::Response {
    (status, Json(json!({"status": status.as_u16(), "message": message, "data": data}))).into_response()
}

fn caller(headers: &HeaderMap) -> Option<String> {
    let token = headers.get("authorization")?.to_str().ok()?;
    let validation = jsonwebtoken::Validation::default();
    let data = jsonwebtoken::decode::<Map<String, Value>>(
        token,
        &jsonwebtoken::DecodingKey::from_secret(TEST_SECRET),
        &validation,
    )
    .ok()?;
    data.claims.get("id")?.as_str().map(str::to_string)
}

fn log(state: &mut FakeState, method: &str, path: &str) {
    state.requests.push(format!("{method} {path}"));
}

/// Whether `caller` may see `record` of `collection`.
fn visible(collection: &str, record: &Value, caller: Option<&str>) -> bool {
    match (collection, caller) {
        (_, Some(SUPERUSER_ID)) => true,
        ("todos", Some(id)) => record["user"] == id,
        ("todos", None) => false,
        ("users", Some(id)) => record["id"] == id,
        ("users", None) => false,
        _ => true,
    }
}

/// Collections whose write rules are unset, so only superusers may write.
fn superuser_writes(collection: &str, caller: Option<&str>) -> Option<axum::response::Response> {
    (collection == "posts" && caller != Some(SUPERUSER_ID))
        .then(|| error(StatusCode::FORBIDDEN, "Only superusers can perform this action.", json!({})))
}

fn matches_filter(record: &Value, filter: Option<&str>) -> bool {
    let Some(filter) = filter.filter(|f| !f.trim().is_empty()) else {
        return true;
    };
    let Some((field, value)) = filter.split_once('=') else {
        return true;
    };
    let value = value.trim().trim_matches('"');
    record[field.trim()].as_str() == Some(value)
}

async fn auth_with_password(
    State(state): State<Shared>,
    Path(collection): Path<String>,
    Json(body): Json<Value>,
) -> axum::response::Response {
    let mut state = state.lock().unwrap();
    log(&mut state, "POST", &format!("/api/collections/{collection}/auth-with-password"));
    let identity = body["identity"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();

    if collection == "_superusers" {
        if identity == SUPERUSER_EMAIL && password == SUPERUSER_PASSWORD {
            let record = json!({"id": SUPERUSER_ID, "email": SUPERUSER_EMAIL, "verified": true});
            return Json(json!({"token": token_for(SUPERUSER_ID, 3600), "record": record})).into_response();
        }
        return error(StatusCode::BAD_REQUEST, "Failed to authenticate.", json!({}));
    }

    let found = state
        .collection("users")
        .iter()
        .find(|u| u["email"] == identity)
        .cloned();
    match found {
        Some(user) if user["id"].as_str().and_then(|id| state.passwords.get(id)).map(String::as_str) == Some(password) => {
            let id = user["id"].as_str().unwrap_or_default().to_string();
            Json(json!({"token": token_for(&id, 3600), "record": user})).into_response()
        }
        _ => error(StatusCode::BAD_REQUEST, "Failed to authenticate.", json!({})),
    }
}

async fn auth_refresh(
    State(state): State<Shared>,
    Path(collection): Path<String>,
    headers: HeaderMap,
) -> axum::response::Response {
    let mut state = state.lock().unwrap();
    log(&mut state, "POST", &format!("/api/collections/{collection}/auth-refresh"));
    let Some(id) = caller(&headers) else {
        return error(StatusCode::UNAUTHORIZED, "The request requires valid record authorization token.", json!({}));
    };
    let Some(user) = state.collection(&collection).iter().find(|u| u["id"] == id.as_str()).cloned() else {
        return error(StatusCode::NOT_FOUND, "Missing auth record context.", json!({}));
    };
    Json(json!({"token": token_for(&id, 7200), "record": user})).into_response()
}

async fn import_collections(
    State(state): State<Shared>,
    Path(collection): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> axum::response::Response {
    let mut state = state.lock().unwrap();
    log(&mut state, "PUT", &format!("/api/collections/{collection}"));
    if collection != "import" {
        return error(StatusCode::NOT_FOUND, "The requested resource wasn't found.", json!({}));
    }
    if caller(&headers).as_deref() != Some(SUPERUSER_ID) {
        return error(StatusCode::FORBIDDEN, "Only superusers can perform this action.", json!({}));
    }
    state.imported = Some(body);
    StatusCode::NO_CONTENT.into_response()
}

async fn list(
    State(state): State<Shared>,
    Path(collection): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> axum::response::Response {
    let mut state = state.lock().unwrap();
    log(&mut state, "GET", &format!("/api/collections/{collection}/records"));
    state.authorized.push(headers.contains_key("authorization"));
    if collection == "posts" && state.fail_posts {
        return error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Something went wrong while processing your request.",
            json!({}),
        );
    }
    let who = caller(&headers);
    let page: usize = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(1).max(1);
    let per_page: usize = params.get("perPage").and_then(|p| p.parse().ok()).unwrap_or(30);
    let skip_total = params.get("skipTotal").is_some_and(|v| v == "1" || v == "true");

    let mut items: Vec<Value> = state
        .collection(&collection)
        .iter()
        .filter(|r| visible(&collection, r, who.as_deref()))
        .filter(|r| matches_filter(r, params.get("filter").map(String::as_str)))
        .cloned()
        .collect();
    match params.get("sort").map(String::as_str) {
        Some("-created") => items.sort_by(|a, b| b["created"].as_str().cmp(&a["created"].as_str())),
        Some("created") => items.sort_by(|a, b| a["created"].as_str().cmp(&b["created"].as_str())),
        _ => {}
    }

    let total = items.len();
    let page_items: Vec<Value> = items.into_iter().skip((page - 1) * per_page).take(per_page).collect();
    let (total_items, total_pages) = if skip_total {
        (-1, -1)
    } else {
        (total as i64, total.div_ceil(per_page.max(1)) as i64)
    };
    Json(json!({
        "page": page,
        "perPage": per_page,
        "totalItems": total_items,
        "totalPages": total_pages,
        "items": page_items,
    }))
    .into_response()
}

async fn view(
    State(state): State<Shared>,
    Path((collection, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> axum::response::Response {
    let mut state = state.lock().unwrap();
    log(&mut state, "GET", &format!("/api/collections/{collection}/records/{id}"));
    state.authorized.push(headers.contains_key("authorization"));
    let who = caller(&headers);
    let found = state
        .collection(&collection)
        .iter()
        .find(|r| r["id"] == id.as_str() && visible(&collection, r, who.as_deref()))
        .cloned();
    match found {
        Some(record) => Json(record).into_response(),
        None => error(StatusCode::NOT_FOUND, "The requested resource wasn't found.", json!({})),
    }
}

fn validate(collection: &str, body: &Map<String, Value>) -> Option<Value> {
    if collection != "todos" {
        return None;
    }
    let len = body.get("name").and_then(Value::as_str).map_or(0, |n| n.chars().count());
    if !(1..=255).contains(&len) {
        return Some(json!({"name": {"code": "validation_length_out_of_range", "message": "Must be between 1 and 255 characters."}}));
    }
    None
}

async fn create(
    State(state): State<Shared>,
    Path(collection): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> axum::response::Response {
    let mut state = state.lock().unwrap();
    log(&mut state, "POST", &format!("/api/collections/{collection}/records"));
    let who = caller(&headers);
    if let Some(denied) = superuser_writes(&collection, who.as_deref()) {
        return denied;
    }
    let mut body = body.as_object().cloned().unwrap_or_default();

    if collection == "users" {
        let email = body.get("email").and_then(Value::as_str).unwrap_or_default().to_string();
        let password = body.get("password").and_then(Value::as_str).unwrap_or_default().to_string();
        if body.get("passwordConfirm").and_then(Value::as_str) != Some(password.as_str()) {
            return error(
                StatusCode::BAD_REQUEST,
                "Failed to create record.",
                json!({"passwordConfirm": {"code": "validation_values_mismatch"}}),
            );
        }
        if state.collection("users").iter().any(|u| u["email"] == email.as_str()) {
            return error(
                StatusCode::BAD_REQUEST,
                "Failed to create record.",
                json!({"email": {"code": "validation_not_unique"}}),
            );
        }
        let (id, stamp) = state.next_id();
        let record = json!({"id": id, "email": email, "verified": false, "created": stamp, "updated": stamp});
        state.collection("users").push(record.clone());
        state.passwords.insert(id, password);
        return Json(record).into_response();
    }

    if collection == "todos" && who.as_deref() != Some(SUPERUSER_ID) {
        let owner_ok = who.is_some() && body.get("user").and_then(Value::as_str) == who.as_deref();
        if !owner_ok {
            return error(StatusCode::BAD_REQUEST, "Failed to create record.", json!({}));
        }
    }
    if let Some(data) = validate(&collection, &body) {
        return error(StatusCode::BAD_REQUEST, "Failed to create record.", data);
    }

    let (id, stamp) = state.next_id();
    body.insert("id".into(), json!(id));
    body.insert("created".into(), json!(stamp));
    body.insert("updated".into(), json!(stamp));
    let record = Value::Object(body);
    state.collection(&collection).push(record.clone());
    Json(record).into_response()
}

async fn update(
    State(state): State<Shared>,
    Path((collection, id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> axum::response::Response {
    let mut state = state.lock().unwrap();
    log(&mut state, "PATCH", &format!("/api/collections/{collection}/records/{id}"));
    let who = caller(&headers);
    if let Some(denied) = superuser_writes(&collection, who.as_deref()) {
        return denied;
    }
    let patch = body.as_object().cloned().unwrap_or_default();
    let (_, stamp) = state.next_id();
    let records = state.collection(&collection);
    let Some(record) = records
        .iter_mut()
        .find(|r| r["id"] == id.as_str() && visible(&collection, r, who.as_deref()))
    else {
        return error(StatusCode::NOT_FOUND, "The requested resource wasn't found.", json!({}));
    };
    let mut merged = record.as_object().cloned().unwrap_or_default();
    for (key, value) in patch {
        merged.insert(key, value);
    }
    if let Some(data) = validate(&collection, &merged) {
        return error(StatusCode::BAD_REQUEST, "Failed to update record.", data);
    }
    merged.insert("updated".into(), json!(stamp));
    *record = Value::Object(merged);
    Json(record.clone()).into_response()
}

async fn remove(
    State(state): State<Shared>,
    Path((collection, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> axum::response::Response {
    let mut state = state.lock().unwrap();
    log(&mut state, "DELETE", &format!("/api/collections/{collection}/records/{id}"));
    let who = caller(&headers);
    if let Some(denied) = superuser_writes(&collection, who.as_deref()) {
        return denied;
    }
    let records = state.collection(&collection);
    let Some(at) = records
        .iter()
        .position(|r| r["id"] == id.as_str() && visible(&collection, r, who.as_deref()))
    else {
        return error(StatusCode::NOT_FOUND, "The requested resource wasn't found.", json!({}));
    };
    records.remove(at);
    if collection == "users" {
        state.collection("todos").retain(|t| t["user"] != id.as_str());
        state.passwords.remove(&id);
    }
    StatusCode::NO_CONTENT.into_response()
}
