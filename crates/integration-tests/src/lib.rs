//! Integration tests for Mung Admin.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p mung-integration-tests
//! ```
//!
//! No external services are needed: [`FakeBackend`] is an in-process axum
//! server that speaks the backend's REST contract, keeps its entities in
//! memory, and records every request it receives.
//!
//! # Test Categories
//!
//! - `backend_client` - `BackendClient` paths, headers, bodies, error details
//! - `admin_*` - Admin router end to end (login, users, personas, cases,
//!   conversations, image analysis)

#![allow(clippy::missing_panics_doc)]

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use mung_admin::backend::{AccessToken, BackendClient};
use mung_admin::config::AdminConfig;
use mung_admin::state::AppState;

/// Path prefix of the REST API.
pub const API_PREFIX: &str = "/api/v1";
/// Path prefix of presigned storage URLs.
pub const STORAGE_PREFIX: &str = "/fake-storage/";

/// Operator credentials accepted by the fake.
pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "adminpassword";
/// Token issued on login.
pub const TOKEN: &str = "fake-backend-token";

/// One request as the fake saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    /// Path below [`API_PREFIX`], trailing slash preserved.
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: String,
}

impl RecordedRequest {
    /// Body parsed as JSON (`Null` when it is not JSON).
    #[must_use]
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }

    /// Body parsed as an urlencoded form.
    #[must_use]
    pub fn form(&self) -> HashMap<String, String> {
        url::form_urlencoded::parse(self.body.as_bytes())
            .into_owned()
            .collect()
    }

    /// Query string parsed into pairs.
    #[must_use]
    pub fn query_pairs(&self) -> HashMap<String, String> {
        url::form_urlencoded::parse(self.query.as_deref().unwrap_or_default().as_bytes())
            .into_owned()
            .collect()
    }
}

struct FakeState {
    origin: String,
    superuser_exists: Value,
    users: Vec<Value>,
    personas: Vec<Value>,
    categories: Vec<Value>,
    cases: Vec<Value>,
    conversations: Vec<Value>,
    messages: HashMap<i64, Vec<Value>>,
    objects: BTreeSet<String>,
    failures: HashMap<String, (StatusCode, Value)>,
    recorded: Vec<RecordedRequest>,
    next_id: i64,
}

impl FakeState {
    fn seeded(origin: String) -> Self {
        let bank_clerk = json!({
            "id": 1,
            "name": "Bank Clerk",
            "description": "Pretends to be from the fraud department",
            "system_prompt": "You are a bank clerk.",
            "is_public": true,
            "profile_image_key": null,
            "starting_message": "Hello, this is your bank calling.",
            "conversation_starters": ["Is my account safe?", "Who is this?"],
            "voice": "alloy"
        });
        let alice = json!({
            "id": 2,
            "email": "alice@example.com",
            "username": "alice",
            "is_active": true,
            "is_superuser": false,
            "is_guest": false,
            "profile_image_key": "users/alice.png"
        });

        let mut messages = HashMap::new();
        messages.insert(
            1,
            vec![
                json!({
                    "id": 1,
                    "sender_type": "user",
                    "content": "Who is calling?",
                    "image_key": null,
                    "created_at": "2024-05-01T01:00:00"
                }),
                json!({
                    "id": 2,
                    "sender_type": "ai",
                    "content": "Your bank's fraud department.",
                    "image_key": null,
                    "created_at": "2024-05-01T01:00:05",
                    "model": "fake"
                }),
            ],
        );

        Self {
            origin,
            superuser_exists: Value::Bool(true),
            users: vec![
                json!({
                    "id": 1,
                    "email": ADMIN_EMAIL,
                    "username": "admin",
                    "is_active": true,
                    "is_superuser": true,
                    "is_guest": false,
                    "profile_image_key": null
                }),
                alice,
            ],
            personas: vec![bank_clerk.clone()],
            categories: vec![
                json!({"code": "SMS", "description": "Text message phishing"}),
                json!({"code": "VOICE", "description": "Voice phishing"}),
            ],
            cases: vec![
                json!({
                    "id": 1,
                    "category_code": "SMS",
                    "title": "Parcel redelivery fee",
                    "content": "Pay 1,500 won to reschedule delivery.",
                    "case_date": "2024-05-01",
                    "reference_url": "https://example.com/parcel"
                }),
                json!({
                    "id": 2,
                    "category_code": "VOICE",
                    "title": "Prosecutor impersonation",
                    "content": "Your account is linked to a crime.",
                    "case_date": null,
                    "reference_url": null
                }),
            ],
            conversations: vec![json!({
                "id": 1,
                "user": {"id": 2, "email": "alice@example.com", "username": "alice"},
                "persona": bank_clerk,
                "applied_phishing_case_id": 1,
                "title": "Bank call",
                "last_message_at": "2024-05-01T01:00:05"
            })],
            messages,
            objects: BTreeSet::from(["users/alice.png".to_string()]),
            failures: HashMap::new(),
            recorded: Vec::new(),
            next_id: 100,
        }
    }

    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn storage_url(&self, key: &str) -> String {
        format!("{}{STORAGE_PREFIX}{key}", self.origin)
    }
}

/// In-process fake of the Mung REST backend.
#[derive(Clone)]
pub struct FakeBackend {
    origin: String,
    state: Arc<Mutex<FakeState>>,
}

impl FakeBackend {
    /// Bind to an ephemeral port and start serving.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake backend");
        let addr = listener.local_addr().expect("Fake backend has no address");
        let origin = format!("http://{addr}");

        let fake = Self {
            origin: origin.clone(),
            state: Arc::new(Mutex::new(FakeState::seeded(origin))),
        };

        let app = Router::new().fallback(handle).with_state(fake.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        fake
    }

    /// REST base URL, as `FASTAPI_API_BASE_URL` would hold it.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("{}{API_PREFIX}", self.origin)
    }

    /// Client pointed at this fake.
    #[must_use]
    pub fn client(&self) -> BackendClient {
        BackendClient::new(&self.base_url()).expect("Fake backend URL is valid")
    }

    /// A token the fake accepts.
    #[must_use]
    pub fn token() -> AccessToken {
        AccessToken::new(TOKEN)
    }

    /// Admin configuration pointed at this fake.
    #[must_use]
    pub fn config(&self, signup_mode: bool) -> AdminConfig {
        let base_url = self.base_url();
        AdminConfig::from_lookup(|key| match key {
            "FASTAPI_API_BASE_URL" => Some(base_url.clone()),
            "SECRET_SIGNUP_MODE" if signup_mode => Some("true".to_string()),
            _ => None,
        })
        .expect("Test configuration is valid")
    }

    /// Full admin application pointed at this fake.
    #[must_use]
    pub fn admin_app(&self, signup_mode: bool) -> Router {
        let state = AppState::new(self.config(signup_mode)).expect("Failed to build state");
        mung_admin::build_app_with_static(
            state,
            concat!(env!("CARGO_MANIFEST_DIR"), "/../admin/static"),
        )
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().recorded.clone()
    }

    /// Requests with the given method and exact path.
    #[must_use]
    pub fn requests_to(&self, method: &str, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }

    /// The most recent request with the given method and path.
    #[must_use]
    pub fn last_request(&self, method: &str, path: &str) -> Option<RecordedRequest> {
        self.requests_to(method, path).pop()
    }

    /// Answer every `method path` request with `status` and `{"detail": detail}`.
    pub fn fail(&self, method: &str, path: &str, status: u16, detail: &str) {
        self.fail_with(method, path, status, json!({ "detail": detail }));
    }

    /// Answer every `method path` request with `status` and a custom body.
    pub fn fail_with(&self, method: &str, path: &str, status: u16, body: Value) {
        let status = StatusCode::from_u16(status).expect("Valid status code");
        self.lock()
            .failures
            .insert(format!("{method} {path}"), (status, body));
    }

    /// Set the body returned by the superuser check.
    pub fn set_superuser_exists(&self, body: Value) {
        self.lock().superuser_exists = body;
    }

    #[must_use]
    pub fn users(&self) -> Vec<Value> {
        self.lock().users.clone()
    }

    #[must_use]
    pub fn personas(&self) -> Vec<Value> {
        self.lock().personas.clone()
    }

    #[must_use]
    pub fn cases(&self) -> Vec<Value> {
        self.lock().cases.clone()
    }

    #[must_use]
    pub fn conversations(&self) -> Vec<Value> {
        self.lock().conversations.clone()
    }

    #[must_use]
    pub fn messages(&self, conversation_id: i64) -> Vec<Value> {
        self.lock()
            .messages
            .get(&conversation_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether an object with this key is stored.
    #[must_use]
    pub fn has_object(&self, key: &str) -> bool {
        self.lock().objects.contains(key)
    }

    /// Stored object keys.
    #[must_use]
    pub fn objects(&self) -> Vec<String> {
        self.lock().objects.iter().cloned().collect()
    }
}

fn reply(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

fn ok(body: Value) -> Response {
    reply(StatusCode::OK, body)
}

fn not_found(what: &str) -> Response {
    reply(StatusCode::NOT_FOUND, json!({ "detail": format!("{what} not found") }))
}

fn find_mut<'a>(items: &'a mut [Value], id: i64) -> Option<&'a mut Value> {
    items.iter_mut().find(|item| item["id"].as_i64() == Some(id))
}

fn remove_by_id(items: &mut Vec<Value>, id: i64) -> bool {
    let before = items.len();
    items.retain(|item| item["id"].as_i64() != Some(id));
    items.len() != before
}

/// Copy the listed fields present in `patch` onto `target`.
fn merge(target: &mut Value, patch: &Value, fields: &[&str]) {
    for field in fields {
        if let Some(value) = patch.get(*field) {
            target[*field] = value.clone();
        }
    }
}

const PUBLIC_PATHS: &[&str] = &[
    "/auth/token",
    "/admin/superuser-exists",
    "/admin/initial-superuser",
    "/phishing/categories",
];

async fn handle(
    State(fake): State<FakeBackend>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header_text = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    };

    let full_path = uri.path();
    let path = full_path
        .strip_prefix(API_PREFIX)
        .unwrap_or(full_path)
        .to_string();
    let recorded = RecordedRequest {
        method: method.to_string(),
        path: path.clone(),
        query: uri.query().map(str::to_owned),
        authorization: header_text(header::AUTHORIZATION),
        content_type: header_text(header::CONTENT_TYPE),
        body: String::from_utf8_lossy(&body).into_owned(),
    };

    let mut state = fake.lock();
    state.recorded.push(recorded.clone());

    if let Some((status, body)) = state.failures.get(&format!("{method} {path}")) {
        return reply(*status, body.clone());
    }

    if let Some(key) = full_path.strip_prefix(STORAGE_PREFIX) {
        return storage_object(&mut state, &method, key);
    }

    if !PUBLIC_PATHS.contains(&path.as_str())
        && recorded.authorization.as_deref() != Some(format!("Bearer {TOKEN}").as_str())
    {
        return reply(
            StatusCode::UNAUTHORIZED,
            json!({ "detail": "Could not validate credentials" }),
        );
    }

    let payload = recorded.json();
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    let id = segments
        .iter()
        .find_map(|s| s.parse::<i64>().ok())
        .unwrap_or_default();

    match (method.as_str(), segments.as_slice()) {
        ("POST", ["auth", "token"]) => {
            let form = recorded.form();
            if form.get("username").map(String::as_str) == Some(ADMIN_EMAIL)
                && form.get("password").map(String::as_str) == Some(ADMIN_PASSWORD)
            {
                ok(json!({ "access_token": TOKEN, "token_type": "bearer" }))
            } else {
                reply(
                    StatusCode::UNAUTHORIZED,
                    json!({ "detail": "Incorrect username or password" }),
                )
            }
        }
        ("GET", ["admin", "superuser-exists"]) => ok(state.superuser_exists.clone()),
        ("POST", ["admin", "initial-superuser"]) => {
            if state.superuser_exists == Value::Bool(true) {
                return reply(
                    StatusCode::BAD_REQUEST,
                    json!({ "detail": "A superuser already exists" }),
                );
            }
            let id = state.next_id();
            let user = json!({
                "id": id,
                "email": payload["email"],
                "username": null,
                "is_active": true,
                "is_superuser": true,
                "is_guest": false,
                "profile_image_key": null
            });
            state.users.push(user.clone());
            state.superuser_exists = Value::Bool(true);
            ok(user)
        }

        ("GET", ["admin", "users"]) => ok(Value::Array(state.users.clone())),
        ("PUT", ["admin", "users", _]) => {
            let fields = ["username", "is_active", "is_superuser", "profile_image_key"];
            match find_mut(&mut state.users, id) {
                Some(user) => {
                    merge(user, &payload, &fields);
                    ok(user.clone())
                }
                None => not_found("User"),
            }
        }
        ("DELETE", ["admin", "users", _]) => {
            if remove_by_id(&mut state.users, id) {
                StatusCode::NO_CONTENT.into_response()
            } else {
                not_found("User")
            }
        }

        ("GET", ["personas"]) => ok(Value::Array(state.personas.clone())),
        ("POST", ["personas"]) => {
            if payload["name"].as_str().is_none_or(str::is_empty) {
                return reply(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    json!({ "detail": [{ "loc": ["body", "name"], "msg": "Field required" }] }),
                );
            }
            let mut persona = json!({ "id": state.next_id() });
            merge(&mut persona, &payload, &PERSONA_FIELDS);
            state.personas.push(persona.clone());
            ok(persona)
        }
        ("PUT", ["personas", _]) => match find_mut(&mut state.personas, id) {
            Some(persona) => {
                merge(persona, &payload, &PERSONA_FIELDS);
                ok(persona.clone())
            }
            None => not_found("Persona"),
        },
        ("DELETE", ["personas", _]) => {
            if remove_by_id(&mut state.personas, id) {
                StatusCode::NO_CONTENT.into_response()
            } else {
                not_found("Persona")
            }
        }

        ("POST", ["conversations"]) => {
            let persona_id = payload["persona_id"].as_i64().unwrap_or_default();
            let Some(persona) = find_mut(&mut state.personas, persona_id).cloned() else {
                return not_found("Persona");
            };
            let id = state.next_id();
            let conversation = json!({
                "id": id,
                "user": {"id": 1, "email": ADMIN_EMAIL, "username": "admin"},
                "persona": persona,
                "applied_phishing_case_id": null,
                "title": payload.get("title").cloned().unwrap_or(Value::Null),
                "last_message_at": null
            });
            state.conversations.push(conversation.clone());
            ok(conversation)
        }
        ("POST", ["admin", "conversations", ..]) => create_admin_conversation(&mut state, &segments, &payload),
        ("GET", ["admin", "conversations"]) => ok(Value::Array(state.conversations.clone())),
        ("GET", ["admin", "conversations", _, "messages"]) => {
            if find_mut(&mut state.conversations, id).is_none() {
                return not_found("Conversation");
            }
            ok(Value::Array(state.messages.get(&id).cloned().unwrap_or_default()))
        }
        ("DELETE", ["admin", "conversations", _]) => {
            if remove_by_id(&mut state.conversations, id) {
                state.messages.remove(&id);
                StatusCode::NO_CONTENT.into_response()
            } else {
                not_found("Conversation")
            }
        }
        ("POST", ["conversations", _, "messages"]) => {
            if find_mut(&mut state.conversations, id).is_none() {
                return not_found("Conversation");
            }
            send_message(&mut state, id, &payload)
        }

        ("GET", ["phishing", "categories"]) => ok(Value::Array(state.categories.clone())),
        ("GET", ["phishing", "cases"]) => ok(Value::Array(state.cases.clone())),
        ("GET", ["phishing", "cases", _]) => {
            match find_mut(&mut state.cases, id) {
                Some(case) => ok(case.clone()),
                None => not_found("Phishing case"),
            }
        }
        ("POST", ["phishing", "analyze-image"]) => {
            if payload["image_base64"].as_str().is_none_or(str::is_empty) {
                return ok(json!({ "detail": "No image supplied" }));
            }
            ok(json!({ "phishing_score": 82.5, "reason": "Urgent payment request with a shortened link" }))
        }
        ("POST", ["admin", "phishing-cases"]) => {
            let missing = ["category_code", "title", "content"]
                .iter()
                .any(|f| payload[*f].as_str().is_none_or(str::is_empty));
            if missing {
                return reply(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    json!({ "detail": [{ "msg": "category_code, title and content are required" }] }),
                );
            }
            let mut case = json!({ "id": state.next_id(), "case_date": null, "reference_url": null });
            merge(&mut case, &payload, &CASE_FIELDS);
            state.cases.push(case.clone());
            ok(case)
        }
        ("PUT", ["admin", "phishing-cases", _]) => {
            match find_mut(&mut state.cases, id) {
                Some(case) => {
                    merge(case, &payload, &CASE_FIELDS);
                    ok(case.clone())
                }
                None => not_found("Phishing case"),
            }
        }
        ("DELETE", ["admin", "phishing-cases", _]) => {
            if remove_by_id(&mut state.cases, id) {
                StatusCode::NO_CONTENT.into_response()
            } else {
                not_found("Phishing case")
            }
        }

        ("POST", ["storage", "presigned-url", "upload"]) => {
            let category = recorded
                .query_pairs()
                .get("category")
                .cloned()
                .unwrap_or_default();
            let filename = payload["filename"].as_str().unwrap_or("file");
            let key = format!("{category}/{}_{filename}", state.next_id());
            ok(json!({ "url": state.storage_url(&key), "object_key": key }))
        }
        ("GET", ["storage", "presigned-url", "download"]) => {
            let key = recorded
                .query_pairs()
                .get("object_key")
                .cloned()
                .unwrap_or_default();
            if state.objects.contains(&key) {
                ok(json!({ "url": state.storage_url(&key) }))
            } else {
                not_found("Object")
            }
        }
        ("DELETE", ["storage", "object"]) => {
            let key = recorded
                .query_pairs()
                .get("object_key")
                .cloned()
                .unwrap_or_default();
            state.objects.remove(&key);
            StatusCode::NO_CONTENT.into_response()
        }

        _ => reply(StatusCode::NOT_FOUND, json!({ "detail": "Not Found" })),
    }
}

const PERSONA_FIELDS: [&str; 7] = [
    "name",
    "description",
    "system_prompt",
    "is_public",
    "profile_image_key",
    "starting_message",
    "conversation_starters",
];

const CASE_FIELDS: [&str; 5] = [
    "category_code",
    "title",
    "content",
    "case_date",
    "reference_url",
];

fn storage_object(state: &mut FakeState, method: &Method, key: &str) -> Response {
    match *method {
        Method::PUT => {
            state.objects.insert(key.to_string());
            StatusCode::OK.into_response()
        }
        Method::GET if state.objects.contains(key) => {
            ([(header::CONTENT_TYPE, "image/png")], b"fake image".to_vec()).into_response()
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

fn create_admin_conversation(state: &mut FakeState, segments: &[&str], payload: &Value) -> Response {
    let user = find_mut(&mut state.users, payload["user_id"].as_i64().unwrap_or_default()).cloned();
    let persona =
        find_mut(&mut state.personas, payload["persona_id"].as_i64().unwrap_or_default()).cloned();
    let (Some(user), Some(persona)) = (user, persona) else {
        return not_found("User or persona");
    };

    let category = payload["category_code"].as_str();
    let applied_case = match segments.get(2).copied() {
        None => state.cases.first().and_then(|c| c["id"].as_i64()),
        Some("with-category" | "with-ai-case") => {
            let Some(code) = category else {
                return reply(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    json!({ "detail": [{ "msg": "category_code is required" }] }),
                );
            };
            let existing = state
                .cases
                .iter()
                .find(|c| c["category_code"].as_str() == Some(code))
                .and_then(|c| c["id"].as_i64());
            if segments.get(2) == Some(&"with-category") && existing.is_some() {
                existing
            } else {
                let case_id = state.next_id();
                state.cases.push(json!({
                    "id": case_id,
                    "category_code": code,
                    "title": "Generated scenario",
                    "content": "A freshly generated scenario.",
                    "case_date": null,
                    "reference_url": null
                }));
                Some(case_id)
            }
        }
        Some(_) => return reply(StatusCode::NOT_FOUND, json!({ "detail": "Not Found" })),
    };

    let id = state.next_id();
    state.conversations.push(json!({
        "id": id,
        "user": {"id": user["id"], "email": user["email"], "username": user["username"]},
        "persona": persona,
        "applied_phishing_case_id": applied_case,
        "title": payload["title"],
        "last_message_at": null
    }));
    ok(json!({ "id": id, "applied_phishing_case_id": applied_case }))
}

fn send_message(state: &mut FakeState, conversation_id: i64, payload: &Value) -> Response {
    let image_key = payload["image_base64"].as_str().map(|_| {
        let key = format!("messages/{}.png", state.next_id());
        state.objects.insert(key.clone());
        key
    });

    let user_message = json!({
        "id": state.next_id(),
        "sender_type": "user",
        "content": payload["content"],
        "image_key": image_key,
        "created_at": "2024-05-02T03:00:00"
    });
    let ai_message = json!({
        "id": state.next_id(),
        "sender_type": "ai",
        "content": "Please confirm your card number.",
        "image_key": null,
        "created_at": "2024-05-02T03:00:02"
    });

    let log = state.messages.entry(conversation_id).or_default();
    log.push(user_message.clone());
    log.push(ai_message.clone());

    ok(json!({
        "user_message": user_message,
        "ai_message": ai_message,
        "suggested_user_questions": ["Why do you need my card number?", "Can I call you back?"]
    }))
}
