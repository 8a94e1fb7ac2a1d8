//! In-process fake of the connector backends.
//!
//! Serves the SIX entity search, Google custom search and chat completion
//! APIs over a fixed dataset, plus fault routes used to exercise error
//! classification:
//!
//! - `/status/{code}/...` answers every request with `code`
//! - `/malformed/...` answers 200 with a search reply missing `name`
//! - `/slow/...` waits [`SLOW_DELAY`] before answering
//! - `/flaky/v1/entities/search` fails with 503 a configured number of times

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    routing::{any, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::{debug, info};
use uuid::Uuid;

/// The only API key every route accepts.
pub const API_KEY: &str = "test-key";
pub const ENGINE_ID: &str = "test-engine";
pub const SLOW_DELAY: Duration = Duration::from_secs(5);

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: String,
    pub name: String,
    pub entity_type: String,
    pub score: f64,
    pub listings: Vec<Listing>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub ticker: String,
    pub exchange: String,
    pub market_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySearch {
    pub text: String,
    pub size: Option<usize>,
    pub entity_type: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

/// Shared counters, cloned into every handler.
#[derive(Clone, Default)]
pub struct MockState {
    inner: Arc<Counters>,
}

#[derive(Default)]
struct Counters {
    requests: AtomicUsize,
    flaky_failures: AtomicUsize,
}

impl MockState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the flaky route fail `failures` times before answering.
    pub fn with_flaky_failures(self, failures: usize) -> Self {
        self.inner.flaky_failures.store(failures, Ordering::SeqCst);
        self
    }

    /// Requests received so far, across all routes.
    pub fn requests(&self) -> usize {
        self.inner.requests.load(Ordering::SeqCst)
    }

    fn record(&self) {
        self.inner.requests.fetch_add(1, Ordering::SeqCst);
    }

    fn take_flaky_failure(&self) -> bool {
        self.inner
            .flaky_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

type ApiResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

pub fn app() -> Router {
    app_with_state(MockState::new())
}

pub fn app_with_state(state: MockState) -> Router {
    Router::new()
        .route("/six/v1/entities/search", post(search_entities))
        .route("/google/customsearch/v1", get(web_search))
        .route("/openai/v1/chat/completions", post(chat_completion))
        .route("/status/{code}/{*rest}", any(fixed_status))
        .route("/malformed/{*rest}", any(malformed))
        .route("/slow/{*rest}", any(slow))
        .route("/flaky/v1/entities/search", post(flaky_search))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with_state(listener, MockState::new()).await
}

pub async fn run_with_state(listener: TcpListener, state: MockState) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "mock backend serving");
    }
    axum::serve(listener, app_with_state(state)).await
}

/// The fixed dataset behind the entity search route.
pub fn catalog() -> Vec<Entity> {
    fn listing(ticker: &str, exchange: &str, market_type: &str, currency: Option<&str>) -> Listing {
        Listing {
            ticker: ticker.to_string(),
            exchange: exchange.to_string(),
            market_type: market_type.to_string(),
            currency: currency.map(str::to_string),
        }
    }
    fn entity(id: &str, name: &str, entity_type: &str, score: f64, listings: Vec<Listing>) -> Entity {
        Entity {
            id: id.to_string(),
            name: name.to_string(),
            entity_type: entity_type.to_string(),
            score,
            listings,
        }
    }

    vec![
        entity(
            "ent-acme",
            "Acme Corp",
            "company",
            0.97,
            vec![
                listing("ACME", "XSWX", "stock", Some("CHF")),
                listing("ACME", "XNYS", "stock", Some("USD")),
            ],
        ),
        entity(
            "ent-acme-bond",
            "Acme Corp 4.5% 2030",
            "instrument",
            0.81,
            vec![listing("ACM30", "XSWX", "bond", Some("CHF"))],
        ),
        entity(
            "ent-acme-fund",
            "Acme Global Equity Fund",
            "instrument",
            0.64,
            vec![listing("ACMGEF", "XSWX", "fund", None)],
        ),
        entity("ent-smi", "Swiss Market Index", "index", 0.9, vec![listing("SMI", "XSWX", "index", None)]),
        entity("ent-chf", "Swiss Franc", "currency", 0.88, Vec::new()),
        entity(
            "ent-nesn",
            "Nestle SA",
            "company",
            0.93,
            vec![listing("NESN", "XSWX", "stock", Some("CHF"))],
        ),
    ]
}

fn unauthorized(status: StatusCode, message: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "error": message })))
}

fn bad_request(message: &str) -> (StatusCode, Json<Value>) {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn search_catalog(input: &EntitySearch) -> Value {
    let needle = input.text.to_lowercase();
    let matches: Vec<Entity> = catalog()
        .into_iter()
        .filter(|e| e.name.to_lowercase().contains(&needle))
        .filter(|e| input.entity_type.as_deref().map_or(true, |t| e.entity_type == t))
        .collect();
    let total = matches.len();
    let hits: Vec<Entity> = matches.into_iter().take(input.size.unwrap_or(10)).collect();
    json!({ "total": total, "hits": hits })
}

async fn search_entities(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(input): Json<EntitySearch>,
) -> ApiResult {
    state.record();
    if headers.get("x-api-key").and_then(|v| v.to_str().ok()) != Some(API_KEY) {
        return Err(unauthorized(StatusCode::UNAUTHORIZED, "invalid api key"));
    }
    debug!(text = %input.text, "entity search");
    Ok(Json(search_catalog(&input)))
}

async fn flaky_search(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(input): Json<EntitySearch>,
) -> ApiResult {
    if state.take_flaky_failure() {
        state.record();
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "temporarily unavailable" })),
        ));
    }
    search_entities(State(state), headers, Json(input)).await
}

const WEB_PAGES: [(&str, &str, &str, &str); 3] = [
    (
        "Rust Programming Language",
        "https://www.rust-lang.org/",
        "A language empowering everyone to build reliable and efficient software.",
        "www.rust-lang.org",
    ),
    (
        "The Rust Book",
        "https://doc.rust-lang.org/book/",
        "An introductory book about Rust.",
        "doc.rust-lang.org",
    ),
    (
        "Acme Corp investor relations",
        "https://acme.example/investors",
        "Annual reports and shareholder information.",
        "acme.example",
    ),
];

async fn web_search(
    State(state): State<MockState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult {
    state.record();
    if params.get("key").map(String::as_str) != Some(API_KEY) {
        return Err((
            StatusCode::FORBIDDEN,
            Json(json!({ "error": { "code": 403, "message": "API key not valid" } })),
        ));
    }
    if params.get("cx").map(String::as_str) != Some(ENGINE_ID) {
        return Err(bad_request("invalid cx"));
    }
    let Some(query) = params.get("q").map(|q| q.to_lowercase()) else {
        return Err(bad_request("missing q"));
    };
    let num = params.get("num").and_then(|n| n.parse().ok()).unwrap_or(10);

    let items: Vec<Value> = WEB_PAGES
        .iter()
        .filter(|(title, _, snippet, _)| {
            query
                .split_whitespace()
                .any(|word| title.to_lowercase().contains(word) || snippet.to_lowercase().contains(word))
        })
        .map(|(title, link, snippet, display_link)| {
            json!({ "title": title, "link": link, "snippet": snippet, "displayLink": display_link })
        })
        .collect();

    let mut body = json!({
        "searchInformation": { "searchTime": 0.12, "totalResults": items.len().to_string() },
    });
    if !items.is_empty() {
        body["items"] = Value::Array(items.into_iter().take(num).collect());
    }
    Ok(Json(body))
}

async fn chat_completion(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(input): Json<ChatRequest>,
) -> ApiResult {
    state.record();
    let expected = format!("Bearer {API_KEY}");
    if headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) != Some(expected.as_str()) {
        return Err(unauthorized(StatusCode::UNAUTHORIZED, "invalid bearer token"));
    }
    let Some(last) = input.messages.iter().rev().find(|m| m.role == "user") else {
        return Err(bad_request("no user message"));
    };

    let reply = format!("You said: {}", last.content);
    let prompt_tokens: usize = input
        .messages
        .iter()
        .map(|m| m.content.split_whitespace().count())
        .sum();
    let completion_tokens = reply.split_whitespace().count();

    Ok(Json(json!({
        "id": format!("chatcmpl-{}", Uuid::new_v4()),
        "model": input.model,
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": reply },
            "finish_reason": "stop",
        }],
        "usage": {
            "prompt_tokens": prompt_tokens,
            "completion_tokens": completion_tokens,
            "total_tokens": prompt_tokens + completion_tokens,
        },
    })))
}

async fn fixed_status(State(state): State<MockState>, Path((code, _rest)): Path<(u16, String)>) -> (StatusCode, Json<Value>) {
    state.record();
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST);
    (status, Json(json!({ "error": format!("injected status {code}") })))
}

async fn malformed(State(state): State<MockState>) -> Json<Value> {
    state.record();
    Json(json!({
        "total": 1,
        "hits": [{ "id": "ent-broken", "entityType": "company", "score": 0.5, "listings": [] }],
    }))
}

async fn slow(State(state): State<MockState>) -> Json<Value> {
    state.record();
    tokio::time::sleep(SLOW_DELAY).await;
    Json(json!({}))
}
