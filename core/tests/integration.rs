//! End-to-end tests against the mock backends on a random local port.
//!
//! Each test spawns its own server so request counters never leak between
//! tests.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use connector_core::connectors::{
    ChatClient, ChatCompletionParams, ChatMessage, ChatRole, EntitySearchParams, GoogleSearchClient,
    SafeSearch, SixClient, WebSearchParams,
};
use connector_core::{ApiError, EntityType, ErrorKind, MarketType, RetryPolicy, Settings, SettingsResolver};
use mock_server::{MockState, API_KEY, ENGINE_ID};
use tokio::net::TcpListener;

async fn start_server(state: MockState) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(mock_server::run_with_state(listener, state));
    addr
}

fn resolve(resolver: SettingsResolver, vars: &[(&str, String)]) -> Settings {
    resolver
        .without_env_file()
        .resolve_with(|name| {
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.clone())
        })
        .unwrap()
}

fn six_client(addr: SocketAddr, route: &str, key: &str) -> SixClient {
    let settings = resolve(
        SixClient::resolver(),
        &[
            ("SIX_API_KEY", key.to_string()),
            ("SIX_API_ENDPOINT", format!("http://{addr}/{route}")),
        ],
    );
    SixClient::new(settings).unwrap()
}

fn quick_retries(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        jitter: false,
    }
}

#[tokio::test]
async fn six_search_end_to_end() {
    let addr = start_server(MockState::new()).await;
    let six = six_client(addr, "six", API_KEY);

    let result = six
        .search_entities(&EntitySearchParams::new("Acme Corp").size(10))
        .await
        .unwrap();

    assert_eq!(result.total, 2);
    let acme = &result.hits[0];
    assert_eq!(acme.name, "Acme Corp");
    assert_eq!(acme.entity_type, EntityType::Company);
    assert_eq!(acme.listings.len(), 2);
    assert_eq!(acme.listings[0].market_type, MarketType::Stock);
    assert_eq!(acme.listings[0].currency.as_deref(), Some("CHF"));
    assert_eq!(result.hits[1].listings[0].market_type, MarketType::Bond);
}

#[tokio::test]
async fn six_search_applies_filter_and_size() {
    let addr = start_server(MockState::new()).await;
    let six = six_client(addr, "six", API_KEY);

    let params = EntitySearchParams::new("acme")
        .entity_type(EntityType::Instrument)
        .size(1);
    let result = six.search_entities(&params).await.unwrap();

    assert_eq!(result.total, 2);
    assert_eq!(result.hits.len(), 1);
    assert_eq!(result.hits[0].entity_type, EntityType::Instrument);
}

#[tokio::test]
async fn google_search_end_to_end() {
    let addr = start_server(MockState::new()).await;
    let settings = resolve(
        GoogleSearchClient::resolver(),
        &[
            ("GOOGLE_SEARCH_API_KEY", API_KEY.to_string()),
            ("GOOGLE_SEARCH_ENGINE_ID", ENGINE_ID.to_string()),
            ("GOOGLE_SEARCH_API_ENDPOINT", format!("http://{addr}/google")),
        ],
    );
    let google = GoogleSearchClient::new(settings).unwrap();

    let result = google
        .search(&WebSearchParams::new("rust").num(10).safe(SafeSearch::Active))
        .await
        .unwrap();
    assert_eq!(result.total_results, 2);
    assert_eq!(result.items[0].link, "https://www.rust-lang.org/");
    assert_eq!(result.items[0].display_link.as_deref(), Some("www.rust-lang.org"));

    let empty = google.search(&WebSearchParams::new("zzzz")).await.unwrap();
    assert_eq!(empty.total_results, 0);
    assert!(empty.items.is_empty());
}

#[tokio::test]
async fn google_rejected_key_is_authentication_error() {
    let addr = start_server(MockState::new()).await;
    let settings = resolve(
        GoogleSearchClient::resolver(),
        &[
            ("GOOGLE_SEARCH_API_KEY", "wrong".to_string()),
            ("GOOGLE_SEARCH_ENGINE_ID", ENGINE_ID.to_string()),
            ("GOOGLE_SEARCH_API_ENDPOINT", format!("http://{addr}/google")),
        ],
    );
    let google = GoogleSearchClient::new(settings).unwrap();

    let err = google.search(&WebSearchParams::new("rust")).await.unwrap_err();
    match err {
        ApiError::Authentication { status, ref message } => {
            assert_eq!(status, 403);
            assert_eq!(message, "API key not valid");
        }
        other => panic!("expected authentication error, got {other:?}"),
    }
}

#[tokio::test]
async fn chat_completion_end_to_end() {
    let addr = start_server(MockState::new()).await;
    let settings = resolve(
        ChatClient::resolver(),
        &[
            ("OPENAI_API_KEY", API_KEY.to_string()),
            ("OPENAI_API_ENDPOINT", format!("http://{addr}/openai")),
        ],
    );
    let chat = ChatClient::new(settings).unwrap();

    let params = ChatCompletionParams::new(
        "gpt-test",
        vec![ChatMessage::system("Be brief."), ChatMessage::user("ping")],
    )
    .temperature(0.2);
    let completion = chat.complete(&params).await.unwrap();

    assert_eq!(completion.model, "gpt-test");
    assert_eq!(completion.first_content(), Some("You said: ping"));
    assert_eq!(completion.choices[0].message.role, ChatRole::Assistant);
    assert_eq!(completion.choices[0].finish_reason.as_deref(), Some("stop"));
    let usage = completion.usage.unwrap();
    assert_eq!(usage.total_tokens, usage.prompt_tokens + usage.completion_tokens);
}

#[tokio::test]
async fn wrong_key_is_authentication_error() {
    let addr = start_server(MockState::new()).await;
    let six = six_client(addr, "six", "not-the-key");

    let err = six
        .search_entities(&EntitySearchParams::new("Acme"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Authentication);
    assert_eq!(err.status(), Some(401));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn slow_backend_times_out() {
    let addr = start_server(MockState::new()).await;
    let six = six_client(addr, "slow", API_KEY);

    let request = six
        .build_search_entities(&EntitySearchParams::new("Acme"))
        .unwrap()
        .with_timeout(Duration::from_millis(200));
    let started = Instant::now();
    let err = six.execute(request).await.unwrap_err();

    assert!(matches!(err, ApiError::Timeout(d) if d == Duration::from_millis(200)));
    assert!(err.is_retryable());
    assert!(started.elapsed() < mock_server::SLOW_DELAY);
}

#[tokio::test]
async fn server_error_is_retryable_backend_error() {
    let addr = start_server(MockState::new()).await;
    let six = six_client(addr, "status/503", API_KEY);

    let err = six
        .search_entities(&EntitySearchParams::new("Acme"))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Backend { status: 503, .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn client_error_is_final_backend_error() {
    let addr = start_server(MockState::new()).await;
    let six = six_client(addr, "status/404", API_KEY);

    let err = six
        .search_entities(&EntitySearchParams::new("Acme"))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Backend { status: 404, .. }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn malformed_reply_names_missing_field() {
    let addr = start_server(MockState::new()).await;
    let six = six_client(addr, "malformed", API_KEY);

    let err = six
        .search_entities(&EntitySearchParams::new("Acme"))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Validation { ref path, .. } if path == "hits[0].name"));
}

#[tokio::test]
async fn unreachable_backend_is_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let six = six_client(addr, "six", API_KEY);

    let err = six
        .search_entities(&EntitySearchParams::new("Acme"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Network);
    assert!(err.is_retryable());
}

#[tokio::test]
async fn retry_policy_recovers_from_transient_failures() {
    let state = MockState::new().with_flaky_failures(2);
    let addr = start_server(state.clone()).await;
    let six = six_client(addr, "flaky", API_KEY);
    let params = EntitySearchParams::new("Acme Corp");

    let result = quick_retries(3)
        .run(|| six.search_entities(&params))
        .await
        .unwrap();

    assert_eq!(result.hits[0].name, "Acme Corp");
    assert_eq!(state.requests(), 3);
}

#[tokio::test]
async fn retry_policy_does_not_retry_rejected_credentials() {
    let state = MockState::new();
    let addr = start_server(state.clone()).await;
    let six = six_client(addr, "six", "not-the-key");
    let params = EntitySearchParams::new("Acme");

    let err = quick_retries(3)
        .run(|| six.search_entities(&params))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Authentication);
    assert_eq!(state.requests(), 1);
}

#[tokio::test]
async fn cancelled_call_leaves_client_usable() {
    let addr = start_server(MockState::new()).await;
    let slow = six_client(addr, "slow", API_KEY);

    let started = Instant::now();
    let outcome = tokio::time::timeout(
        Duration::from_millis(100),
        slow.search_entities(&EntitySearchParams::new("Acme")),
    )
    .await;
    assert!(outcome.is_err());
    assert!(started.elapsed() < Duration::from_secs(2));

    let six = six_client(addr, "six", API_KEY);
    let result = six
        .search_entities(&EntitySearchParams::new("Acme Corp"))
        .await
        .unwrap();
    assert_eq!(result.total, 2);
}

#[tokio::test]
async fn repeated_calls_return_identical_results() {
    let addr = start_server(MockState::new()).await;
    let six = six_client(addr, "six", API_KEY);
    let params = EntitySearchParams::new("Acme Corp");

    let first = six.search_entities(&params).await.unwrap();
    let second = six.search_entities(&params).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn clones_run_concurrently() {
    let state = MockState::new();
    let addr = start_server(state.clone()).await;
    let six = six_client(addr, "six", API_KEY);

    let handles: Vec<_> = ["Acme", "Swiss", "Nestle"]
        .into_iter()
        .map(|text| {
            let six = six.clone();
            tokio::spawn(async move { six.search_entities(&EntitySearchParams::new(text)).await })
        })
        .collect();

    for handle in handles {
        let result = handle.await.unwrap().unwrap();
        assert!(result.total > 0);
    }
    assert_eq!(state.requests(), 3);
}
