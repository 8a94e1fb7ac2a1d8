//! Transport: executes an `HttpRequest` and returns the raw `HttpResponse`.
//!
//! # Design
//! [`Transport`] is the only seam that performs network I/O. Implementations
//! must honour `HttpRequest::timeout`, must not retry, and must report
//! failures that produced no response as [`ApiError::Network`] or
//! [`ApiError::Timeout`]. Any status code is returned as data;
//! [`classify_status`] turns non-2xx replies into typed errors as the first
//! step of response handling.
//!
//! Dropping the future returned by `send` aborts the in-flight request.

use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Correlation header attached to every request sent by [`ReqwestTransport`].
pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError>;
}

/// Default transport backed by a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ApiError::Configuration(format!("cannot initialise HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Reuse an existing client, e.g. one configured with a proxy.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let request_id = Uuid::new_v4();
        let timeout = request.timeout;

        let mut builder = self
            .client
            .request(reqwest_method(request.method), &request.url)
            .timeout(timeout)
            .header(REQUEST_ID_HEADER, request_id.to_string());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let started = Instant::now();
        let classify = |e: reqwest::Error| {
            if e.is_timeout() {
                ApiError::Timeout(timeout)
            } else if e.is_builder() {
                // invalid URL or header value, i.e. bad endpoint or credentials
                ApiError::Configuration(format!("cannot build request: {e}"))
            } else {
                ApiError::Network(e.to_string())
            }
        };

        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response.text().await.map_err(classify)?;

        debug!(%request_id, status, elapsed = ?started.elapsed(), "response received");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

/// Map non-success status codes to the appropriate `ApiError` variant.
pub fn classify_status(response: &HttpResponse) -> Result<(), ApiError> {
    match response.status {
        200..=299 => Ok(()),
        status @ (401 | 403) => Err(ApiError::Authentication {
            status,
            message: error_message(&response.body),
        }),
        status => Err(ApiError::Backend {
            status,
            body: response.body.clone(),
        }),
    }
}

/// Best-effort human message from an error body. Understands
/// `{"error": "..."}`, `{"error": {"message": "..."}}` and
/// `{"message": "..."}`; falls back to the raw body.
fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        let candidates = [
            value.pointer("/error/message"),
            value.get("error"),
            value.get("message"),
        ];
        if let Some(message) = candidates.into_iter().flatten().find_map(Value::as_str) {
            return message.to_string();
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "credentials rejected".to_string()
    } else {
        trimmed.to_string()
    }
}
