//! Request builder: typed parameters to payload to `HttpRequest`.
//!
//! # Design
//! Building happens in two pure steps. [`to_payload`] validates the typed
//! parameters and turns them into a JSON object whose keys follow the
//! backend's [`FieldNaming`]. [`encode`] places that payload into the body or
//! the query string of an endpoint URL and attaches credentials according to
//! the connector's [`AuthScheme`]. Neither step performs I/O.

use secrecy::ExposeSecret;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest};
use crate::naming::FieldNaming;
use crate::settings::Settings;

/// Serialized request parameters keyed by wire field name.
pub type Payload = Map<String, Value>;

/// Typed parameters for one outbound call.
///
/// Required fields are enforced by the type itself; `validate` covers value
/// constraints the type system cannot express. Optional fields should use
/// `#[serde(skip_serializing_if = "Option::is_none")]` so they are omitted
/// rather than sent as `null`.
pub trait RequestParams: Serialize {
    fn validate(&self) -> Result<(), ApiError> {
        Ok(())
    }
}

/// Where an endpoint expects its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    JsonBody,
    Query,
}

/// How the API key travels to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    None,
    /// `authorization: Bearer <key>`
    Bearer,
    /// `<name>: <key>`
    Header(&'static str),
    /// `?<name>=<key>`
    QueryParam(&'static str),
}

/// One operation of a backend API.
#[derive(Debug, Clone, Copy)]
pub struct Endpoint {
    pub name: &'static str,
    pub method: HttpMethod,
    pub path: &'static str,
    pub placement: Placement,
}

/// Validate `params` and serialize them into a payload using `naming`.
pub fn to_payload<P>(params: &P, naming: FieldNaming) -> Result<Payload, ApiError>
where
    P: RequestParams + ?Sized,
{
    params.validate()?;
    let value = serde_json::to_value(params)
        .map_err(|e| ApiError::validation("$", format!("cannot serialize parameters: {e}")))?;
    match naming.rename_keys(value) {
        Value::Object(payload) => Ok(payload),
        other => Err(ApiError::validation(
            "$",
            format!("parameters must serialize to an object, got {}", json_type(&other)),
        )),
    }
}

/// Place `payload` into a request for `endpoint` and attach credentials.
pub fn encode(
    endpoint: &Endpoint,
    payload: Payload,
    auth: AuthScheme,
    settings: &Settings,
) -> Result<HttpRequest, ApiError> {
    let raw_url = format!("{}{}", settings.endpoint(), endpoint.path);
    let mut url = url::Url::parse(&raw_url)
        .map_err(|e| ApiError::Configuration(format!("invalid endpoint URL {raw_url}: {e}")))?;

    let mut headers = Vec::new();
    let mut query = Vec::new();

    let body = match endpoint.placement {
        Placement::JsonBody => {
            headers.push(("content-type".to_string(), "application/json".to_string()));
            let body = serde_json::to_string(&payload)
                .map_err(|e| ApiError::validation("$", format!("cannot serialize payload: {e}")))?;
            Some(body)
        }
        Placement::Query => {
            for (key, value) in &payload {
                if let Some(encoded) = query_value(key, value)? {
                    query.push((key.clone(), encoded));
                }
            }
            None
        }
    };

    match auth {
        AuthScheme::None => {}
        AuthScheme::Bearer => {
            let key = settings.require_api_key()?;
            headers.push(("authorization".to_string(), format!("Bearer {}", key.expose_secret())));
        }
        AuthScheme::Header(name) => {
            let key = settings.require_api_key()?;
            headers.push((name.to_string(), key.expose_secret().to_string()));
        }
        AuthScheme::QueryParam(name) => {
            let key = settings.require_api_key()?;
            query.push((name.to_string(), key.expose_secret().to_string()));
        }
    }

    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query.iter());
    }

    Ok(HttpRequest {
        method: endpoint.method,
        url: url.into(),
        headers,
        body,
        timeout: settings.timeout(),
    })
}

/// Render one payload entry as a query value. `null` is skipped, arrays of
/// scalars are comma-joined, objects cannot be represented.
fn query_value(key: &str, value: &Value) -> Result<Option<String>, ApiError> {
    match value {
        Value::Null => Ok(None),
        Value::Array(items) => {
            let mut parts = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                match scalar(item) {
                    Some(part) => parts.push(part),
                    None => {
                        return Err(ApiError::validation(
                            format!("{key}[{i}]"),
                            format!("{} cannot be encoded in a query string", json_type(item)),
                        ))
                    }
                }
            }
            Ok(Some(parts.join(",")))
        }
        other => scalar(other).map(Some).ok_or_else(|| {
            ApiError::validation(
                key,
                format!("{} cannot be encoded in a query string", json_type(other)),
            )
        }),
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::settings::{SettingKey, SettingsResolver};

    #[derive(Serialize)]
    struct Lookup {
        search_text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        page_size: Option<u32>,
        tags: Vec<String>,
    }

    impl RequestParams for Lookup {
        fn validate(&self) -> Result<(), ApiError> {
            if self.search_text.is_empty() {
                return Err(ApiError::validation("searchText", "must not be empty"));
            }
            Ok(())
        }
    }

    #[derive(Serialize)]
    struct Nested {
        filter: Map<String, Value>,
    }

    impl RequestParams for Nested {}

    fn settings() -> Settings {
        SettingsResolver::new("TEST")
            .require(SettingKey::ApiKey)
            .without_env_file()
            .resolve_with(|name| match name {
                "TEST_API_KEY" => Some("k3y".to_string()),
                "TEST_API_ENDPOINT" => Some("http://localhost:3000/".to_string()),
                "TEST_TIMEOUT_SECS" => Some("7".to_string()),
                _ => None,
            })
            .unwrap()
    }

    fn lookup() -> Lookup {
        Lookup {
            search_text: "acme".to_string(),
            page_size: None,
            tags: vec!["a".to_string(), "b".to_string()],
        }
    }

    const POST: Endpoint = Endpoint {
        name: "lookup",
        method: HttpMethod::Post,
        path: "/v1/lookup",
        placement: Placement::JsonBody,
    };

    const GET: Endpoint = Endpoint {
        name: "lookup",
        method: HttpMethod::Get,
        path: "/v1/lookup",
        placement: Placement::Query,
    };

    #[test]
    fn payload_applies_naming_and_omits_none() {
        let payload = to_payload(&lookup(), FieldNaming::CamelCase).unwrap();
        assert_eq!(Value::Object(payload), json!({"searchText": "acme", "tags": ["a", "b"]}));
    }

    #[test]
    fn payload_is_stable() {
        let first = to_payload(&lookup(), FieldNaming::CamelCase).unwrap();
        let second = to_payload(&lookup(), FieldNaming::CamelCase).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn payload_runs_validation_first() {
        let mut params = lookup();
        params.search_text.clear();
        let err = to_payload(&params, FieldNaming::CamelCase).unwrap_err();
        assert!(matches!(err, ApiError::Validation { ref path, .. } if path == "searchText"));
    }

    #[test]
    fn json_body_with_header_auth() {
        let payload = to_payload(&lookup(), FieldNaming::AsIs).unwrap();
        let req = encode(&POST, payload, AuthScheme::Header("x-api-key"), &settings()).unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "http://localhost:3000/v1/lookup");
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.header("x-api-key"), Some("k3y"));
        assert_eq!(req.timeout, Duration::from_secs(7));
        let body: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"search_text": "acme", "tags": ["a", "b"]}));
    }

    #[test]
    fn bearer_auth_header() {
        let payload = to_payload(&lookup(), FieldNaming::AsIs).unwrap();
        let req = encode(&POST, payload, AuthScheme::Bearer, &settings()).unwrap();
        assert_eq!(req.header("authorization"), Some("Bearer k3y"));
    }

    #[test]
    fn query_placement_encodes_scalars_and_lists() {
        let payload = to_payload(&lookup(), FieldNaming::CamelCase).unwrap();
        let req = encode(&GET, payload, AuthScheme::QueryParam("key"), &settings()).unwrap();
        assert!(req.body.is_none());
        assert!(req.headers.is_empty());
        assert_eq!(
            req.url,
            "http://localhost:3000/v1/lookup?searchText=acme&tags=a%2Cb&key=k3y"
        );
    }

    #[test]
    fn query_placement_rejects_objects() {
        let mut filter = Map::new();
        filter.insert("market".to_string(), json!("stock"));
        let payload = to_payload(&Nested { filter }, FieldNaming::AsIs).unwrap();
        let err = encode(&GET, payload, AuthScheme::None, &settings()).unwrap_err();
        assert!(matches!(err, ApiError::Validation { ref path, .. } if path == "filter"));
    }

    #[test]
    fn no_auth_adds_nothing() {
        let payload = to_payload(&lookup(), FieldNaming::AsIs).unwrap();
        let req = encode(&POST, payload, AuthScheme::None, &settings()).unwrap();
        assert_eq!(req.headers.len(), 1);
        assert!(!req.url.contains('?'));
    }
}
