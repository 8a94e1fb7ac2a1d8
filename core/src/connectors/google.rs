//! Google programmable search (Custom Search JSON API).
//!
//! `GET {endpoint}/customsearch/v1` with every parameter in the query
//! string. The API key goes in `key`, the search engine id in `cx`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::client::{ApiClient, Profile};
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::naming::FieldNaming;
use crate::request::{AuthScheme, Endpoint, Placement, RequestParams};
use crate::response::{FromRecord, Record};
use crate::settings::{SettingKey, Settings, SettingsResolver};
use crate::transport::Transport;

pub const ENV_PREFIX: &str = "GOOGLE_SEARCH";
pub const DEFAULT_ENDPOINT: &str = "https://www.googleapis.com";
/// The API returns at most ten results per page.
pub const MAX_RESULTS_PER_PAGE: u32 = 10;

const PROFILE: Profile = Profile {
    name: "google_search",
    naming: FieldNaming::CamelCase,
    auth: AuthScheme::QueryParam("key"),
};

const SEARCH: Endpoint = Endpoint {
    name: "search",
    method: HttpMethod::Get,
    path: "/customsearch/v1",
    placement: Placement::Query,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafeSearch {
    Active,
    Off,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebSearchParams {
    #[serde(rename = "q")]
    pub query: String,
    /// Results per page, 1 to 10.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num: Option<u32>,
    /// 1-based index of the first result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe: Option<SafeSearch>,
}

impl WebSearchParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            num: None,
            start: None,
            safe: None,
        }
    }

    #[must_use]
    pub fn num(mut self, num: u32) -> Self {
        self.num = Some(num);
        self
    }

    #[must_use]
    pub fn start(mut self, start: u32) -> Self {
        self.start = Some(start);
        self
    }

    #[must_use]
    pub fn safe(mut self, safe: SafeSearch) -> Self {
        self.safe = Some(safe);
        self
    }
}

impl RequestParams for WebSearchParams {
    fn validate(&self) -> Result<(), ApiError> {
        if self.query.trim().is_empty() {
            return Err(ApiError::validation("q", "must not be empty"));
        }
        if let Some(num) = self.num {
            if num == 0 || num > MAX_RESULTS_PER_PAGE {
                return Err(ApiError::validation(
                    "num",
                    format!("must be between 1 and {MAX_RESULTS_PER_PAGE}, got {num}"),
                ));
            }
        }
        if self.start == Some(0) {
            return Err(ApiError::validation("start", "is 1-based"));
        }
        Ok(())
    }
}

/// Wire parameters: caller params plus the engine id from settings.
#[derive(Serialize)]
struct SearchQuery<'a> {
    cx: &'a str,
    #[serde(flatten)]
    params: &'a WebSearchParams,
}

impl RequestParams for SearchQuery<'_> {
    fn validate(&self) -> Result<(), ApiError> {
        self.params.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebSearchResponse {
    pub total_results: u64,
    pub search_time: f64,
    pub items: Vec<SearchItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchItem {
    pub title: String,
    pub link: String,
    pub snippet: Option<String>,
    pub display_link: Option<String>,
}

impl FromRecord for WebSearchResponse {
    fn from_record(record: &Record<'_>) -> Result<Self, ApiError> {
        let info = record.required_record("search_information")?;
        // Reported as a decimal string, e.g. "1240".
        let total_results = info
            .required_str("total_results")?
            .parse::<u64>()
            .map_err(|_| info.invalid("total_results", "expected a decimal string"))?;
        Ok(Self {
            total_results,
            search_time: info.required_f64("search_time")?,
            items: record.optional_list("items")?,
        })
    }
}

impl FromRecord for SearchItem {
    fn from_record(record: &Record<'_>) -> Result<Self, ApiError> {
        Ok(Self {
            title: record.required_str("title")?,
            link: record.required_str("link")?,
            snippet: record.optional_str("snippet")?,
            display_link: record.optional_str("display_link")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct GoogleSearchClient {
    api: ApiClient,
}

impl GoogleSearchClient {
    /// Keys read from `GOOGLE_SEARCH_*`: `API_KEY` and `ENGINE_ID` are
    /// required, `API_ENDPOINT` defaults to the public API.
    pub fn resolver() -> SettingsResolver {
        SettingsResolver::new(ENV_PREFIX)
            .require(SettingKey::ApiKey)
            .require(SettingKey::EngineId)
            .default_endpoint(DEFAULT_ENDPOINT)
    }

    pub fn from_env() -> Result<Self, ApiError> {
        Self::new(Self::resolver().resolve_env()?)
    }

    pub fn new(settings: Settings) -> Result<Self, ApiError> {
        Ok(Self {
            api: ApiClient::new(PROFILE, settings)?,
        })
    }

    pub fn with_transport(settings: Arc<Settings>, transport: Arc<dyn Transport>) -> Self {
        Self {
            api: ApiClient::with_transport(PROFILE, settings, transport),
        }
    }

    pub fn build_search(&self, params: &WebSearchParams) -> Result<HttpRequest, ApiError> {
        let query = SearchQuery {
            cx: self.api.settings().require_engine_id()?,
            params,
        };
        self.api.build(&SEARCH, &query)
    }

    pub fn parse_search(&self, response: HttpResponse) -> Result<WebSearchResponse, ApiError> {
        self.api.parse(&response)
    }

    pub async fn search(&self, params: &WebSearchParams) -> Result<WebSearchResponse, ApiError> {
        let request = self.build_search(params)?;
        self.api.send_parsed(&SEARCH, request).await
    }

    /// Send a request produced by a `build_*` method, e.g. after overriding
    /// its timeout.
    pub async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.api.execute(request).await
    }
}
