//! SIX financial entity search.
//!
//! `POST {endpoint}/v1/entities/search` with a camelCase JSON body; the API
//! key travels in the `x-api-key` header.

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
use crate::types::{EntityType, MarketType};

pub const ENV_PREFIX: &str = "SIX";
pub const DEFAULT_SEARCH_SIZE: u32 = 10;
pub const MAX_SEARCH_SIZE: u32 = 100;

const PROFILE: Profile = Profile {
    name: "six",
    naming: FieldNaming::CamelCase,
    auth: AuthScheme::Header("x-api-key"),
};

const SEARCH_ENTITIES: Endpoint = Endpoint {
    name: "search_entities",
    method: HttpMethod::Post,
    path: "/v1/entities/search",
    placement: Placement::JsonBody,
};

/// Free-text entity search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySearchParams {
    pub text: String,
    pub size: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<EntityType>,
}

impl EntitySearchParams {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            size: DEFAULT_SEARCH_SIZE,
            entity_type: None,
        }
    }

    #[must_use]
    pub fn size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    #[must_use]
    pub fn entity_type(mut self, entity_type: EntityType) -> Self {
        self.entity_type = Some(entity_type);
        self
    }
}

impl RequestParams for EntitySearchParams {
    fn validate(&self) -> Result<(), ApiError> {
        if self.text.trim().is_empty() {
            return Err(ApiError::validation("text", "must not be empty"));
        }
        if self.size == 0 || self.size > MAX_SEARCH_SIZE {
            return Err(ApiError::validation(
                "size",
                format!("must be between 1 and {MAX_SEARCH_SIZE}, got {}", self.size),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySearchResponse {
    /// Matches before the `size` limit was applied.
    pub total: u64,
    pub hits: Vec<Entity>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    pub id: String,
    pub name: String,
    pub entity_type: EntityType,
    pub score: f64,
    pub listings: Vec<Listing>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Listing {
    pub ticker: String,
    pub exchange: String,
    pub market_type: MarketType,
    pub currency: Option<String>,
}

impl FromRecord for EntitySearchResponse {
    fn from_record(record: &Record<'_>) -> Result<Self, ApiError> {
        Ok(Self {
            total: record.required_u64("total")?,
            hits: record.required_list("hits")?,
        })
    }
}

impl FromRecord for Entity {
    fn from_record(record: &Record<'_>) -> Result<Self, ApiError> {
        Ok(Self {
            id: record.required_str("id")?,
            name: record.required_str("name")?,
            entity_type: record.required_enum("entity_type")?,
            score: record.required_f64("score")?,
            listings: record.optional_list("listings")?,
        })
    }
}

impl FromRecord for Listing {
    fn from_record(record: &Record<'_>) -> Result<Self, ApiError> {
        Ok(Self {
            ticker: record.required_str("ticker")?,
            exchange: record.required_str("exchange")?,
            market_type: record.required_enum("market_type")?,
            currency: record.optional_str("currency")?,
        })
    }
}

/// Client for the SIX entity search API.
#[derive(Debug, Clone)]
pub struct SixClient {
    api: ApiClient,
}

impl SixClient {
    /// Keys read from `SIX_*`: `API_KEY` and `API_ENDPOINT` are required.
    pub fn resolver() -> SettingsResolver {
        SettingsResolver::new(ENV_PREFIX)
            .require(SettingKey::ApiKey)
            .require(SettingKey::ApiEndpoint)
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

    pub fn build_search_entities(&self, params: &EntitySearchParams) -> Result<HttpRequest, ApiError> {
        self.api.build(&SEARCH_ENTITIES, params)
    }

    pub fn parse_search_entities(&self, response: HttpResponse) -> Result<EntitySearchResponse, ApiError> {
        self.api.parse(&response)
    }

    pub async fn search_entities(&self, params: &EntitySearchParams) -> Result<EntitySearchResponse, ApiError> {
        self.api.call(&SEARCH_ENTITIES, params).await
    }

    /// Send a request produced by a `build_*` method, e.g. after overriding
    /// its timeout.
    pub async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.api.execute(request).await
    }
}
