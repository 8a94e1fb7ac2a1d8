//! OpenAI-compatible chat completion.
//!
//! `POST {endpoint}/v1/chat/completions`, snake_case JSON, bearer token.

use std::fmt;
use std::str::FromStr;
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

pub const ENV_PREFIX: &str = "OPENAI";
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com";

const PROFILE: Profile = Profile {
    name: "chat",
    naming: FieldNaming::AsIs,
    auth: AuthScheme::Bearer,
};

const COMPLETIONS: Endpoint = Endpoint {
    name: "chat_completions",
    method: HttpMethod::Post,
    path: "/v1/chat/completions",
    placement: Placement::JsonBody,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

impl ChatRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
            ChatRole::Tool => "tool",
        }
    }
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChatRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(ChatRole::System),
            "user" => Ok(ChatRole::User),
            "assistant" => Ok(ChatRole::Assistant),
            "tool" => Ok(ChatRole::Tool),
            other => Err(format!("unknown chat role {other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionParams {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ChatCompletionParams {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
        }
    }

    #[must_use]
    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    #[must_use]
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

impl RequestParams for ChatCompletionParams {
    fn validate(&self) -> Result<(), ApiError> {
        if self.model.trim().is_empty() {
            return Err(ApiError::validation("model", "must not be empty"));
        }
        if self.messages.is_empty() {
            return Err(ApiError::validation("messages", "at least one message is required"));
        }
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(ApiError::validation(
                    "temperature",
                    format!("must be between 0 and 2, got {t}"),
                ));
            }
        }
        if self.max_tokens == Some(0) {
            return Err(ApiError::validation("max_tokens", "must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatCompletion {
    pub id: String,
    pub model: String,
    pub choices: Vec<ChatChoice>,
    pub usage: Option<Usage>,
}

impl ChatCompletion {
    /// Content of the first choice, if any.
    pub fn first_content(&self) -> Option<&str> {
        self.choices.first().map(|choice| choice.message.content.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatChoice {
    pub index: u64,
    pub message: ChatMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl FromRecord for ChatCompletion {
    fn from_record(record: &Record<'_>) -> Result<Self, ApiError> {
        Ok(Self {
            id: record.required_str("id")?,
            model: record.required_str("model")?,
            choices: record.required_list("choices")?,
            usage: record.optional_nested("usage")?,
        })
    }
}

impl FromRecord for ChatChoice {
    fn from_record(record: &Record<'_>) -> Result<Self, ApiError> {
        Ok(Self {
            index: record.required_u64("index")?,
            message: record.nested("message")?,
            finish_reason: record.optional_str("finish_reason")?,
        })
    }
}

impl FromRecord for ChatMessage {
    fn from_record(record: &Record<'_>) -> Result<Self, ApiError> {
        Ok(Self {
            role: record.required_enum("role")?,
            // null when the assistant answered with tool calls only
            content: record.optional_str("content")?.unwrap_or_default(),
        })
    }
}

impl FromRecord for Usage {
    fn from_record(record: &Record<'_>) -> Result<Self, ApiError> {
        Ok(Self {
            prompt_tokens: record.required_u64("prompt_tokens")?,
            completion_tokens: record.required_u64("completion_tokens")?,
            total_tokens: record.required_u64("total_tokens")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ChatClient {
    api: ApiClient,
}

impl ChatClient {
    /// Keys read from `OPENAI_*`: `API_KEY` is required, `API_ENDPOINT`
    /// defaults to the public API.
    pub fn resolver() -> SettingsResolver {
        SettingsResolver::new(ENV_PREFIX)
            .require(SettingKey::ApiKey)
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

    pub fn build_complete(&self, params: &ChatCompletionParams) -> Result<HttpRequest, ApiError> {
        self.api.build(&COMPLETIONS, params)
    }

    pub fn parse_complete(&self, response: HttpResponse) -> Result<ChatCompletion, ApiError> {
        self.api.parse(&response)
    }

    pub async fn complete(&self, params: &ChatCompletionParams) -> Result<ChatCompletion, ApiError> {
        self.api.call(&COMPLETIONS, params).await
    }

    /// Send a request produced by a `build_*` method, e.g. after overriding
    /// its timeout.
    pub async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.api.execute(request).await
    }
}
