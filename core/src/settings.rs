//! Connector settings resolved once from the environment.
//!
//! # Design
//! Each connector owns an environment prefix and reads a fixed set of keys
//! (see [`SettingKey`]) named `{PREFIX}_{SUFFIX}`. Values come from the
//! process environment first and then from an optional local env file. The
//! file is parsed, never exported into the process environment.
//!
//! Resolution is fail-fast: a required key that is absent or empty is a
//! [`ApiError::Configuration`] naming the variable. Secrets never get
//! defaults; only the endpoint and the timeout may fall back to a
//! connector-provided or built-in value.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use tracing::debug;

use crate::error::ApiError;

/// Per-call timeout used when `{PREFIX}_TIMEOUT_SECS` is not set.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Env file consulted by `resolve_env` unless another path is configured.
pub const DEFAULT_ENV_FILE: &str = ".env";

/// The recognized setting keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    ApiKey,
    ApiEndpoint,
    EngineId,
    ServiceAccountCredentials,
    TimeoutSecs,
}

impl SettingKey {
    pub const ALL: [SettingKey; 5] = [
        SettingKey::ApiKey,
        SettingKey::ApiEndpoint,
        SettingKey::EngineId,
        SettingKey::ServiceAccountCredentials,
        SettingKey::TimeoutSecs,
    ];

    pub fn suffix(self) -> &'static str {
        match self {
            SettingKey::ApiKey => "API_KEY",
            SettingKey::ApiEndpoint => "API_ENDPOINT",
            SettingKey::EngineId => "ENGINE_ID",
            SettingKey::ServiceAccountCredentials => "SERVICE_ACCOUNT_CREDENTIALS",
            SettingKey::TimeoutSecs => "TIMEOUT_SECS",
        }
    }

    pub fn is_secret(self) -> bool {
        matches!(self, SettingKey::ApiKey | SettingKey::ServiceAccountCredentials)
    }

    /// Full variable name, e.g. `SIX_API_KEY`.
    pub fn var_name(self, prefix: &str) -> String {
        format!("{prefix}_{}", self.suffix())
    }
}

/// Secret material for one connector. Immutable after resolution.
#[derive(Debug)]
pub struct Credentials {
    api_key: Option<SecretString>,
    engine_id: Option<String>,
    service_account_credentials: Option<SecretString>,
}

impl Credentials {
    pub fn api_key(&self) -> Option<&SecretString> {
        self.api_key.as_ref()
    }

    pub fn engine_id(&self) -> Option<&str> {
        self.engine_id.as_deref()
    }

    pub fn service_account_credentials(&self) -> Option<&SecretString> {
        self.service_account_credentials.as_ref()
    }
}

/// Fully validated settings for one connector.
#[derive(Debug)]
pub struct Settings {
    prefix: String,
    endpoint: String,
    timeout: Duration,
    credentials: Credentials,
}

impl Settings {
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Base URL without a trailing slash.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// The API key, or a configuration error naming the variable that
    /// should have provided it.
    pub fn require_api_key(&self) -> Result<&SecretString, ApiError> {
        self.credentials.api_key().ok_or_else(|| {
            ApiError::Configuration(format!(
                "{} is required by this connector",
                SettingKey::ApiKey.var_name(&self.prefix)
            ))
        })
    }

    pub fn require_engine_id(&self) -> Result<&str, ApiError> {
        self.credentials.engine_id().ok_or_else(|| {
            ApiError::Configuration(format!(
                "{} is required by this connector",
                SettingKey::EngineId.var_name(&self.prefix)
            ))
        })
    }
}

/// Builder describing which keys a connector needs and where to read them.
#[derive(Debug, Clone)]
pub struct SettingsResolver {
    prefix: String,
    required: Vec<SettingKey>,
    default_endpoint: Option<String>,
    env_file: Option<PathBuf>,
}

impl SettingsResolver {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.trim_end_matches('_').to_string(),
            required: Vec::new(),
            default_endpoint: None,
            env_file: Some(PathBuf::from(DEFAULT_ENV_FILE)),
        }
    }

    #[must_use]
    pub fn require(mut self, key: SettingKey) -> Self {
        if !self.required.contains(&key) {
            self.required.push(key);
        }
        self
    }

    #[must_use]
    pub fn default_endpoint(mut self, endpoint: &str) -> Self {
        self.default_endpoint = Some(endpoint.to_string());
        self
    }

    /// Read missing values from `path` in addition to the process
    /// environment. A file that does not exist is skipped.
    #[must_use]
    pub fn env_file(mut self, path: impl AsRef<Path>) -> Self {
        self.env_file = Some(path.as_ref().to_path_buf());
        self
    }

    #[must_use]
    pub fn without_env_file(mut self) -> Self {
        self.env_file = None;
        self
    }

    /// Resolve from the process environment, falling back to the env file.
    pub fn resolve_env(&self) -> Result<Settings, ApiError> {
        let file_values = match &self.env_file {
            Some(path) => read_env_file(path)?,
            None => HashMap::new(),
        };
        self.resolve_with(|name| {
            std::env::var(name)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .or_else(|| file_values.get(name).cloned())
        })
    }

    /// Resolve through an arbitrary lookup function. Empty values count as
    /// absent.
    pub fn resolve_with<F>(&self, lookup: F) -> Result<Settings, ApiError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let fetch = |key: SettingKey| -> Result<Option<String>, ApiError> {
            let name = key.var_name(&self.prefix);
            let value = lookup(&name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
            if value.is_none() && self.required.contains(&key) {
                return Err(ApiError::Configuration(format!("{name} is not set")));
            }
            Ok(value)
        };

        let api_key = fetch(SettingKey::ApiKey)?;
        let endpoint = fetch(SettingKey::ApiEndpoint)?
            .or_else(|| self.default_endpoint.clone())
            .ok_or_else(|| {
                ApiError::Configuration(format!(
                    "{} is not set",
                    SettingKey::ApiEndpoint.var_name(&self.prefix)
                ))
            })?;
        let engine_id = fetch(SettingKey::EngineId)?;
        let service_account_credentials = fetch(SettingKey::ServiceAccountCredentials)?;
        let timeout = match fetch(SettingKey::TimeoutSecs)? {
            Some(raw) => parse_timeout(&SettingKey::TimeoutSecs.var_name(&self.prefix), &raw)?,
            None => DEFAULT_TIMEOUT,
        };

        let endpoint = validate_endpoint(&SettingKey::ApiEndpoint.var_name(&self.prefix), &endpoint)?;
        debug!(prefix = %self.prefix, %endpoint, ?timeout, "resolved connector settings");

        Ok(Settings {
            prefix: self.prefix.clone(),
            endpoint,
            timeout,
            credentials: Credentials {
                api_key: api_key.map(SecretString::from),
                engine_id,
                service_account_credentials: service_account_credentials.map(SecretString::from),
            },
        })
    }
}

fn read_env_file(path: &Path) -> Result<HashMap<String, String>, ApiError> {
    let iter = match dotenv::from_path_iter(path) {
        Ok(iter) => iter,
        Err(dotenv::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(HashMap::new());
        }
        Err(e) => {
            return Err(ApiError::Configuration(format!(
                "cannot read env file {}: {e}",
                path.display()
            )));
        }
    };

    let mut values = HashMap::new();
    for entry in iter {
        let (key, value) = entry.map_err(|e| {
            ApiError::Configuration(format!("malformed env file {}: {e}", path.display()))
        })?;
        values.insert(key, value);
    }
    Ok(values)
}

fn parse_timeout(name: &str, raw: &str) -> Result<Duration, ApiError> {
    match raw.parse::<u64>() {
        Ok(0) => Err(ApiError::Configuration(format!("{name} must be greater than zero"))),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(_) => Err(ApiError::Configuration(format!(
            "{name} must be a whole number of seconds, got {raw:?}"
        ))),
    }
}

fn validate_endpoint(name: &str, raw: &str) -> Result<String, ApiError> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| ApiError::Configuration(format!("{name} is not a valid URL: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.cannot_be_a_base() {
        return Err(ApiError::Configuration(format!(
            "{name} must be an http or https base URL, got {raw:?}"
        )));
    }
    if parsed.query().is_some() || parsed.fragment().is_some() {
        return Err(ApiError::Configuration(format!(
            "{name} must not carry a query string or fragment, got {raw:?}"
        )));
    }
    Ok(raw.trim_end_matches('/').to_string())
}
