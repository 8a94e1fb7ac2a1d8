//! Generic typed API client shared by every connector.
//!
//! # Design
//! `ApiClient` holds a connector [`Profile`], the connector's immutable
//! [`Settings`] and a [`Transport`], and runs the per-call pipeline:
//!
//! 1. `build`: typed params → validated payload → `HttpRequest` (pure)
//! 2. `execute`: `HttpRequest` → raw `HttpResponse` through the transport
//! 3. `parse`: status classification → schema validation → typed result (pure)
//!
//! `call` chains the three steps. Steps 1 and 3 are exposed separately so a
//! host can run the I/O itself. The client carries no mutable state; clones
//! share settings and transport through `Arc` and can be used concurrently.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};
use crate::naming::FieldNaming;
use crate::request::{self, AuthScheme, Endpoint, RequestParams};
use crate::response::{self, FromRecord};
use crate::settings::Settings;
use crate::transport::{ReqwestTransport, Transport};

/// Static description of how a backend is called.
#[derive(Debug, Clone, Copy)]
pub struct Profile {
    pub name: &'static str,
    pub naming: FieldNaming,
    pub auth: AuthScheme,
}

#[derive(Clone)]
pub struct ApiClient {
    profile: Profile,
    settings: Arc<Settings>,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("profile", &self.profile)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Client using the default `reqwest` transport.
    pub fn new(profile: Profile, settings: Settings) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::new()?;
        Ok(Self::with_transport(profile, Arc::new(settings), Arc::new(transport)))
    }

    pub fn with_transport(
        profile: Profile,
        settings: Arc<Settings>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            profile,
            settings,
            transport,
        }
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn build<P>(&self, endpoint: &Endpoint, params: &P) -> Result<HttpRequest, ApiError>
    where
        P: RequestParams + ?Sized,
    {
        let payload = request::to_payload(params, self.profile.naming)?;
        request::encode(endpoint, payload, self.profile.auth, &self.settings)
    }

    pub fn parse<R: FromRecord>(&self, response: &HttpResponse) -> Result<R, ApiError> {
        response::map_response(response, self.profile.naming)
    }

    #[instrument(skip_all, fields(connector = self.profile.name, method = request.method.as_str()))]
    pub async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let result = self.transport.send(request).await;
        match &result {
            Ok(response) => debug!(status = response.status, "backend replied"),
            Err(e) => warn!(error = %e, kind = ?e.kind(), "transport failed"),
        }
        result
    }

    /// Build, send and parse one call to `endpoint`.
    pub async fn call<P, R>(&self, endpoint: &Endpoint, params: &P) -> Result<R, ApiError>
    where
        P: RequestParams + Sync + ?Sized,
        R: FromRecord,
    {
        let request = self.build(endpoint, params)?;
        self.send_parsed(endpoint, request).await
    }

    /// Send an already built request for `endpoint` and parse the reply.
    /// For connectors that add settings-derived fields while building.
    pub async fn send_parsed<R: FromRecord>(
        &self,
        endpoint: &Endpoint,
        request: HttpRequest,
    ) -> Result<R, ApiError> {
        debug!(connector = self.profile.name, endpoint = endpoint.name, "calling backend");
        let response = self.execute(request).await?;
        self.parse(&response).inspect_err(|e| {
            warn!(
                connector = self.profile.name,
                endpoint = endpoint.name,
                error = %e,
                "backend reply rejected"
            );
        })
    }
}
