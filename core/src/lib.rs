//! Typed asynchronous client core for external data and AI provider APIs.
//!
//! # Overview
//! Every call runs the same stateless pipeline:
//! settings → request builder → transport → response mapper.
//! The caller gets either a fully typed result or exactly one [`ApiError`].
//!
//! # Design
//! - [`SettingsResolver`] reads a fixed key set per connector prefix from the
//!   environment once and fails fast on missing secrets.
//! - Request building and response mapping are pure; `build_*` produces an
//!   [`HttpRequest`] and `parse_*` consumes an [`HttpResponse`], so hosts can
//!   run the I/O themselves.
//! - [`Transport`] is the only I/O seam; [`ReqwestTransport`] is the default.
//! - Retrying is left to the caller through [`RetryPolicy`].
//! - Connectors in [`connectors`] are thin instances of this pattern.

pub mod client;
pub mod connectors;
pub mod error;
pub mod http;
pub mod naming;
pub mod request;
pub mod response;
pub mod retry;
pub mod settings;
pub mod transport;
pub mod types;

pub use client::{ApiClient, Profile};
pub use error::{ApiError, ErrorInfo, ErrorKind};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use naming::FieldNaming;
pub use request::{AuthScheme, Endpoint, Payload, Placement, RequestParams};
pub use response::{FromRecord, Record};
pub use retry::RetryPolicy;
pub use settings::{Credentials, SettingKey, Settings, SettingsResolver};
pub use transport::{ReqwestTransport, Transport};
pub use types::{EntityType, MarketType};
