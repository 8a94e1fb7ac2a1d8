//! Connectors built on [`ApiClient`](crate::ApiClient), one module per
//! backend.

pub mod chat;
pub mod google;
pub mod six;

pub use chat::{ChatClient, ChatCompletion, ChatCompletionParams, ChatMessage, ChatRole};
pub use google::{GoogleSearchClient, SafeSearch, SearchItem, WebSearchParams, WebSearchResponse};
pub use six::{Entity, EntitySearchParams, EntitySearchResponse, Listing, SixClient};
