//! # NationBuilder Integration Library
//!
//! A NationBuilder API client with:
//! - Resource operations (fetch list, fetch item, create, save, delete) on any endpoint
//! - Legacy (page number) and token (next/prev link) pagination
//! - A structured error taxonomy separating transport, HTTP and service errors
//! - OAuth 2 token flow (browser redirect) and password flow
//! - Pluggable transport, credential store, web browser and pipeline hooks
//!
//! Operations return immediately with an optional [`TaskHandle`] and report through
//! a completion. Completions may run on the caller's stack when an argument is
//! rejected, so callers must not assume they run later.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use integrations_nationbuilder::{NationBuilderClient, NationBuilderConfig, PaginationInfo};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = NationBuilderConfig::builder("mynation")
//!         .api_key("test-token")
//!         .legacy_pagination()
//!         .build()?;
//!     let client = NationBuilderClient::new(config)?;
//!
//!     let (tx, rx) = tokio::sync::oneshot::channel();
//!     let page = PaginationInfo::legacy(1, 25);
//!     client.people().list(Some(&page), move |result| {
//!         let _ = tx.send(result);
//!     });
//!
//!     let people = rx.await??;
//!     println!("{} people on the first page", people.items.len());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
pub mod config;
pub mod errors;
pub mod logging;
pub mod query;

// Authentication
pub mod auth;

// Requests and transport
pub mod hooks;
pub mod request;
pub mod task;
pub mod transport;

// Client
pub mod client;

// Pagination handling
pub mod pagination;

// API Services
pub mod services;

// Re-exports for convenience
pub use auth::{
    AuthState, Authenticator, AuthenticatorBuilder, Credential, CredentialStore,
    InMemoryCredentialStore, MockWebBrowser, WebBrowser,
};
pub use client::{ItemCompletion, ListCompletion, NationBuilderClient, NationBuilderClientBuilder, ResourceList};
pub use config::{ClientAuth, NationBuilderConfig, NationBuilderConfigBuilder};
pub use errors::{ErrorMapper, NationBuilderError, NationBuilderErrorKind, NationBuilderResult, ServiceErrorDetails};
pub use hooks::{ClientHooks, DefaultHooks};
pub use logging::Logger;
pub use pagination::{PaginationDirection, PaginationInfo, PaginationStyle};
pub use query::{Params, QueryCodec};
pub use request::RequestBuilder;
pub use task::TaskHandle;
pub use transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, MockHttpTransport, ReqwestHttpTransport};
