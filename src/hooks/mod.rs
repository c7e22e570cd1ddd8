//! Pipeline hooks.
//!
//! Every method has a default that lets the client proceed. Returning `false` from
//! a `should_*` method tells the client the caller has taken over: the pipeline
//! stops and the operation's completion is never invoked.

use crate::errors::NationBuilderError;
use crate::transport::{HttpRequest, HttpResponse};
use serde_json::Value;

/// Extension points invoked by [`crate::NationBuilderClient`] while it runs a request.
pub trait ClientHooks: Send + Sync {
    /// Called synchronously right before dispatch.
    ///
    /// Headers, body and timeout may be changed. Changes to the method or URL are
    /// reverted.
    fn will_create_request(&self, _request: &mut HttpRequest) {}

    /// Whether the request is dispatched immediately.
    ///
    /// When this returns `false` the returned [`crate::TaskHandle`] stays idle until
    /// started.
    fn should_auto_start(&self, _request: &HttpRequest) -> bool {
        true
    }

    /// Called after a body was parsed as JSON, before anything is extracted from it.
    fn did_parse_json(&self, _json: &mut Value, _response: &HttpResponse, _request: &HttpRequest) {}

    /// Whether the client handles a received response at all.
    fn should_handle_response(&self, _response: &HttpResponse, _request: &HttpRequest) -> bool {
        true
    }

    /// Whether the client handles a failure that produced no response.
    fn should_handle_transport_error(
        &self,
        _error: &NationBuilderError,
        _request: &HttpRequest,
    ) -> bool {
        true
    }

    /// Whether the client handles a response outside the success set.
    fn should_handle_http_error(
        &self,
        _error: &NationBuilderError,
        _response: &HttpResponse,
        _request: &HttpRequest,
    ) -> bool {
        true
    }

    /// Whether the client handles a response carrying the service error envelope.
    fn should_handle_service_error(
        &self,
        _error: &NationBuilderError,
        _response: &HttpResponse,
        _request: &HttpRequest,
    ) -> bool {
        true
    }
}

/// Hooks that always proceed.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHooks;

impl ClientHooks for DefaultHooks {}
