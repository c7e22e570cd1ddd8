//! Error types for the NationBuilder client.

mod mapper;

pub use mapper::{ErrorMapper, SUCCESSFUL_STATUSES};

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Result type alias for NationBuilder operations.
pub type NationBuilderResult<T> = Result<T, NationBuilderError>;

/// Error kinds for categorizing NationBuilder errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NationBuilderErrorKind {
    /// No response was received (timeout, DNS, TLS, connection failure).
    Transport,
    /// A response outside the success set without a service-error body.
    Http,
    /// The body carried the service error envelope.
    Service,
    /// A successful status whose body is malformed or lacks the results key.
    InvalidResponse,
    /// A local precondition failed before any request was built.
    InvalidArgument,
    /// The client or authenticator was configured incorrectly.
    InvalidConfiguration,
    /// An authorization redirect URL could not be understood.
    UrlType,
    /// The web browser could not be presented.
    WebBrowser,
    /// The credential store rejected an operation.
    Keychain,
    /// The user abandoned the browser flow.
    UserCancelled,
}

impl fmt::Display for NationBuilderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport => write!(f, "transport_error"),
            Self::Http => write!(f, "http_error"),
            Self::Service => write!(f, "service_error"),
            Self::InvalidResponse => write!(f, "invalid_response"),
            Self::InvalidArgument => write!(f, "invalid_argument"),
            Self::InvalidConfiguration => write!(f, "invalid_configuration"),
            Self::UrlType => write!(f, "url_type_error"),
            Self::WebBrowser => write!(f, "web_browser_error"),
            Self::Keychain => write!(f, "keychain_error"),
            Self::UserCancelled => write!(f, "user_cancelled"),
        }
    }
}

/// Structured fields of a service error body.
///
/// The wire shape is `{"code": ..., "message": ..., "validation_errors": {...}, "error": {...}}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceErrorDetails {
    /// Service error code, rendered as a string.
    pub code: String,
    /// Human readable message.
    pub message: String,
    /// Field name to validation messages.
    pub validation_errors: BTreeMap<String, Vec<String>>,
    /// Nested error object, when the service provided one.
    pub inner_error: Option<Box<ServiceErrorDetails>>,
}

impl ServiceErrorDetails {
    /// Parses the service error envelope out of a JSON body.
    ///
    /// Returns `None` unless the body is an object with both `code` and `message`.
    pub fn from_json(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let code = scalar_to_string(object.get("code")?)?;
        let message = object.get("message")?.as_str()?.to_string();

        let mut details = Self {
            code,
            message,
            ..Default::default()
        };
        if let Some(errors) = object.get("validation_errors").and_then(Value::as_object) {
            details.validation_errors = parse_validation_errors(errors);
        }
        if let Some(inner) = object.get("error") {
            details.inner_error = Self::from_inner_json(inner).map(Box::new);
        }
        Some(details)
    }

    // Inner errors are parsed leniently; either field may be missing.
    fn from_inner_json(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let code = object.get("code").and_then(scalar_to_string);
        let message = object
            .get("message")
            .and_then(Value::as_str)
            .map(String::from);
        if code.is_none() && message.is_none() {
            return None;
        }
        let mut details = Self {
            code: code.unwrap_or_default(),
            message: message.unwrap_or_default(),
            ..Default::default()
        };
        if let Some(errors) = object.get("validation_errors").and_then(Value::as_object) {
            details.validation_errors = parse_validation_errors(errors);
        }
        if let Some(inner) = object.get("error") {
            details.inner_error = Self::from_inner_json(inner).map(Box::new);
        }
        Some(details)
    }

    /// Returns true if the service reported field-level validation failures.
    pub fn has_validation_errors(&self) -> bool {
        !self.validation_errors.is_empty()
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_validation_errors(errors: &serde_json::Map<String, Value>) -> BTreeMap<String, Vec<String>> {
    errors
        .iter()
        .map(|(field, messages)| {
            let messages = match messages {
                Value::Array(items) => items
                    .iter()
                    .filter_map(|m| m.as_str().map(String::from))
                    .collect(),
                Value::String(s) => vec![s.clone()],
                _ => Vec::new(),
            };
            (field.clone(), messages)
        })
        .collect()
}

/// NationBuilder error with detailed information.
#[derive(Error, Debug)]
pub struct NationBuilderError {
    kind: NationBuilderErrorKind,
    message: String,
    status_code: Option<u16>,
    service: Option<ServiceErrorDetails>,
    body: Option<String>,
    retry_after: Option<u64>,
    #[source]
    cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for NationBuilderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)?;
        if let Some(code) = self.status_code {
            write!(f, " (HTTP {})", code)?;
        }
        if let Some(ref service) = self.service {
            write!(f, " [code: {}]", service.code)?;
        }
        Ok(())
    }
}

impl NationBuilderError {
    /// Creates a new error.
    pub fn new(kind: NationBuilderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status_code: None,
            service: None,
            body: None,
            retry_after: None,
            cause: None,
        }
    }

    /// Sets the HTTP status code.
    pub fn with_status(mut self, code: u16) -> Self {
        self.status_code = Some(code);
        self
    }

    /// Attaches structured service error fields.
    pub fn with_service_details(mut self, details: ServiceErrorDetails) -> Self {
        self.service = Some(details);
        self
    }

    /// Attaches the raw response body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets the retry-after hint in seconds.
    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after = Some(seconds);
        self
    }

    /// Sets the underlying cause.
    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Gets the error kind.
    pub fn kind(&self) -> NationBuilderErrorKind {
        self.kind
    }

    /// Gets the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Gets the HTTP status code.
    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    /// Gets the structured service error fields.
    pub fn service_details(&self) -> Option<&ServiceErrorDetails> {
        self.service.as_ref()
    }

    /// Gets the raw response body.
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Gets the retry-after hint in seconds.
    pub fn retry_after(&self) -> Option<u64> {
        self.retry_after
    }

    /// Returns true if the server rejected the caller's credentials.
    pub fn is_unauthorized(&self) -> bool {
        self.status_code == Some(401)
    }

    // Convenience constructors

    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(NationBuilderErrorKind::Transport, message)
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(NationBuilderErrorKind::InvalidArgument, message)
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(NationBuilderErrorKind::InvalidConfiguration, message)
    }

    /// Creates an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(NationBuilderErrorKind::InvalidResponse, message)
    }

    /// Creates a redirect URL error.
    pub fn url_type(message: impl Into<String>) -> Self {
        Self::new(NationBuilderErrorKind::UrlType, message)
    }

    /// Creates a web browser error.
    pub fn web_browser(message: impl Into<String>) -> Self {
        Self::new(NationBuilderErrorKind::WebBrowser, message)
    }

    /// Creates a credential store error.
    pub fn keychain(message: impl Into<String>) -> Self {
        Self::new(NationBuilderErrorKind::Keychain, message)
    }

    /// Creates a user cancellation error.
    pub fn user_cancelled(message: impl Into<String>) -> Self {
        Self::new(NationBuilderErrorKind::UserCancelled, message)
    }
}
