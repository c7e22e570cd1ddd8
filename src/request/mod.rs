//! Request construction against a nation-scoped API base URL.

use crate::errors::{NationBuilderError, NationBuilderResult};
use crate::hooks::ClientHooks;
use crate::logging::{redact_query_parameter, Logger};
use crate::query::{Params, QueryCodec};
use crate::transport::{HttpMethod, HttpRequest};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// Placeholder that replaces identifier segments in a resource pattern.
pub const IDENTIFIER_PLACEHOLDER: &str = ":id";

const JSON_CONTENT_TYPE: &str = "application/json";

/// Builds [`HttpRequest`]s for `{base}/api/{version}/{sub_path}`.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    api_base_url: String,
    api_key_parameter: String,
    timeout: Option<Duration>,
    logger: Logger,
}

impl RequestBuilder {
    /// Creates a builder rooted at `base_url` for the given API version.
    pub fn new(
        base_url: &str,
        api_version: &str,
        api_key_parameter: impl Into<String>,
        logger: Logger,
    ) -> Self {
        Self {
            api_base_url: format!(
                "{}/api/{}",
                base_url.trim_end_matches('/'),
                api_version.trim_matches('/')
            ),
            api_key_parameter: api_key_parameter.into(),
            timeout: None,
            logger,
        }
    }

    /// Sets the per-request timeout stamped on every request.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Gets `{base}/api/{version}`.
    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    /// Gets the name of the query parameter carrying the access token.
    pub fn api_key_parameter(&self) -> &str {
        &self.api_key_parameter
    }

    /// Joins the base URL with `sub_path` and appends the encoded query.
    ///
    /// The access token, when given, is added as a query parameter and overrides any
    /// caller-supplied value of the same name.
    pub fn build_url(
        &self,
        sub_path: &str,
        query: &Params,
        access_token: Option<&str>,
    ) -> NationBuilderResult<String> {
        let path = encode_sub_path(sub_path)?;

        let mut query = query.clone();
        if let Some(token) = access_token {
            query.insert(self.api_key_parameter.clone(), Value::String(token.to_string()));
        }
        let query = QueryCodec::encode(&query)?;

        let url = if query.is_empty() {
            format!("{}/{}", self.api_base_url, path)
        } else {
            format!("{}/{}?{}", self.api_base_url, path, query)
        };

        url::Url::parse(&url).map_err(|e| {
            NationBuilderError::invalid_argument(format!("Invalid request URL: {}", e)).with_cause(e)
        })?;
        Ok(url)
    }

    /// Builds a request for `method` on `sub_path`.
    ///
    /// GET and DELETE fold `params` into the query string. POST and PUT send them as a
    /// JSON object body.
    pub fn build_request(
        &self,
        method: HttpMethod,
        sub_path: &str,
        params: &Params,
        access_token: Option<&str>,
    ) -> NationBuilderResult<HttpRequest> {
        let mut request = if method.uses_query_parameters() {
            HttpRequest::new(method, self.build_url(sub_path, params, access_token)?)
        } else {
            let url = self.build_url(sub_path, &Params::new(), access_token)?;
            let body = serde_json::to_string(params).map_err(|e| {
                NationBuilderError::invalid_argument(format!("Failed to encode request body: {}", e))
                    .with_cause(e)
            })?;
            let mut request = HttpRequest::new(method, url);
            request.set_header("Content-Type", JSON_CONTENT_TYPE);
            request.body = Some(body);
            request
        };
        request.set_header("Accept", JSON_CONTENT_TYPE);
        request.timeout = self.timeout;

        if access_token.is_none() {
            self.logger.warn(&format!(
                "Sending unauthenticated {} request for {}",
                method,
                resource_pattern(sub_path)
            ));
        }
        Ok(request)
    }

    /// Runs the request hook, restoring the method and URL if the hook replaced them.
    pub fn prepare(&self, mut request: HttpRequest, hooks: &dyn ClientHooks) -> HttpRequest {
        let method = request.method;
        let url = request.url.clone();

        hooks.will_create_request(&mut request);

        if request.method != method || request.url != url {
            self.logger.warn(&format!(
                "Request hook may not replace method or URL; restoring {} {}",
                method,
                redact_query_parameter(&url, &self.api_key_parameter)
            ));
            request.method = method;
            request.url = url;
        }
        self.logger.debug(&format!(
            "{} {}",
            request.method,
            redact_query_parameter(&request.url, &self.api_key_parameter)
        ));
        request
    }
}

/// Converts any serializable value into request parameters.
///
/// The value must serialize to a JSON object.
pub fn params_from<T: Serialize + ?Sized>(value: &T) -> NationBuilderResult<Params> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Params::new()),
        Ok(other) => Err(NationBuilderError::invalid_argument(format!(
            "Request parameters must be an object, got {}",
            json_type_name(&other)
        ))),
        Err(e) => Err(NationBuilderError::invalid_argument(format!(
            "Failed to encode request parameters: {}",
            e
        ))
        .with_cause(e)),
    }
}

/// Replaces numeric path segments with [`IDENTIFIER_PLACEHOLDER`].
///
/// `people/42/taggings` becomes `people/:id/taggings`.
pub fn resource_pattern(sub_path: &str) -> String {
    sub_path
        .trim_matches('/')
        .split('/')
        .map(|segment| {
            if QueryCodec::is_numeric(segment) {
                IDENTIFIER_PLACEHOLDER
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn encode_sub_path(sub_path: &str) -> NationBuilderResult<String> {
    let trimmed = sub_path.trim_matches('/');
    if trimmed.is_empty() {
        return Err(NationBuilderError::invalid_argument("Sub-path cannot be empty"));
    }
    if trimmed.contains(['?', '#']) {
        return Err(NationBuilderError::invalid_argument(
            "Sub-path cannot contain a query or fragment",
        ));
    }

    let mut segments = Vec::new();
    for segment in trimmed.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(NationBuilderError::invalid_argument(format!(
                "Invalid sub-path '{}'",
                sub_path
            )));
        }
        segments.push(QueryCodec::percent_escape(segment, ""));
    }
    Ok(segments.join("/"))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
