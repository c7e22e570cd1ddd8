//! NationBuilder API client.
//!
//! Every operation builds its request synchronously, then runs the exchange on a
//! Tokio task and reports through a completion that is invoked at most once. The
//! completion is skipped when the returned [`TaskHandle`] is cancelled or when a
//! [`ClientHooks`] method takes over the response.

use crate::config::{ClientAuth, NationBuilderConfig};
use crate::errors::{ErrorMapper, NationBuilderError, NationBuilderErrorKind, NationBuilderResult};
use crate::hooks::{ClientHooks, DefaultHooks};
use crate::logging::{redact_query_parameter, Logger};
use crate::pagination::{PaginationInfo, PaginationStyle};
use crate::query::Params;
use crate::request::{resource_pattern, RequestBuilder};
use crate::services::*;
use crate::task::{self, TaskHandle};
use crate::transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestHttpTransport};
use secrecy::ExposeSecret;
use serde_json::Value;
use std::sync::Arc;

/// Items of a list response with the paging state that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceList {
    /// Items under the results key.
    pub items: Vec<Value>,
    /// Paging state built from the response's sibling fields.
    pub pagination: Option<PaginationInfo>,
}

/// Completion of a list fetch.
pub type ListCompletion = Box<dyn FnOnce(NationBuilderResult<ResourceList>) + Send + 'static>;

/// Completion of an item operation. `Ok(None)` means the server returned no item.
pub type ItemCompletion = Box<dyn FnOnce(NationBuilderResult<Option<Value>>) + Send + 'static>;

/// Shape of the payload an operation expects.
#[derive(Debug, Clone)]
enum Expectation {
    List(Option<PaginationInfo>),
    Item,
}

/// Payload extracted from a successful exchange.
enum Payload {
    List(ResourceList),
    Item(Option<Value>),
}

struct ClientInner {
    config: NationBuilderConfig,
    request_builder: RequestBuilder,
    transport: Arc<dyn HttpTransport>,
    hooks: Arc<dyn ClientHooks>,
    error_mapper: ErrorMapper,
    logger: Logger,
}

/// NationBuilder API client.
#[derive(Clone)]
pub struct NationBuilderClient {
    inner: Arc<ClientInner>,
}

impl NationBuilderClient {
    /// Creates a client with the default transport and hooks.
    pub fn new(config: NationBuilderConfig) -> NationBuilderResult<Self> {
        Self::builder(config).build()
    }

    /// Creates a new client builder.
    pub fn builder(config: NationBuilderConfig) -> NationBuilderClientBuilder {
        NationBuilderClientBuilder::new(config)
    }

    /// Gets the configuration.
    pub fn config(&self) -> &NationBuilderConfig {
        &self.inner.config
    }

    /// Gets `{base}/api/{version}`.
    pub fn api_base_url(&self) -> &str {
        self.inner.request_builder.api_base_url()
    }

    /// Gets the authenticator, when the client authenticates through one.
    pub fn authenticator(&self) -> Option<&crate::auth::Authenticator> {
        match &self.inner.config.auth {
            Some(ClientAuth::Authenticator(authenticator)) => Some(authenticator),
            _ => None,
        }
    }

    // Service accessors

    /// Gets the people service.
    pub fn people(&self) -> PeopleService<'_> {
        PeopleService::new(self)
    }

    /// Gets the lists service.
    pub fn lists(&self) -> ListsService<'_> {
        ListsService::new(self)
    }

    /// Gets the tags service.
    pub fn tags(&self) -> TagsService<'_> {
        TagsService::new(self)
    }

    /// Gets the sites service.
    pub fn sites(&self) -> SitesService<'_> {
        SitesService::new(self)
    }

    /// Gets the surveys service.
    pub fn surveys(&self) -> SurveysService<'_> {
        SurveysService::new(self)
    }

    /// Gets the donations service.
    pub fn donations(&self) -> DonationsService<'_> {
        DonationsService::new(self)
    }

    /// Gets the contacts service.
    pub fn contacts(&self) -> ContactsService<'_> {
        ContactsService::new(self)
    }

    // Resource operations

    /// Fetches a list.
    ///
    /// `pagination` selects the page; its query parameters override same-named
    /// entries in `params`. The result carries a fresh [`PaginationInfo`] and
    /// `pagination` itself is never modified.
    pub fn fetch_list<F>(
        &self,
        sub_path: &str,
        params: &Params,
        results_key: Option<&str>,
        pagination: Option<&PaginationInfo>,
        completion: F,
    ) -> Option<TaskHandle>
    where
        F: FnOnce(NationBuilderResult<ResourceList>) + Send + 'static,
    {
        let style = self.inner.config.pagination_style;
        let mut params = params.clone();
        let request_pagination = match pagination {
            Some(pagination) => {
                params.extend(pagination.query_parameters());
                pagination.clone()
            }
            None => {
                let mut info = PaginationInfo::from_map(&params, style == PaginationStyle::Legacy);
                if style == PaginationStyle::Legacy && info.current_page_number() == 0 {
                    info.set_current_page_number(1);
                }
                info
            }
        };

        self.list_operation(
            HttpMethod::Get,
            sub_path,
            &params,
            results_key,
            Some(request_pagination),
            completion,
        )
    }

    /// Saves with a PUT and reads a list back.
    ///
    /// Used by endpoints that accept a batch and answer with every stored record.
    pub fn save_list<F>(&self, sub_path: &str, params: &Params, results_key: Option<&str>, completion: F) -> Option<TaskHandle>
    where
        F: FnOnce(NationBuilderResult<ResourceList>) + Send + 'static,
    {
        self.list_operation(HttpMethod::Put, sub_path, params, results_key, None, completion)
    }

    /// Fetches one item.
    pub fn fetch_item<F>(&self, sub_path: &str, params: &Params, results_key: Option<&str>, completion: F) -> Option<TaskHandle>
    where
        F: FnOnce(NationBuilderResult<Option<Value>>) + Send + 'static,
    {
        self.item_operation(HttpMethod::Get, sub_path, params, results_key, completion)
    }

    /// Creates an item with a POST.
    pub fn create<F>(&self, sub_path: &str, params: &Params, results_key: Option<&str>, completion: F) -> Option<TaskHandle>
    where
        F: FnOnce(NationBuilderResult<Option<Value>>) + Send + 'static,
    {
        self.item_operation(HttpMethod::Post, sub_path, params, results_key, completion)
    }

    /// Saves an item with a PUT.
    pub fn save<F>(&self, sub_path: &str, params: &Params, results_key: Option<&str>, completion: F) -> Option<TaskHandle>
    where
        F: FnOnce(NationBuilderResult<Option<Value>>) + Send + 'static,
    {
        self.item_operation(HttpMethod::Put, sub_path, params, results_key, completion)
    }

    /// Deletes an item. A 204 with no body completes with `Ok(None)`.
    pub fn delete<F>(&self, sub_path: &str, params: &Params, results_key: Option<&str>, completion: F) -> Option<TaskHandle>
    where
        F: FnOnce(NationBuilderResult<Option<Value>>) + Send + 'static,
    {
        self.item_operation(HttpMethod::Delete, sub_path, params, results_key, completion)
    }

    fn list_operation<F>(
        &self,
        method: HttpMethod,
        sub_path: &str,
        params: &Params,
        results_key: Option<&str>,
        pagination: Option<PaginationInfo>,
        completion: F,
    ) -> Option<TaskHandle>
    where
        F: FnOnce(NationBuilderResult<ResourceList>) + Send + 'static,
    {
        self.dispatch(method, sub_path, params, results_key, Expectation::List(pagination), move |result| {
            completion(result.and_then(|payload| match payload {
                Payload::List(list) => Ok(list),
                Payload::Item(_) => Err(NationBuilderError::invalid_response("Expected a list")),
            }))
        })
    }

    fn item_operation<F>(
        &self,
        method: HttpMethod,
        sub_path: &str,
        params: &Params,
        results_key: Option<&str>,
        completion: F,
    ) -> Option<TaskHandle>
    where
        F: FnOnce(NationBuilderResult<Option<Value>>) + Send + 'static,
    {
        self.dispatch(method, sub_path, params, results_key, Expectation::Item, move |result| {
            completion(result.and_then(|payload| match payload {
                Payload::Item(item) => Ok(item),
                Payload::List(_) => Err(NationBuilderError::invalid_response("Expected an item")),
            }))
        })
    }

    /// Builds the request on the caller's stack and spawns the exchange.
    ///
    /// Local failures are reported to `completion` right away and yield `None`.
    fn dispatch<F>(
        &self,
        method: HttpMethod,
        sub_path: &str,
        params: &Params,
        results_key: Option<&str>,
        expectation: Expectation,
        completion: F,
    ) -> Option<TaskHandle>
    where
        F: FnOnce(NationBuilderResult<Payload>) + Send + 'static,
    {
        let inner = &self.inner;

        let results_key = match results_key {
            Some(key) if key.is_empty() => {
                completion(Err(NationBuilderError::invalid_argument("Results key cannot be empty")));
                return None;
            }
            Some(key) => key.to_string(),
            None => inner.config.results_key_for(sub_path).to_string(),
        };

        let access_token = inner.access_token();
        let request = match inner
            .request_builder
            .build_request(method, sub_path, params, access_token.as_deref())
        {
            Ok(request) => request,
            Err(e) => {
                inner.logger.warn(&format!("Rejected {} {}: {}", method, resource_pattern(sub_path), e));
                completion(Err(e));
                return None;
            }
        };
        if let Err(e) = task::ensure_runtime() {
            completion(Err(e));
            return None;
        }

        let request = inner.request_builder.prepare(request, inner.hooks.as_ref());
        let auto_start = inner.hooks.should_auto_start(&request);
        if !auto_start {
            inner.logger.debug("Deferring request until started");
        }

        let work_inner = Arc::clone(inner);
        let work_request = request.clone();
        Some(TaskHandle::spawn(
            request,
            auto_start,
            async move { work_inner.run(work_request, &results_key, expectation).await },
            completion,
        ))
    }
}

impl ClientInner {
    fn access_token(&self) -> Option<String> {
        match &self.config.auth {
            Some(ClientAuth::ApiKey(key)) => Some(key.expose_secret().clone()),
            Some(ClientAuth::Authenticator(authenticator)) => authenticator.access_token(),
            None => None,
        }
    }

    fn redacted(&self, url: &str) -> String {
        redact_query_parameter(url, self.request_builder.api_key_parameter())
    }

    async fn run(
        &self,
        request: HttpRequest,
        results_key: &str,
        expectation: Expectation,
    ) -> Option<NationBuilderResult<Payload>> {
        let (response, json) = match self.exchange(&request).await? {
            Ok(exchange) => exchange,
            Err(e) => return Some(Err(e)),
        };

        let extracted = match expectation {
            Expectation::List(pagination) => {
                self.extract_list(&response, json, results_key, pagination.as_ref())
            }
            Expectation::Item => self.extract_item(&response, json, results_key),
        };

        match extracted {
            Err(e) if e.kind() == NationBuilderErrorKind::Service => {
                if !self.hooks.should_handle_service_error(&e, &response, &request) {
                    return None;
                }
                Some(Err(e))
            }
            Err(e) => {
                self.logger.warn(&format!("Invalid response from {}: {}", self.redacted(&request.url), e));
                Some(Err(e))
            }
            Ok(payload) => Some(Ok(payload)),
        }
    }

    /// Sends the request and classifies the response.
    ///
    /// Yields `None` when a hook took over. Successful responses come back with their
    /// parsed body; `Some(Err(_))` inside the tuple marks a body that is not JSON.
    async fn exchange(
        &self,
        request: &HttpRequest,
    ) -> Option<NationBuilderResult<(HttpResponse, Option<Result<Value, serde_json::Error>>)>> {
        let response = match self.transport.send(request.clone()).await {
            Ok(response) => response,
            Err(e) => {
                let error = self.error_mapper.map_transport(e);
                self.logger.warn(&format!(
                    "{} {} failed: {}",
                    request.method,
                    self.redacted(&request.url),
                    error
                ));
                if !self.hooks.should_handle_transport_error(&error, request) {
                    return None;
                }
                return Some(Err(error));
            }
        };
        self.logger.debug(&format!(
            "{} {} -> {}",
            request.method,
            self.redacted(&request.url),
            response.status
        ));

        if !self.hooks.should_handle_response(&response, request) {
            return None;
        }

        let mut json = if response.body.trim().is_empty() {
            None
        } else {
            Some(serde_json::from_str::<Value>(&response.body))
        };
        if let Some(Ok(value)) = json.as_mut() {
            self.hooks.did_parse_json(value, &response, request);
        }

        if !self.error_mapper.is_successful(response.status) {
            let parsed = json.as_ref().and_then(|j| j.as_ref().ok());
            let error = self.error_mapper.map_failure(&response, parsed);
            self.logger.warn(&format!(
                "{} {} returned {}",
                request.method,
                self.redacted(&request.url),
                error
            ));
            let proceed = if error.kind() == NationBuilderErrorKind::Service {
                self.hooks.should_handle_service_error(&error, &response, request)
            } else {
                self.hooks.should_handle_http_error(&error, &response, request)
            };
            if !proceed {
                return None;
            }
            return Some(Err(error));
        }

        Some(Ok((response, json)))
    }

    fn results_object<'a>(
        &self,
        response: &HttpResponse,
        json: &'a Option<Result<Value, serde_json::Error>>,
        results_key: &str,
    ) -> NationBuilderResult<(&'a serde_json::Map<String, Value>, &'a Value)> {
        let value = match json {
            Some(Ok(value)) => value,
            Some(Err(e)) => {
                return Err(self
                    .error_mapper
                    .map_malformed_success(response, None, format!("Response body is not valid JSON: {}", e)))
            }
            None => {
                return Err(self
                    .error_mapper
                    .map_malformed_success(response, None, "Response body is empty"))
            }
        };
        let Some(object) = value.as_object() else {
            return Err(self
                .error_mapper
                .map_malformed_success(response, Some(value), "Response body is not a JSON object"));
        };
        let Some(results) = object.get(results_key) else {
            return Err(self.error_mapper.map_malformed_success(
                response,
                Some(value),
                format!("Response is missing the '{}' key", results_key),
            ));
        };
        Ok((object, results))
    }

    fn extract_list(
        &self,
        response: &HttpResponse,
        json: Option<Result<Value, serde_json::Error>>,
        results_key: &str,
        request_pagination: Option<&PaginationInfo>,
    ) -> NationBuilderResult<Payload> {
        if json.is_none() && self.error_mapper.is_successful_empty(response.status) {
            return Ok(Payload::List(ResourceList {
                items: Vec::new(),
                pagination: None,
            }));
        }

        let (object, results) = self.results_object(response, &json, results_key)?;
        let Some(items) = results.as_array() else {
            return Err(NationBuilderError::invalid_response(format!(
                "'{}' is not a list",
                results_key
            ))
            .with_status(response.status)
            .with_body(response.body.clone()));
        };

        let pagination = PaginationInfo::from_response(
            object,
            self.config.pagination_style,
            request_pagination,
            self.request_builder.api_key_parameter(),
        );
        Ok(Payload::List(ResourceList {
            items: items.clone(),
            pagination: Some(pagination),
        }))
    }

    fn extract_item(
        &self,
        response: &HttpResponse,
        json: Option<Result<Value, serde_json::Error>>,
        results_key: &str,
    ) -> NationBuilderResult<Payload> {
        if json.is_none() {
            return Ok(Payload::Item(None));
        }

        let (_, item) = self.results_object(response, &json, results_key)?;
        Ok(Payload::Item(match item {
            Value::Null => None,
            item => Some(item.clone()),
        }))
    }
}

/// Builder for [`NationBuilderClient`].
pub struct NationBuilderClientBuilder {
    config: NationBuilderConfig,
    transport: Option<Arc<dyn HttpTransport>>,
    hooks: Option<Arc<dyn ClientHooks>>,
}

impl NationBuilderClientBuilder {
    /// Creates a builder for `config`.
    pub fn new(config: NationBuilderConfig) -> Self {
        Self {
            config,
            transport: None,
            hooks: None,
        }
    }

    /// Sets the HTTP transport.
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the pipeline hooks.
    pub fn hooks(mut self, hooks: Arc<dyn ClientHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Builds the client.
    pub fn build(self) -> NationBuilderResult<NationBuilderClient> {
        let config = self.config;
        config.validate()?;

        let logger = Logger::new("client", config.log_level);
        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestHttpTransport::new(config.timeout, &config.user_agent)?),
        };
        let request_builder = RequestBuilder::new(
            &config.resolved_base_url(),
            &config.api_version,
            config.api_key_parameter.clone(),
            logger.for_component("request"),
        )
        .with_timeout(config.timeout);

        if config.auth.is_none() {
            logger.warn("No authentication configured; requests will be unauthenticated");
        }

        Ok(NationBuilderClient {
            inner: Arc::new(ClientInner {
                error_mapper: ErrorMapper::new(config.successful_empty_statuses.iter().copied()),
                request_builder,
                transport,
                hooks: self.hooks.unwrap_or_else(|| Arc::new(DefaultHooks)),
                logger,
                config,
            }),
        })
    }
}
