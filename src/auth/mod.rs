//! OAuth 2 authentication for NationBuilder.
//!
//! Two flows are supported. The token flow presents the nation's authorize page in a
//! [`WebBrowser`] and picks the access token out of the redirect URL fragment. The
//! password flow posts the user's credentials to the token endpoint and is only
//! suitable for apps used by a single nation.
//!
//! Completions may run on the caller's stack (cached credential, failed
//! presentation, bad arguments) or later from a Tokio task.

mod browser;
mod store;

pub use browser::{MockWebBrowser, WebBrowser};
pub use store::{Credential, CredentialStore, InMemoryCredentialStore};

use crate::config::{DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};
use crate::errors::{ErrorMapper, NationBuilderError, NationBuilderResult, ServiceErrorDetails};
use crate::logging::{Logger, DEFAULT_LOG_LEVEL};
use crate::query::{Params, QueryCodec};
use crate::task::{self, TaskHandle};
use crate::transport::{HttpMethod, HttpRequest, HttpTransport, ReqwestHttpTransport};
use chrono::{Duration as ChronoDuration, Utc};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::level_filters::LevelFilter;
use url::Url;

/// Redirect path used when the caller has no preference.
pub const DEFAULT_REDIRECT_PATH: &str = "oauth/callback";

const AUTHORIZE_PATH: &str = "oauth/authorize";
const TOKEN_PATH: &str = "oauth/token";
const MAX_EXPIRES_IN_SECONDS: i64 = 10 * 365 * 24 * 60 * 60;

/// Completion invoked exactly once per authentication attempt.
pub type AuthenticationCompletion = Box<dyn FnOnce(NationBuilderResult<Credential>) + Send + 'static>;

/// Where an authenticator stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// No usable credential.
    Unauthenticated,
    /// A browser flow was started and its redirect has not arrived.
    AwaitingBrowserRedirect,
    /// A usable credential is available.
    Authenticated,
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthenticated => write!(f, "unauthenticated"),
            Self::AwaitingBrowserRedirect => write!(f, "awaiting_browser_redirect"),
            Self::Authenticated => write!(f, "authenticated"),
        }
    }
}

#[derive(Default)]
struct Session {
    credential: Option<Credential>,
    pending: Option<AuthenticationCompletion>,
}

struct AuthenticatorInner {
    base_url: Url,
    client_identifier: String,
    credential_identifier: String,
    should_persist_credential: bool,
    redirect_url_scheme: Option<String>,
    store: Arc<dyn CredentialStore>,
    browser: Option<Arc<dyn WebBrowser>>,
    transport: Arc<dyn HttpTransport>,
    error_mapper: ErrorMapper,
    logger: Logger,
    session: Mutex<Session>,
}

/// OAuth 2 client for one nation and one app.
///
/// Cloning is cheap; clones share the credential and any pending browser flow.
#[derive(Clone)]
pub struct Authenticator {
    inner: Arc<AuthenticatorInner>,
}

impl fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authenticator")
            .field("base_url", &self.inner.base_url.as_str())
            .field("client_identifier", &self.inner.client_identifier)
            .field("credential_identifier", &self.inner.credential_identifier)
            .field(
                "authenticating_in_web_browser",
                &self.is_authenticating_in_web_browser(),
            )
            .finish()
    }
}

impl Authenticator {
    /// Creates a builder for a nation's base URL and an OAuth client identifier.
    pub fn builder(base_url: impl Into<String>, client_identifier: impl Into<String>) -> AuthenticatorBuilder {
        AuthenticatorBuilder::new(base_url, client_identifier)
    }

    /// Gets the nation's base URL.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Gets the OAuth client identifier.
    pub fn client_identifier(&self) -> &str {
        &self.inner.client_identifier
    }

    /// Gets the identifier the credential is persisted under.
    pub fn credential_identifier(&self) -> &str {
        &self.inner.credential_identifier
    }

    /// Gets the identifier derived from the client identifier and the nation host.
    pub fn default_credential_identifier(&self) -> String {
        default_credential_identifier(&self.inner.client_identifier, &self.inner.base_url)
    }

    /// Returns true if credentials are written to the [`CredentialStore`].
    pub fn should_persist_credential(&self) -> bool {
        self.inner.should_persist_credential
    }

    /// Gets the current state.
    pub fn state(&self) -> AuthState {
        if self.is_authenticating_in_web_browser() {
            AuthState::AwaitingBrowserRedirect
        } else if self.credential().is_some() {
            AuthState::Authenticated
        } else {
            AuthState::Unauthenticated
        }
    }

    /// Returns true while a browser flow awaits its redirect.
    pub fn is_authenticating_in_web_browser(&self) -> bool {
        self.inner.session().pending.is_some()
    }

    /// Gets the current credential.
    ///
    /// Falls back to the store when persistence is on. An expired credential is
    /// discarded and reported as absent.
    pub fn credential(&self) -> Option<Credential> {
        let inner = &self.inner;
        let credential = {
            let mut session = inner.session();
            if session.credential.is_none() && inner.should_persist_credential {
                session.credential = inner.store.fetch(&inner.credential_identifier);
            }
            session.credential.clone()
        }?;

        if credential.is_expired() {
            inner.logger.info("Discarding expired credential");
            self.discard_credential();
            return None;
        }
        Some(credential)
    }

    /// Gets the current access token, if any.
    pub(crate) fn access_token(&self) -> Option<String> {
        self.credential()
            .map(|c| c.access_token().expose_secret().to_string())
    }

    /// Builds the authorize URL for the token flow.
    ///
    /// The redirect URI is `{scheme}://{redirect_path}` using the registered
    /// redirect scheme.
    pub fn build_authorization_url(&self, redirect_path: &str) -> NationBuilderResult<Url> {
        let inner = &self.inner;
        let redirect_uri = inner.redirect_uri(redirect_path)?;

        let mut params = Params::new();
        params.insert("client_id".into(), Value::String(inner.client_identifier.clone()));
        params.insert("redirect_uri".into(), Value::String(redirect_uri));
        params.insert("response_type".into(), Value::String("token".into()));

        let mut url = inner.endpoint(AUTHORIZE_PATH)?;
        url.set_query(Some(&QueryCodec::encode(&params)?));
        Ok(url)
    }

    /// Starts the browser token flow.
    ///
    /// Without `prior_signout` an existing credential completes the flow at once.
    /// Otherwise the credential is discarded and the authorize page is presented;
    /// `completion` then fires when the redirect is fed to
    /// [`Self::finish_browser_authentication`], the flow is cancelled, or the browser
    /// fails to present. A second call replaces the first call's pending completion.
    pub fn begin_browser_authentication<F>(&self, redirect_path: &str, prior_signout: bool, completion: F)
    where
        F: FnOnce(NationBuilderResult<Credential>) + Send + 'static,
    {
        let inner = &self.inner;

        if prior_signout {
            self.discard_credential();
        } else if let Some(credential) = self.credential() {
            inner.logger.debug("Using existing credential");
            completion(Ok(credential));
            return;
        }

        let url = match self.build_authorization_url(redirect_path) {
            Ok(url) => url,
            Err(e) => {
                completion(Err(e));
                return;
            }
        };
        let Some(browser) = inner.browser.clone() else {
            completion(Err(NationBuilderError::web_browser("No web browser configured")));
            return;
        };

        let replaced = inner.session().pending.replace(Box::new(completion)).is_some();
        if replaced {
            inner.logger.warn("Replacing a pending browser authentication");
        }

        inner.logger.info("Presenting web browser for authentication");
        if let Err(e) = browser.present(&url) {
            inner.logger.error(&format!("Failed to present web browser: {}", e));
            let error = NationBuilderError::web_browser(format!(
                "Failed to present web browser: {}",
                e.message()
            ))
            .with_cause(e);
            let pending = inner.session().pending.take();
            if let Some(pending) = pending {
                pending(Err(error));
            }
        }
    }

    /// Completes the browser token flow with the intercepted redirect URL.
    ///
    /// Returns false when the URL does not belong to this flow (unparseable, foreign
    /// scheme, or no flow pending); the pending flow is then left alone. A URL of the
    /// registered scheme whose fragment lacks an access token completes the flow with
    /// a `UrlType` error and also returns false; the credential is unchanged.
    pub fn finish_browser_authentication(&self, redirect_url: &str) -> bool {
        let inner = &self.inner;

        let Ok(url) = Url::parse(redirect_url) else {
            inner.logger.warn("Ignoring unparseable redirect URL");
            return false;
        };
        let Some(scheme) = inner.redirect_url_scheme.as_deref() else {
            return false;
        };
        if !url.scheme().eq_ignore_ascii_case(scheme) {
            inner.logger.debug(&format!("Ignoring redirect with scheme '{}'", url.scheme()));
            return false;
        }
        let Some(pending) = inner.session().pending.take() else {
            inner.logger.warn("Received redirect without a pending browser authentication");
            return false;
        };
        if let Some(browser) = &inner.browser {
            browser.dismiss();
        }

        let fragment = RedirectFragment::from_url(&url);
        match fragment.into_credential() {
            Ok(credential) => {
                inner.logger.info("Browser authentication succeeded");
                pending(inner.adopt_credential(credential));
                true
            }
            Err(e) => {
                inner.logger.warn(&format!("Browser authentication failed: {}", e.message()));
                pending(Err(e));
                false
            }
        }
    }

    /// Abandons a pending browser flow, completing it with `UserCancelled`.
    ///
    /// Returns false if no flow was pending.
    pub fn cancel_browser_authentication(&self) -> bool {
        let inner = &self.inner;
        let Some(pending) = inner.session().pending.take() else {
            return false;
        };
        if let Some(browser) = &inner.browser {
            browser.dismiss();
        }
        inner.logger.info("Browser authentication cancelled");
        pending(Err(NationBuilderError::user_cancelled(
            "The user cancelled authentication",
        )));
        true
    }

    /// Runs the password grant.
    ///
    /// Returns `None` when the arguments are rejected up front; `completion` has then
    /// already been called with the error.
    pub fn authenticate_with_password<F>(
        &self,
        username: &str,
        password: &str,
        client_secret: &str,
        completion: F,
    ) -> Option<TaskHandle>
    where
        F: FnOnce(NationBuilderResult<Credential>) + Send + 'static,
    {
        let request = match self.password_grant_request(username, password, client_secret) {
            Ok(request) => request,
            Err(e) => {
                completion(Err(e));
                return None;
            }
        };
        if let Err(e) = task::ensure_runtime() {
            completion(Err(e));
            return None;
        }

        let work_inner = Arc::clone(&self.inner);
        let deliver_inner = Arc::clone(&self.inner);
        let work_request = request.clone();

        Some(TaskHandle::spawn(
            request,
            true,
            async move { Some(work_inner.request_password_grant(work_request).await) },
            move |result: NationBuilderResult<Credential>| {
                let result = result.and_then(|credential| {
                    deliver_inner.logger.info("Password authentication succeeded");
                    deliver_inner.adopt_credential(credential)
                });
                if let Err(e) = &result {
                    deliver_inner
                        .logger
                        .warn(&format!("Password authentication failed: {}", e));
                }
                completion(result);
            },
        ))
    }

    /// Injects a credential obtained elsewhere, e.g. from the app's own web view.
    ///
    /// The credential is kept in memory even when persisting it fails; the
    /// `Keychain` error only reports the failed save.
    pub fn set_credential(&self, access_token: &str, token_type: Option<&str>) -> NationBuilderResult<()> {
        let credential = Credential::new(access_token, token_type.map(String::from))?;
        self.inner.adopt_credential(credential).map(|_| ())
    }

    /// Forgets the credential in memory and in the store.
    ///
    /// Returns false if there was nothing to discard.
    pub fn discard_credential(&self) -> bool {
        let inner = &self.inner;
        let had_credential = inner.session().credential.take().is_some();
        let deleted = inner.should_persist_credential && inner.store.delete(&inner.credential_identifier);
        if had_credential || deleted {
            inner.logger.info("Discarded credential");
        }
        had_credential || deleted
    }

    fn password_grant_request(
        &self,
        username: &str,
        password: &str,
        client_secret: &str,
    ) -> NationBuilderResult<HttpRequest> {
        for (name, value) in [
            ("Username", username),
            ("Password", password),
            ("Client secret", client_secret),
        ] {
            if value.is_empty() {
                return Err(NationBuilderError::invalid_argument(format!("{} cannot be empty", name)));
            }
        }

        let inner = &self.inner;
        let body = serde_urlencoded::to_string(&[
            ("client_id", inner.client_identifier.as_str()),
            ("client_secret", client_secret),
            ("grant_type", "password"),
            ("password", password),
            ("username", username),
        ])
        .map_err(|e| {
            NationBuilderError::invalid_argument(format!("Failed to encode token request: {}", e))
                .with_cause(e)
        })?;

        let mut request = HttpRequest::new(HttpMethod::Post, inner.endpoint(TOKEN_PATH)?.to_string());
        request.set_header("Content-Type", "application/x-www-form-urlencoded");
        request.set_header("Accept", "application/json");
        request.body = Some(body);
        Ok(request)
    }
}

impl AuthenticatorInner {
    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn endpoint(&self, path: &str) -> NationBuilderResult<Url> {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let directory = format!("{}/", base.path());
            base.set_path(&directory);
        }
        base.join(path).map_err(|e| {
            NationBuilderError::configuration(format!("Invalid OAuth endpoint '{}': {}", path, e))
                .with_cause(e)
        })
    }

    fn redirect_uri(&self, redirect_path: &str) -> NationBuilderResult<String> {
        let scheme = self.redirect_url_scheme.as_deref().ok_or_else(|| {
            NationBuilderError::configuration("No redirect URL scheme registered")
        })?;
        let path = redirect_path.trim_start_matches('/');
        if path.is_empty() {
            return Err(NationBuilderError::invalid_argument("Redirect path cannot be empty"));
        }
        Ok(format!("{}://{}", scheme, path))
    }

    /// Makes `credential` current and persists it when configured.
    fn adopt_credential(&self, credential: Credential) -> NationBuilderResult<Credential> {
        self.session().credential = Some(credential.clone());

        if self.should_persist_credential && !self.store.save(&credential, &self.credential_identifier) {
            self.logger.error("Failed to persist credential");
            return Err(NationBuilderError::keychain(format!(
                "Failed to save credential '{}'",
                self.credential_identifier
            )));
        }
        Ok(credential)
    }

    async fn request_password_grant(&self, request: HttpRequest) -> NationBuilderResult<Credential> {
        let mapper = &self.error_mapper;
        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| mapper.map_transport(e))?;
        let json: Option<Value> = serde_json::from_str(&response.body).ok();

        if let Some(error) = json.as_ref().and_then(oauth_error) {
            return Err(error.with_status(response.status).with_body(response.body.clone()));
        }
        if !mapper.is_successful(response.status) {
            return Err(mapper.map_failure(&response, json.as_ref()));
        }
        let Some(json) = json else {
            return Err(mapper.map_malformed_success(&response, None, "Token response is not JSON"));
        };

        let token: TokenResponse = serde_json::from_value(json.clone()).map_err(|e| {
            mapper.map_malformed_success(&response, Some(&json), format!("Malformed token response: {}", e))
        })?;
        let credential = Credential::new(token.access_token, token.token_type)
            .map_err(|e| mapper.map_malformed_success(&response, Some(&json), e.message().to_string()))?;
        Ok(match token.expires_in {
            Some(seconds) => credential.with_expires_at(expiry_from_now(seconds)),
            None => credential,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OAuthErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

fn oauth_error(json: &Value) -> Option<NationBuilderError> {
    let response: OAuthErrorResponse = serde_json::from_value(json.clone()).ok()?;
    let message = response
        .error_description
        .unwrap_or_else(|| response.error.clone());
    Some(
        NationBuilderError::new(crate::errors::NationBuilderErrorKind::Service, message.clone())
            .with_service_details(ServiceErrorDetails {
                code: response.error,
                message,
                ..Default::default()
            }),
    )
}

fn expiry_from_now(seconds: i64) -> chrono::DateTime<Utc> {
    Utc::now() + ChronoDuration::seconds(seconds.clamp(0, MAX_EXPIRES_IN_SECONDS))
}

fn default_credential_identifier(client_identifier: &str, base_url: &Url) -> String {
    format!(
        "nationbuilder-credential:{}:{}",
        client_identifier,
        base_url.host_str().unwrap_or_default()
    )
}

/// Token-flow parameters carried in a redirect URL fragment.
#[derive(Debug, Default)]
struct RedirectFragment {
    access_token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl RedirectFragment {
    fn from_url(url: &Url) -> Self {
        let mut fragment = Self::default();
        for (key, value) in QueryCodec::decode(url.fragment().unwrap_or_default()) {
            match key.as_str() {
                "access_token" => fragment.access_token = Some(value),
                "token_type" => fragment.token_type = Some(value),
                "expires_in" => fragment.expires_in = Some(value),
                "error" => fragment.error = Some(value),
                "error_description" => fragment.error_description = Some(value),
                _ => {}
            }
        }
        fragment
    }

    fn into_credential(self) -> NationBuilderResult<Credential> {
        let Some(access_token) = self.access_token.filter(|t| !t.is_empty()) else {
            let message = match (self.error, self.error_description) {
                (Some(error), Some(description)) => format!("{}: {}", error, description),
                (Some(error), None) => format!("Authorization failed: {}", error),
                _ => "Redirect URL does not contain an access token".to_string(),
            };
            return Err(NationBuilderError::url_type(message));
        };

        let credential = Credential::new(access_token, self.token_type)?;
        let expires_in = self
            .expires_in
            .filter(|s| QueryCodec::is_numeric(s))
            .and_then(|s| s.parse::<i64>().ok());
        Ok(match expires_in {
            Some(seconds) => credential.with_expires_at(expiry_from_now(seconds)),
            None => credential,
        })
    }
}

/// Builder for [`Authenticator`].
pub struct AuthenticatorBuilder {
    base_url: String,
    client_identifier: String,
    credential_identifier: Option<String>,
    should_persist_credential: bool,
    redirect_url_scheme: Option<String>,
    store: Option<Arc<dyn CredentialStore>>,
    browser: Option<Arc<dyn WebBrowser>>,
    transport: Option<Arc<dyn HttpTransport>>,
    timeout: Duration,
    user_agent: String,
    log_level: LevelFilter,
}

impl AuthenticatorBuilder {
    /// Creates a builder for a nation's base URL and an OAuth client identifier.
    pub fn new(base_url: impl Into<String>, client_identifier: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client_identifier: client_identifier.into(),
            credential_identifier: None,
            should_persist_credential: true,
            redirect_url_scheme: None,
            store: None,
            browser: None,
            transport: None,
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            log_level: DEFAULT_LOG_LEVEL,
        }
    }

    /// Overrides the identifier the credential is persisted under.
    pub fn credential_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.credential_identifier = Some(identifier.into());
        self
    }

    /// Turns credential persistence on or off.
    pub fn persist_credential(mut self, persist: bool) -> Self {
        self.should_persist_credential = persist;
        self
    }

    /// Sets the URL scheme the app registered for redirects.
    pub fn redirect_url_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.redirect_url_scheme = Some(scheme.into());
        self
    }

    /// Sets the credential store.
    pub fn credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the web browser used by the token flow.
    pub fn web_browser(mut self, browser: Arc<dyn WebBrowser>) -> Self {
        self.browser = Some(browser);
        self
    }

    /// Sets the HTTP transport used by the password flow.
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the request timeout of the default transport.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the User-Agent of the default transport.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the log level.
    pub fn log_level(mut self, level: LevelFilter) -> Self {
        self.log_level = level;
        self
    }

    /// Builds the authenticator.
    pub fn build(self) -> NationBuilderResult<Authenticator> {
        let base_url = Url::parse(&self.base_url).map_err(|e| {
            NationBuilderError::configuration(format!("Invalid base URL '{}': {}", self.base_url, e))
                .with_cause(e)
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(NationBuilderError::configuration(
                "Base URL must start with http:// or https://",
            ));
        }
        if self.client_identifier.trim().is_empty() {
            return Err(NationBuilderError::configuration("Client identifier cannot be empty"));
        }
        if let Some(scheme) = &self.redirect_url_scheme {
            let valid = scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
            if !valid {
                return Err(NationBuilderError::configuration(format!(
                    "Invalid redirect URL scheme '{}'",
                    scheme
                )));
            }
        }

        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestHttpTransport::new(self.timeout, &self.user_agent)?),
        };
        let credential_identifier = self
            .credential_identifier
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| default_credential_identifier(&self.client_identifier, &base_url));

        Ok(Authenticator {
            inner: Arc::new(AuthenticatorInner {
                base_url,
                client_identifier: self.client_identifier,
                credential_identifier,
                should_persist_credential: self.should_persist_credential,
                redirect_url_scheme: self.redirect_url_scheme,
                store: self
                    .store
                    .unwrap_or_else(|| Arc::new(InMemoryCredentialStore::new())),
                browser: self.browser,
                transport,
                error_mapper: ErrorMapper::default(),
                logger: Logger::new("authenticator", self.log_level),
                session: Mutex::new(Session::default()),
            }),
        })
    }
}
