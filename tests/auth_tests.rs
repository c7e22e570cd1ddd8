//! Integration tests for the token and password authentication flows.

use integrations_nationbuilder::{
    AuthState, Authenticator, Credential, CredentialStore, HttpMethod, HttpResponse,
    InMemoryCredentialStore, MockHttpTransport, MockWebBrowser, NationBuilderErrorKind,
    NationBuilderResult, QueryCodec,
};
use chrono::{Duration as ChronoDuration, Utc};
use pretty_assertions::assert_eq;
use secrecy::ExposeSecret;
use serde_json::json;
use std::sync::{mpsc, Arc};
use tokio::sync::oneshot;
use tokio_test::{assert_err, assert_ok};

const BASE_URL: &str = "https://demo.nationbuilder.com";

struct Fixture {
    authenticator: Authenticator,
    store: Arc<InMemoryCredentialStore>,
    browser: Arc<MockWebBrowser>,
    transport: Arc<MockHttpTransport>,
}

fn fixture() -> Fixture {
    let store = Arc::new(InMemoryCredentialStore::new());
    let browser = Arc::new(MockWebBrowser::new());
    let transport = Arc::new(MockHttpTransport::new());
    let authenticator = Authenticator::builder(BASE_URL, "client-123")
        .redirect_url_scheme("myapp")
        .credential_store(store.clone())
        .web_browser(browser.clone())
        .transport(transport.clone())
        .build()
        .unwrap();
    Fixture {
        authenticator,
        store,
        browser,
        transport,
    }
}

fn begin(authenticator: &Authenticator, prior_signout: bool) -> mpsc::Receiver<NationBuilderResult<Credential>> {
    let (tx, rx) = mpsc::channel();
    authenticator.begin_browser_authentication("oauth/callback", prior_signout, move |r| {
        let _ = tx.send(r);
    });
    rx
}

#[test]
fn test_authorization_url() {
    let f = fixture();
    let url = f.authenticator.build_authorization_url("oauth/callback").unwrap();

    assert_eq!(url.path(), "/oauth/authorize");
    let query = QueryCodec::decode(url.query().unwrap());
    assert_eq!(query["client_id"], "client-123");
    assert_eq!(query["redirect_uri"], "myapp://oauth/callback");
    assert_eq!(query["response_type"], "token");
}

#[test]
fn test_browser_flow_success() {
    let f = fixture();
    let rx = begin(&f.authenticator, true);

    assert_eq!(f.authenticator.state(), AuthState::AwaitingBrowserRedirect);
    assert_eq!(f.browser.presented_urls().len(), 1);
    assert!(rx.try_recv().is_err());

    assert!(f
        .authenticator
        .finish_browser_authentication("myapp://oauth/callback#access_token=XYZ&token_type=bearer"));

    let credential = rx.try_recv().unwrap().unwrap();
    assert_eq!(credential.access_token().expose_secret(), "XYZ");
    assert_eq!(credential.token_type(), Some("bearer"));
    assert_eq!(f.authenticator.state(), AuthState::Authenticated);
    assert_eq!(f.browser.dismissals(), 1);
    assert_eq!(
        f.store.fetch(f.authenticator.credential_identifier()),
        Some(credential)
    );
}

#[test]
fn test_browser_flow_with_expiry() {
    let f = fixture();
    let rx = begin(&f.authenticator, true);

    assert!(f
        .authenticator
        .finish_browser_authentication("myapp://oauth/callback#access_token=XYZ&expires_in=3600"));

    let expires_at = rx.try_recv().unwrap().unwrap().expires_at().unwrap();
    assert!(expires_at > Utc::now() + ChronoDuration::minutes(59));
    assert!(expires_at <= Utc::now() + ChronoDuration::minutes(60));
}

#[test]
fn test_malformed_redirect() {
    let f = fixture();
    let rx = begin(&f.authenticator, true);

    assert!(!f
        .authenticator
        .finish_browser_authentication("myapp://oauth/callback#error=access_denied"));

    let error = rx.try_recv().unwrap().unwrap_err();
    assert_eq!(error.kind(), NationBuilderErrorKind::UrlType);
    assert!(error.message().contains("access_denied"));
    assert!(f.authenticator.credential().is_none());
    assert!(!f.authenticator.is_authenticating_in_web_browser());
}

#[test]
fn test_foreign_redirect_leaves_flow_pending() {
    let f = fixture();
    let rx = begin(&f.authenticator, true);

    assert!(!f
        .authenticator
        .finish_browser_authentication("otherapp://oauth/callback#access_token=XYZ"));
    assert!(!f.authenticator.finish_browser_authentication("not a url"));

    assert!(rx.try_recv().is_err());
    assert!(f.authenticator.is_authenticating_in_web_browser());
}

#[test]
fn test_redirect_without_pending_flow() {
    let f = fixture();
    assert!(!f
        .authenticator
        .finish_browser_authentication("myapp://oauth/callback#access_token=XYZ"));
    assert!(f.authenticator.credential().is_none());
}

#[test]
fn test_cancel_browser_flow() {
    let f = fixture();
    let rx = begin(&f.authenticator, true);

    assert!(f.authenticator.cancel_browser_authentication());
    assert_eq!(
        rx.try_recv().unwrap().unwrap_err().kind(),
        NationBuilderErrorKind::UserCancelled
    );
    assert!(!f.authenticator.cancel_browser_authentication());
    assert_eq!(f.authenticator.state(), AuthState::Unauthenticated);
}

#[test]
fn test_presentation_failure() {
    let f = fixture();
    f.browser.fail_with("no display");
    let rx = begin(&f.authenticator, true);

    let error = rx.try_recv().unwrap().unwrap_err();
    assert_eq!(error.kind(), NationBuilderErrorKind::WebBrowser);
    assert!(!f.authenticator.is_authenticating_in_web_browser());
}

#[test]
fn test_existing_credential_short_circuits() {
    let f = fixture();
    assert_ok!(f.authenticator.set_credential("cached", None));

    let rx = begin(&f.authenticator, false);

    let credential = rx.try_recv().unwrap().unwrap();
    assert_eq!(credential.access_token().expose_secret(), "cached");
    assert!(f.browser.presented_urls().is_empty());
}

#[test]
fn test_prior_signout_discards_credential() {
    let f = fixture();
    assert_ok!(f.authenticator.set_credential("cached", None));

    let _rx = begin(&f.authenticator, true);

    assert!(!f.store.contains(f.authenticator.credential_identifier()));
    assert_eq!(f.browser.presented_urls().len(), 1);
}

#[test]
fn test_discard_is_idempotent() {
    let f = fixture();
    assert_ok!(f.authenticator.set_credential("token", Some("bearer")));

    assert!(f.authenticator.discard_credential());
    assert!(!f.authenticator.discard_credential());
    assert!(f.store.is_empty());
    assert_eq!(f.authenticator.state(), AuthState::Unauthenticated);
}

#[test]
fn test_expired_credential_is_discarded() {
    let f = fixture();
    let expired = Credential::new("old", None)
        .unwrap()
        .with_expires_at(Utc::now() - ChronoDuration::minutes(1));
    assert!(f.store.save(&expired, f.authenticator.credential_identifier()));

    assert!(f.authenticator.credential().is_none());
    assert!(f.store.is_empty());
}

#[test]
fn test_credential_restored_from_store() {
    let f = fixture();
    let saved = Credential::new("persisted", Some("bearer".into())).unwrap();
    assert!(f.store.save(&saved, f.authenticator.credential_identifier()));

    assert_eq!(f.authenticator.credential(), Some(saved));
    assert_eq!(f.authenticator.state(), AuthState::Authenticated);
}

#[test]
fn test_keychain_failure_keeps_credential_in_memory() {
    let f = fixture();
    f.store.set_fail_saves(true);

    let error = assert_err!(f.authenticator.set_credential("token", None));
    assert_eq!(error.kind(), NationBuilderErrorKind::Keychain);
    assert!(f.authenticator.credential().is_some());
}

#[test]
fn test_blank_token_rejected() {
    let f = fixture();
    let error = assert_err!(f.authenticator.set_credential("  ", None));
    assert_eq!(error.kind(), NationBuilderErrorKind::InvalidArgument);
}

#[tokio::test]
async fn test_password_grant_success() {
    let f = fixture();
    f.transport.queue_json_response(
        200,
        &json!({"access_token": "pw-token", "token_type": "bearer", "expires_in": 7200}),
    );

    let (tx, rx) = oneshot::channel();
    let handle = f
        .authenticator
        .authenticate_with_password("jane@example.com", "hunter2", "secret", move |r| {
            let _ = tx.send(r);
        });
    assert!(handle.is_some());

    let credential = rx.await.unwrap().unwrap();
    assert_eq!(credential.access_token().expose_secret(), "pw-token");
    assert!(credential.expires_at().unwrap() > Utc::now() + ChronoDuration::minutes(119));
    assert_eq!(f.authenticator.state(), AuthState::Authenticated);

    let request = f.transport.last_request().unwrap();
    assert_eq!(request.method, HttpMethod::Post);
    assert_eq!(request.url, "https://demo.nationbuilder.com/oauth/token");
    assert_eq!(
        request.header("content-type"),
        Some("application/x-www-form-urlencoded")
    );
    let form = QueryCodec::decode(request.body.as_deref().unwrap());
    assert_eq!(form["grant_type"], "password");
    assert_eq!(form["username"], "jane@example.com");
    assert_eq!(form["client_id"], "client-123");
    assert_eq!(form["client_secret"], "secret");
}

#[tokio::test]
async fn test_password_grant_rejected() {
    let f = fixture();
    f.transport.queue_json_response(
        401,
        &json!({"error": "invalid_grant", "error_description": "Bad credentials"}),
    );

    let (tx, rx) = oneshot::channel();
    f.authenticator
        .authenticate_with_password("jane@example.com", "wrong", "secret", move |r| {
            let _ = tx.send(r);
        });

    let error = rx.await.unwrap().unwrap_err();
    assert_eq!(error.kind(), NationBuilderErrorKind::Service);
    assert_eq!(error.service_details().unwrap().code, "invalid_grant");
    assert_eq!(error.message(), "Bad credentials");
    assert!(f.authenticator.credential().is_none());
}

#[tokio::test]
async fn test_password_grant_server_error() {
    let f = fixture();
    f.transport.queue_response(HttpResponse::new(503, "Service Unavailable"));

    let (tx, rx) = oneshot::channel();
    f.authenticator
        .authenticate_with_password("jane@example.com", "hunter2", "secret", move |r| {
            let _ = tx.send(r);
        });

    let error = rx.await.unwrap().unwrap_err();
    assert_eq!(error.kind(), NationBuilderErrorKind::Http);
    assert_eq!(error.status_code(), Some(503));
}

#[tokio::test]
async fn test_password_grant_empty_argument() {
    let f = fixture();
    let (tx, rx) = mpsc::channel();
    let handle = f
        .authenticator
        .authenticate_with_password("", "hunter2", "secret", move |r| {
            let _ = tx.send(r);
        });

    assert!(handle.is_none());
    assert_eq!(
        rx.try_recv().unwrap().unwrap_err().kind(),
        NationBuilderErrorKind::InvalidArgument
    );
    assert!(f.transport.requests().is_empty());
}
