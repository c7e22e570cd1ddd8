//! Integration tests for the resource pipeline, run against the mock transport.

use integrations_nationbuilder::{
    Authenticator, ClientHooks, HttpMethod, HttpRequest, HttpResponse, MockHttpTransport,
    NationBuilderClient, NationBuilderConfig, NationBuilderError, NationBuilderErrorKind,
    NationBuilderResult, PaginationInfo, Params, ResourceList,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

fn params(value: Value) -> Params {
    value.as_object().cloned().unwrap_or_default()
}

fn config() -> NationBuilderConfig {
    NationBuilderConfig::builder("demo")
        .api_key("test-token")
        .legacy_pagination()
        .build()
        .unwrap()
}

fn client_with(transport: &Arc<MockHttpTransport>, hooks: Option<Arc<dyn ClientHooks>>) -> NationBuilderClient {
    let mut builder = NationBuilderClient::builder(config()).transport(transport.clone());
    if let Some(hooks) = hooks {
        builder = builder.hooks(hooks);
    }
    builder.build().unwrap()
}

fn client(transport: &Arc<MockHttpTransport>) -> NationBuilderClient {
    client_with(transport, None)
}

async fn fetch_item(client: &NationBuilderClient, sub_path: &str, key: Option<&str>) -> NationBuilderResult<Option<Value>> {
    let (tx, rx) = oneshot::channel();
    client.fetch_item(sub_path, &Params::new(), key, move |r| {
        let _ = tx.send(r);
    });
    rx.await.expect("completion was not invoked")
}

async fn fetch_list(
    client: &NationBuilderClient,
    sub_path: &str,
    query: &Params,
    pagination: Option<&PaginationInfo>,
) -> NationBuilderResult<ResourceList> {
    let (tx, rx) = oneshot::channel();
    client.fetch_list(sub_path, query, Some("results"), pagination, move |r| {
        let _ = tx.send(r);
    });
    rx.await.expect("completion was not invoked")
}

#[tokio::test]
async fn test_fetch_item_success() {
    let transport = Arc::new(MockHttpTransport::new());
    transport.queue_json_response(200, &json!({"person": {"id": 42, "email": "a@b.com"}}));
    let client = client(&transport);

    let item = fetch_item(&client, "people/42", Some("person")).await.unwrap();

    assert_eq!(item, Some(json!({"id": 42, "email": "a@b.com"})));
    let request = transport.last_request().unwrap();
    assert_eq!(request.method, HttpMethod::Get);
    assert_eq!(
        request.url,
        "https://demo.nationbuilder.com/api/v1/people/42?access_token=test-token"
    );
    assert_eq!(request.header("accept"), Some("application/json"));
}

#[tokio::test]
async fn test_fetch_list_legacy_pagination() {
    let transport = Arc::new(MockHttpTransport::new());
    let items: Vec<Value> = (1..=10).map(|id| json!({"id": id})).collect();
    transport.queue_json_response(
        200,
        &json!({"results": items, "page": 2, "total_pages": 5, "per_page": 10}),
    );
    let client = client(&transport);

    let list = fetch_list(&client, "people", &params(json!({"page": 2, "per_page": 10})), None)
        .await
        .unwrap();

    assert_eq!(list.items.len(), 10);
    let pagination = list.pagination.unwrap();
    assert_eq!(pagination.current_page_number(), 2);
    assert_eq!(pagination.number_of_total_pages(), 5);
    assert!(!pagination.is_last_page());
    assert!(transport.last_request().unwrap().url.contains("page=2&per_page=10"));
}

#[tokio::test]
async fn test_fetch_list_advances_with_pagination_info() {
    let transport = Arc::new(MockHttpTransport::new());
    transport
        .queue_json_response(200, &json!({"results": [{"id": 1}], "page": 1, "total_pages": 2, "per_page": 1}))
        .queue_json_response(200, &json!({"results": [{"id": 2}], "page": 2, "total_pages": 2, "per_page": 1}));
    let client = client(&transport);

    let first = fetch_list(&client, "people", &Params::new(), Some(&PaginationInfo::legacy(1, 1)))
        .await
        .unwrap();
    let mut pagination = first.pagination.unwrap();
    assert!(!pagination.is_last_page());

    pagination.update_current_page_number();
    let second = fetch_list(&client, "people", &Params::new(), Some(&pagination))
        .await
        .unwrap();

    assert_eq!(second.items, vec![json!({"id": 2})]);
    assert!(second.pagination.unwrap().is_last_page());
    assert_eq!(pagination.current_page_number(), 2);
    assert!(transport.requests()[1].url.contains("page=2&per_page=1"));
}

#[tokio::test]
async fn test_fetch_list_token_pagination() {
    let transport = Arc::new(MockHttpTransport::new());
    transport
        .queue_json_response(
            200,
            &json!({"results": [{"id": 1}], "next": "/api/v1/people?__nonce=n1&__token=t1&limit=1", "prev": null}),
        )
        .queue_json_response(200, &json!({"results": [{"id": 2}], "next": null, "prev": "/api/v1/people?__token=t0"}));
    let config = NationBuilderConfig::builder("demo").api_key("k").build().unwrap();
    let client = NationBuilderClient::builder(config)
        .transport(transport.clone())
        .build()
        .unwrap();

    let first = fetch_list(&client, "people", &Params::new(), Some(&PaginationInfo::token(1)))
        .await
        .unwrap();
    let mut pagination = first.pagination.unwrap();
    assert!(!pagination.is_last_page());
    assert_eq!(pagination.number_of_items_per_page(), 1);

    pagination.update_current_page_number();
    let second = fetch_list(&client, "people", &Params::new(), Some(&pagination))
        .await
        .unwrap();

    assert!(second.pagination.unwrap().is_last_page());
    assert_eq!(
        transport.requests()[1].url,
        "https://demo.nationbuilder.com/api/v1/people?__nonce=n1&__token=t1&access_token=k&limit=1"
    );
}

#[tokio::test]
async fn test_empty_list_is_success() {
    let transport = Arc::new(MockHttpTransport::new());
    transport.queue_json_response(200, &json!({"results": [], "page": 1, "total_pages": 0}));
    let client = client(&transport);

    let list = fetch_list(&client, "people", &Params::new(), None).await.unwrap();
    assert!(list.items.is_empty());
    assert!(list.pagination.unwrap().is_last_page());
}

#[tokio::test]
async fn test_missing_results_key_is_invalid_response() {
    let transport = Arc::new(MockHttpTransport::new());
    transport.queue_json_response(200, &json!({"unexpected_key": []}));
    let client = client(&transport);

    let error = fetch_list(&client, "people", &Params::new(), None).await.unwrap_err();
    assert_eq!(error.kind(), NationBuilderErrorKind::InvalidResponse);
    assert_eq!(error.status_code(), Some(200));
}

#[tokio::test]
async fn test_non_json_success_is_invalid_response() {
    let transport = Arc::new(MockHttpTransport::new());
    transport.queue_response(HttpResponse::new(200, "<html>maintenance</html>"));
    let client = client(&transport);

    let error = fetch_item(&client, "people/1", Some("person")).await.unwrap_err();
    assert_eq!(error.kind(), NationBuilderErrorKind::InvalidResponse);
}

#[tokio::test]
async fn test_delete_no_content() {
    let transport = Arc::new(MockHttpTransport::new());
    transport.queue_response(HttpResponse::new(204, ""));
    let client = client(&transport);

    let (tx, rx) = oneshot::channel();
    client.delete("people/42", &Params::new(), None, move |r| {
        let _ = tx.send(r);
    });

    assert_eq!(rx.await.unwrap().unwrap(), None);
    assert_eq!(transport.last_request().unwrap().method, HttpMethod::Delete);
}

#[tokio::test]
async fn test_create_sends_json_body() {
    let transport = Arc::new(MockHttpTransport::new());
    transport.queue_json_response(201, &json!({"person": {"id": 7, "email": "new@b.com"}}));
    let client = client(&transport);

    let (tx, rx) = oneshot::channel();
    client.create(
        "people",
        &params(json!({"person": {"email": "new@b.com"}})),
        Some("person"),
        move |r| {
            let _ = tx.send(r);
        },
    );

    assert_eq!(rx.await.unwrap().unwrap(), Some(json!({"id": 7, "email": "new@b.com"})));
    let request = transport.last_request().unwrap();
    assert_eq!(request.method, HttpMethod::Post);
    assert_eq!(request.header("content-type"), Some("application/json"));
    let body: Value = serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
    assert_eq!(body, json!({"person": {"email": "new@b.com"}}));
}

#[tokio::test]
async fn test_service_error_with_validation_errors() {
    let transport = Arc::new(MockHttpTransport::new());
    transport.queue_json_response(
        422,
        &json!({
            "code": "validation_failed",
            "message": "Validation Failed.",
            "validation_errors": {"email": ["has already been taken"]}
        }),
    );
    let client = client(&transport);

    let (tx, rx) = oneshot::channel();
    client.save(
        "people/42",
        &params(json!({"person": {"email": "taken@b.com"}})),
        Some("person"),
        move |r| {
            let _ = tx.send(r);
        },
    );

    let error = rx.await.unwrap().unwrap_err();
    assert_eq!(error.kind(), NationBuilderErrorKind::Service);
    assert_eq!(error.status_code(), Some(422));
    let details = error.service_details().unwrap();
    assert_eq!(details.code, "validation_failed");
    assert_eq!(details.validation_errors["email"], vec!["has already been taken"]);
}

#[tokio::test]
async fn test_http_error_without_envelope() {
    let transport = Arc::new(MockHttpTransport::new());
    transport.queue_response(HttpResponse::new(500, "Internal Server Error"));
    let client = client(&transport);

    let error = fetch_item(&client, "people/1", Some("person")).await.unwrap_err();
    assert_eq!(error.kind(), NationBuilderErrorKind::Http);
    assert_eq!(error.body(), Some("Internal Server Error"));
}

#[tokio::test]
async fn test_transport_error() {
    let transport = Arc::new(MockHttpTransport::new());
    transport.queue_failure("connection reset");
    let client = client(&transport);

    let error = fetch_item(&client, "people/1", Some("person")).await.unwrap_err();
    assert_eq!(error.kind(), NationBuilderErrorKind::Transport);
    assert!(error.status_code().is_none());
}

#[tokio::test]
async fn test_invalid_argument_completes_synchronously() {
    let transport = Arc::new(MockHttpTransport::new());
    let client = client(&transport);

    let delivered: Arc<Mutex<Option<NationBuilderResult<Option<Value>>>>> = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&delivered);
    let handle = client.fetch_item(
        "people",
        &params(json!({"filter": {"nested": true}})),
        None,
        move |r| {
            *sink.lock().unwrap() = Some(r);
        },
    );

    assert!(handle.is_none());
    let result = delivered.lock().unwrap().take().expect("completion should already have run");
    assert_eq!(result.unwrap_err().kind(), NationBuilderErrorKind::InvalidArgument);
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_cancel_suppresses_completion() {
    let transport = Arc::new(MockHttpTransport::new());
    transport.queue_delayed_response(
        HttpResponse::json(200, &json!({"person": {"id": 1}})),
        Duration::from_millis(100),
    );
    let client = client(&transport);

    let (tx, rx) = oneshot::channel::<NationBuilderResult<Option<Value>>>();
    let handle = client
        .fetch_item("people/1", &Params::new(), Some("person"), move |r| {
            let _ = tx.send(r);
        })
        .unwrap();
    handle.cancel();

    assert!(handle.is_cancelled());
    assert!(rx.await.is_err());
}

struct DeferringHooks;

impl ClientHooks for DeferringHooks {
    fn should_auto_start(&self, _request: &HttpRequest) -> bool {
        false
    }
}

#[tokio::test]
async fn test_deferred_start() {
    let transport = Arc::new(MockHttpTransport::new());
    transport.queue_json_response(200, &json!({"person": {"id": 1}}));
    let client = client_with(&transport, Some(Arc::new(DeferringHooks) as Arc<dyn ClientHooks>));

    let (tx, rx) = oneshot::channel();
    let handle = client
        .fetch_item("people/1", &Params::new(), Some("person"), move |r| {
            let _ = tx.send(r);
        })
        .unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(transport.requests().is_empty());
    assert!(handle.request().url.contains("people/1"));

    assert!(handle.start());
    assert_eq!(rx.await.unwrap().unwrap(), Some(json!({"id": 1})));
}

#[derive(Default)]
struct VetoingHooks {
    service_errors: AtomicUsize,
}

impl ClientHooks for VetoingHooks {
    fn will_create_request(&self, request: &mut HttpRequest) {
        request.set_header("X-Request-Source", "tests");
    }

    fn did_parse_json(&self, json: &mut Value, _response: &HttpResponse, _request: &HttpRequest) {
        if let Some(object) = json.as_object_mut() {
            if let Some(person) = object.remove("data") {
                object.insert("person".into(), person);
            }
        }
    }

    fn should_handle_service_error(
        &self,
        _error: &NationBuilderError,
        _response: &HttpResponse,
        _request: &HttpRequest,
    ) -> bool {
        self.service_errors.fetch_add(1, Ordering::SeqCst);
        false
    }
}

#[tokio::test]
async fn test_hooks_rewrite_json_and_veto_service_errors() {
    let transport = Arc::new(MockHttpTransport::new());
    transport
        .queue_json_response(200, &json!({"data": {"id": 5}}))
        .queue_json_response(404, &json!({"code": "not_found", "message": "Record not found"}));
    let hooks = Arc::new(VetoingHooks::default());
    let client = client_with(&transport, Some(hooks.clone() as Arc<dyn ClientHooks>));

    let item = fetch_item(&client, "people/5", Some("person")).await.unwrap();
    assert_eq!(item, Some(json!({"id": 5})));
    assert_eq!(transport.last_request().unwrap().header("x-request-source"), Some("tests"));

    let (tx, rx) = oneshot::channel::<NationBuilderResult<Option<Value>>>();
    client.fetch_item("people/6", &Params::new(), Some("person"), move |r| {
        let _ = tx.send(r);
    });
    assert!(rx.await.is_err(), "vetoed errors must not reach the completion");
    assert_eq!(hooks.service_errors.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_authenticator_credential_signs_requests() {
    let transport = Arc::new(MockHttpTransport::new());
    transport
        .queue_json_response(200, &json!({"person": {"id": 1}}))
        .queue_json_response(401, &json!({"code": "unauthorized", "message": "You are not authorized"}));

    let authenticator = Authenticator::builder("https://demo.nationbuilder.com", "client-id")
        .transport(transport.clone())
        .build()
        .unwrap();
    authenticator.set_credential("oauth-token", Some("bearer")).unwrap();

    let config = NationBuilderConfig::builder("demo")
        .authenticator(authenticator.clone())
        .build()
        .unwrap();
    let client = NationBuilderClient::builder(config)
        .transport(transport.clone())
        .build()
        .unwrap();

    fetch_item(&client, "people/me", Some("person")).await.unwrap();
    assert!(transport.last_request().unwrap().url.ends_with("people/me?access_token=oauth-token"));

    authenticator.discard_credential();
    let error = fetch_item(&client, "people/me", Some("person")).await.unwrap_err();
    assert!(error.is_unauthorized());
    assert!(!transport.last_request().unwrap().url.contains("access_token"));
}

/// Takes over the stages it is told to and counts every call it sees.
#[derive(Default)]
struct ClaimingHooks {
    claim_responses: bool,
    claim_transport_errors: bool,
    claim_http_errors: bool,
    responses: AtomicUsize,
    transport_errors: AtomicUsize,
    http_errors: AtomicUsize,
}

impl ClientHooks for ClaimingHooks {
    fn should_handle_response(&self, _response: &HttpResponse, _request: &HttpRequest) -> bool {
        self.responses.fetch_add(1, Ordering::SeqCst);
        !self.claim_responses
    }

    fn should_handle_transport_error(&self, _error: &NationBuilderError, _request: &HttpRequest) -> bool {
        self.transport_errors.fetch_add(1, Ordering::SeqCst);
        !self.claim_transport_errors
    }

    fn should_handle_http_error(
        &self,
        _error: &NationBuilderError,
        _response: &HttpResponse,
        _request: &HttpRequest,
    ) -> bool {
        self.http_errors.fetch_add(1, Ordering::SeqCst);
        !self.claim_http_errors
    }
}

async fn completion_dropped(client: &NationBuilderClient, sub_path: &str) -> bool {
    let (tx, rx) = oneshot::channel::<NationBuilderResult<Option<Value>>>();
    let handle = client.fetch_item(sub_path, &Params::new(), Some("person"), move |r| {
        let _ = tx.send(r);
    });
    assert!(handle.is_some());
    rx.await.is_err()
}

#[tokio::test]
async fn test_response_hook_takes_over_success() {
    let transport = Arc::new(MockHttpTransport::new());
    transport.queue_json_response(200, &json!({"person": {"id": 1}}));
    let hooks = Arc::new(ClaimingHooks {
        claim_responses: true,
        ..Default::default()
    });
    let client = client_with(&transport, Some(hooks.clone() as Arc<dyn ClientHooks>));

    assert!(completion_dropped(&client, "people/1").await);
    assert_eq!(hooks.responses.load(Ordering::SeqCst), 1);
    assert_eq!(hooks.http_errors.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_response_hook_takes_over_error_statuses() {
    let transport = Arc::new(MockHttpTransport::new());
    transport.queue_response(HttpResponse::new(500, "Internal Server Error"));
    let hooks = Arc::new(ClaimingHooks {
        claim_responses: true,
        ..Default::default()
    });
    let client = client_with(&transport, Some(hooks.clone() as Arc<dyn ClientHooks>));

    assert!(completion_dropped(&client, "people/1").await);
    assert_eq!(hooks.http_errors.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_transport_error_hook_takes_over() {
    let transport = Arc::new(MockHttpTransport::new());
    transport
        .queue_failure("connection reset")
        .queue_json_response(200, &json!({"person": {"id": 2}}));
    let hooks = Arc::new(ClaimingHooks {
        claim_transport_errors: true,
        ..Default::default()
    });
    let client = client_with(&transport, Some(hooks.clone() as Arc<dyn ClientHooks>));

    assert!(completion_dropped(&client, "people/1").await);
    assert_eq!(hooks.transport_errors.load(Ordering::SeqCst), 1);
    assert_eq!(hooks.responses.load(Ordering::SeqCst), 0);

    let item = fetch_item(&client, "people/2", Some("person")).await.unwrap();
    assert_eq!(item, Some(json!({"id": 2})));
}

#[tokio::test]
async fn test_http_error_hook_takes_over_only_plain_failures() {
    let transport = Arc::new(MockHttpTransport::new());
    transport
        .queue_response(HttpResponse::new(500, "Internal Server Error"))
        .queue_json_response(404, &json!({"code": "not_found", "message": "Record not found"}));
    let hooks = Arc::new(ClaimingHooks {
        claim_http_errors: true,
        ..Default::default()
    });
    let client = client_with(&transport, Some(hooks.clone() as Arc<dyn ClientHooks>));

    assert!(completion_dropped(&client, "people/1").await);
    assert_eq!(hooks.http_errors.load(Ordering::SeqCst), 1);

    let error = fetch_item(&client, "people/2", Some("person")).await.unwrap_err();
    assert_eq!(error.kind(), NationBuilderErrorKind::Service);
    assert_eq!(hooks.http_errors.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_token_cursor_omits_custom_credential_parameter() {
    let transport = Arc::new(MockHttpTransport::new());
    transport
        .queue_json_response(
            200,
            &json!({"results": [{"id": 1}], "next": "/api/v1/people?__token=t1&api_token=stale&limit=1"}),
        )
        .queue_json_response(200, &json!({"results": [{"id": 2}], "next": null}));
    let config = NationBuilderConfig::builder("demo")
        .api_key("fresh")
        .api_key_parameter("api_token")
        .build()
        .unwrap();
    let client = NationBuilderClient::builder(config)
        .transport(transport.clone())
        .build()
        .unwrap();

    let first = fetch_list(&client, "people", &Params::new(), Some(&PaginationInfo::token(1)))
        .await
        .unwrap();
    let mut pagination = first.pagination.unwrap();
    pagination.update_current_page_number();

    let query = pagination.query_parameters();
    assert!(!query.contains_key("api_token"));
    assert_eq!(query["__token"], "t1");

    fetch_list(&client, "people", &Params::new(), Some(&pagination))
        .await
        .unwrap();
    assert_eq!(
        transport.requests()[1].url,
        "https://demo.nationbuilder.com/api/v1/people?__token=t1&api_token=fresh&limit=1"
    );
}
