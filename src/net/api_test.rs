use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use reqwest::Method;
use serde_json::Value;

use super::*;

/// One scripted transport outcome.
enum Script {
    Reply(u16, &'static str),
    Fail(&'static str),
    /// Never completes; exercises the per-attempt timeout.
    Hang,
}

struct ScriptedTransport {
    script: Mutex<VecDeque<Script>>,
    calls: AtomicU32,
    requests: Mutex<Vec<RawRequest>>,
}

impl ScriptedTransport {
    fn new(script: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_request(&self) -> RawRequest {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .expect("at least one request")
            .clone()
    }
}

impl HttpTransport for ScriptedTransport {
    async fn execute(&self, request: RawRequest) -> Result<RawResponse, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match next {
            Some(Script::Reply(status, body)) => Ok(RawResponse {
                status,
                body: body.to_owned(),
            }),
            Some(Script::Fail(message)) => Err(message.to_owned()),
            Some(Script::Hang) | None => std::future::pending().await,
        }
    }
}

fn client(transport: &Arc<ScriptedTransport>) -> ApiClient<Arc<ScriptedTransport>> {
    ApiClient::with_transport("http://api.test", Arc::clone(transport))
}

#[tokio::test(start_paused = true)]
async fn unauthorized_fails_fast_without_retry_or_backoff() {
    let transport = ScriptedTransport::new(vec![Script::Reply(401, "{}")]);
    let api = client(&transport);

    let started = tokio::time::Instant::now();
    let err = api
        .request::<Value>(Method::GET, "/pens", RequestOptions::default())
        .await
        .expect_err("401 must fail");

    assert!(matches!(err, ApiError::Unauthorized));
    assert_eq!(transport.calls(), 1);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn transient_500s_retry_with_exponential_backoff() {
    let transport = ScriptedTransport::new(vec![
        Script::Reply(500, ""),
        Script::Reply(500, ""),
        Script::Reply(200, r#"{"ok":true}"#),
    ]);
    let api = client(&transport);

    let started = tokio::time::Instant::now();
    let value: Value = api
        .request(Method::GET, "/pens", RequestOptions::default())
        .await
        .expect("third attempt succeeds");

    assert_eq!(value, serde_json::json!({"ok": true}));
    assert_eq!(transport.calls(), 3);
    // 1000 ms after the first failure, 2000 ms after the second.
    assert_eq!(started.elapsed(), Duration::from_millis(3000));
}

#[tokio::test(start_paused = true)]
async fn exhausted_budget_wraps_the_last_failure() {
    let transport = ScriptedTransport::new(vec![
        Script::Fail("connection refused"),
        Script::Reply(503, ""),
        Script::Reply(502, ""),
    ]);
    let api = client(&transport);

    let err = api
        .request::<Value>(Method::GET, "/pens", RequestOptions::default())
        .await
        .expect_err("budget spent");

    match err {
        ApiError::Exhausted { attempts, source } => {
            assert_eq!(attempts, 3);
            assert!(matches!(*source, ApiError::Status(502)));
        }
        other => panic!("expected Exhausted, got {other:?}"),
    }
    assert_eq!(transport.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn zero_retries_still_attempts_once() {
    let transport = ScriptedTransport::new(vec![Script::Reply(500, "")]);
    let api = client(&transport);

    let opts = RequestOptions {
        retries: 0,
        ..RequestOptions::default()
    };
    let err = api
        .request::<Value>(Method::GET, "/pens", opts)
        .await
        .expect_err("500 must fail");

    assert_eq!(transport.calls(), 1);
    assert!(matches!(
        err,
        ApiError::Exhausted { attempts: 1, .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn hung_transport_times_out_per_attempt() {
    let transport = ScriptedTransport::new(vec![Script::Hang]);
    let api = client(&transport);

    let opts = RequestOptions {
        retries: 1,
        timeout: Duration::from_secs(10),
        ..RequestOptions::default()
    };
    let started = tokio::time::Instant::now();
    let err = api
        .request::<Value>(Method::GET, "/pens", opts)
        .await
        .expect_err("hang must time out");

    assert_eq!(started.elapsed(), Duration::from_secs(10));
    match err {
        ApiError::Exhausted { attempts: 1, source } => {
            assert!(matches!(*source, ApiError::Timeout));
        }
        other => panic!("expected Exhausted(Timeout), got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn success_body_that_fails_decode_is_not_retried() {
    let transport = ScriptedTransport::new(vec![Script::Reply(200, "not json")]);
    let api = client(&transport);

    let err = api
        .request::<LoginResponse>(Method::GET, "/pens", RequestOptions::default())
        .await
        .expect_err("decode must fail");

    assert!(matches!(err, ApiError::Decode(_)));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn login_posts_form_encoded_credentials() {
    let transport = ScriptedTransport::new(vec![Script::Reply(
        200,
        r#"{"access_token":"tok-1","token_type":"bearer","expires_in":3600}"#,
    )]);
    let api = client(&transport);

    let response = api.login("farmer", "hunter2").await.expect("login");
    assert_eq!(response.access_token, "tok-1");

    let request = transport.last_request();
    assert_eq!(request.method, Method::POST);
    assert_eq!(request.url, "http://api.test/auth/login");
    match request.body {
        Some(RequestBody::Form(fields)) => {
            assert!(fields.contains(&("username".to_owned(), "farmer".to_owned())));
            assert!(fields.contains(&("password".to_owned(), "hunter2".to_owned())));
        }
        other => panic!("expected form body, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn fetch_pens_sends_bearer_and_normalizes_garbage() {
    let transport = ScriptedTransport::new(vec![Script::Reply(200, r#"[1, 2, 3]"#)]);
    let api = client(&transport);

    let snapshot = api.fetch_pens("tok-9").await.expect("fetch");
    assert!(snapshot.piggeies.is_empty());

    let request = transport.last_request();
    assert_eq!(request.url, "http://api.test/pens");
    assert!(request
        .headers
        .contains(&("Authorization".to_owned(), "Bearer tok-9".to_owned())));
}

#[tokio::test(start_paused = true)]
async fn fetch_pen_detail_decodes_typed_shape() {
    let transport = ScriptedTransport::new(vec![Script::Reply(
        200,
        r#"{"id":4,"name":"Pen 4","time_series":[{"activity":0.5,"feeding_time":30.0}]}"#,
    )]);
    let api = client(&transport);

    let detail = api.fetch_pen_detail("tok-9", 4).await.expect("detail");
    assert_eq!(detail.id, 4);
    assert_eq!(detail.name, "Pen 4");
    assert_eq!(detail.time_series.len(), 1);

    let request = transport.last_request();
    assert_eq!(request.url, "http://api.test/pens/4/detail");
}
