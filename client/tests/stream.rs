//! HTTP-level tests for the streaming chat client.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use zenreply_client::{
    AUTH_FAILED_ERROR, ChatClient, EMPTY_RESPONSE_ERROR, INSUFFICIENT_BALANCE_ERROR,
    MISSING_API_KEY_ERROR, TIMEOUT_ERROR,
};
use zenreply_types::{AppSettings, ChatEvent, RequestId, StreamEvent};

fn settings_for(server: &MockServer) -> AppSettings {
    AppSettings {
        api_key: "sk-test".to_string(),
        api_base: server.uri(),
        model_name: "test-model".to_string(),
    }
}

fn sse_body(deltas: &[&str], done: bool) -> String {
    let mut body = String::new();
    for delta in deltas {
        body.push_str(&format!(
            "data: {{\"choices\":[{{\"delta\":{{\"content\":\"{delta}\"}}}}]}}\n\n"
        ));
    }
    if done {
        body.push_str("data: [DONE]\n\n");
    }
    body
}

/// Drain events for one request until its terminal event.
async fn collect(rx: &mut mpsc::Receiver<ChatEvent>, id: RequestId) -> (String, StreamEvent) {
    let mut text = String::new();
    loop {
        let event = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("event before deadline")
            .expect("channel open");
        assert_eq!(event.request_id, id, "event from a stale request");
        match event.event {
            StreamEvent::Delta(delta) => text.push_str(&delta),
            terminal => return (text, terminal),
        }
    }
}

#[tokio::test]
async fn streams_deltas_in_order_and_finishes_on_done_marker() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(serde_json::json!({
            "model": "test-model",
            "stream": true,
            "temperature": 0.7,
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body(&["好的，", "我", "确认一下"], true), "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut client = ChatClient::new();
    let (tx, mut rx) = mpsc::channel(64);
    let id = client.start("prompt".to_string(), &settings_for(&server), tx);

    let (text, terminal) = collect(&mut rx, id).await;
    assert_eq!(text, "好的，我确认一下");
    assert_eq!(terminal, StreamEvent::Done);
}

#[tokio::test]
async fn first_delta_strips_leading_newlines() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body(&["\\n\\n开头", "\\n继续"], true), "text/event-stream"),
        )
        .mount(&server)
        .await;

    let mut client = ChatClient::new();
    let (tx, mut rx) = mpsc::channel(64);
    let id = client.start("prompt".to_string(), &settings_for(&server), tx);

    let (text, terminal) = collect(&mut rx, id).await;
    assert_eq!(text, "开头\n继续");
    assert_eq!(terminal, StreamEvent::Done);
}

#[tokio::test]
async fn eof_without_done_marker_still_completes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body(&["片段"], false), "text/event-stream"),
        )
        .mount(&server)
        .await;

    let mut client = ChatClient::new();
    let (tx, mut rx) = mpsc::channel(64);
    let id = client.start("prompt".to_string(), &settings_for(&server), tx);

    let (text, terminal) = collect(&mut rx, id).await;
    assert_eq!(text, "片段");
    assert_eq!(terminal, StreamEvent::Done);
}

#[tokio::test]
async fn missing_api_key_errors_synchronously_without_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut settings = settings_for(&server);
    settings.api_key = String::new();

    let mut client = ChatClient::new();
    let (tx, mut rx) = mpsc::channel(64);
    let id = client.start("prompt".to_string(), &settings, tx);

    // The error is queued before start() returns; no awaiting of any
    // network-driven task is involved.
    let event = rx.try_recv().expect("error queued synchronously");
    assert_eq!(event.request_id, id);
    assert_eq!(
        event.event,
        StreamEvent::Error(MISSING_API_KEY_ERROR.to_string())
    );
}

#[tokio::test]
async fn missing_key_error_on_a_full_channel_does_not_displace_queued_events() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut settings = settings_for(&server);
    settings.api_key = String::new();

    let mut client = ChatClient::new();
    let (tx, mut rx) = mpsc::channel(1);
    let occupant = ChatEvent {
        request_id: RequestId::new(99),
        event: StreamEvent::Done,
    };
    tx.try_send(occupant.clone()).unwrap();

    client.start("prompt".to_string(), &settings, tx);

    // The queued event survives; the undeliverable error is logged and
    // dropped rather than clobbering or blocking the channel.
    assert_eq!(rx.try_recv().unwrap(), occupant);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn maps_auth_and_billing_statuses_to_fixed_messages() {
    for (status, expected) in [(401, AUTH_FAILED_ERROR), (402, INSUFFICIENT_BALANCE_ERROR)] {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;

        let mut client = ChatClient::new();
        let (tx, mut rx) = mpsc::channel(64);
        let id = client.start("prompt".to_string(), &settings_for(&server), tx);

        let (text, terminal) = collect(&mut rx, id).await;
        assert!(text.is_empty());
        assert_eq!(terminal, StreamEvent::Error(expected.to_string()));
    }
}

#[tokio::test]
async fn generic_http_error_includes_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let mut client = ChatClient::new();
    let (tx, mut rx) = mpsc::channel(64);
    let id = client.start("prompt".to_string(), &settings_for(&server), tx);

    let (_, terminal) = collect(&mut rx, id).await;
    let StreamEvent::Error(message) = terminal else {
        panic!("expected error, got {terminal:?}");
    };
    assert!(message.contains("500"), "{message}");
    assert!(message.contains("boom"), "{message}");
}

#[tokio::test]
async fn empty_success_body_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let mut client = ChatClient::new();
    let (tx, mut rx) = mpsc::channel(64);
    let id = client.start("prompt".to_string(), &settings_for(&server), tx);

    let (_, terminal) = collect(&mut rx, id).await;
    assert_eq!(
        terminal,
        StreamEvent::Error(EMPTY_RESPONSE_ERROR.to_string())
    );
}

#[tokio::test]
async fn stalled_stream_times_out_with_exactly_one_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let mut client = ChatClient::with_timeout(Duration::from_millis(200));
    let (tx, mut rx) = mpsc::channel(64);
    let id = client.start("prompt".to_string(), &settings_for(&server), tx);

    let (_, terminal) = collect(&mut rx, id).await;
    assert_eq!(terminal, StreamEvent::Error(TIMEOUT_ERROR.to_string()));
    // Exactly one terminal event: nothing else may arrive afterwards.
    assert!(
        timeout(Duration::from_millis(300), rx.recv())
            .await
            .is_err()
    );
}

#[tokio::test]
async fn stop_suppresses_all_events_including_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let mut client = ChatClient::with_timeout(Duration::from_millis(100));
    let (tx, mut rx) = mpsc::channel(64);
    client.start("prompt".to_string(), &settings_for(&server), tx);
    client.stop();

    // Caller-initiated stop is not a failure: no error, no done, nothing.
    assert!(
        timeout(Duration::from_millis(400), rx.recv())
            .await
            .is_err()
    );
}

#[tokio::test]
async fn second_start_supersedes_the_first() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(100))
                .set_body_raw(sse_body(&["第一"], true), "text/event-stream"),
        )
        .mount(&server)
        .await;

    let second = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body(&["第二"], true), "text/event-stream"),
        )
        .mount(&second)
        .await;

    let mut client = ChatClient::new();
    let (tx, mut rx) = mpsc::channel(64);
    let first_id = client.start("prompt".to_string(), &settings_for(&server), tx.clone());
    let second_id = client.start("prompt".to_string(), &settings_for(&second), tx);
    assert_ne!(first_id, second_id);

    let (text, terminal) = collect(&mut rx, second_id).await;
    assert_eq!(text, "第二");
    assert_eq!(terminal, StreamEvent::Done);

    // Nothing from the superseded request leaks through afterwards either.
    assert!(
        timeout(Duration::from_millis(300), rx.recv())
            .await
            .is_err()
    );
}

#[tokio::test]
async fn test_connection_round_trips_against_the_same_endpoint_family() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(serde_json::json!({ "stream": false })))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&server)
        .await;

    let client = ChatClient::new();
    let model = client.test_connection(&settings_for(&server)).await.unwrap();
    assert_eq!(model, "test-model");
}

#[tokio::test]
async fn test_connection_reports_api_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("no"))
        .mount(&server)
        .await;

    let client = ChatClient::new();
    let err = client
        .test_connection(&settings_for(&server))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("401"), "{err}");
}
