use pretty_assertions::assert_eq;
use runpanel_core::config::ApiConfig;
use runpanel_core::config::AppMode;
use runpanel_core::form::FieldKind;
use runpanel_core::form::FileInput;
use runpanel_core::reducer::fold_event;
use runpanel_core::state::RunState;
use runpanel_core::state::RunStatus;
use runpanel_exec::trigger_run;
use runpanel_exec::AppClient;
use runpanel_exec::ExecError;
use runpanel_exec::StreamItem;
use serde_json::json;
use serde_json::Map;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::body_json;
use wiremock::matchers::header;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::matchers::query_param;
use wiremock::Request;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;

fn client(server: &MockServer) -> AppClient {
    AppClient::new(&ApiConfig {
        base_url: format!("{}/v1", server.uri()),
        api_key: Some("app-test".to_string()),
        user: "tester".to_string(),
        connect_timeout_secs: 2,
    })
    .expect("client")
}

fn sse(events: &[Value]) -> String {
    events
        .iter()
        .map(|event| format!("data: {event}\n\n"))
        .collect()
}

fn inputs(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

async fn run_and_fold(
    client: &AppClient,
    mode: AppMode,
    inputs: Map<String, Value>,
) -> Result<(RunState, usize), ExecError> {
    let cancel = CancellationToken::new();
    let mut run = RunState::default();
    let mut rejected = 0;
    trigger_run(client, Some(mode), inputs, Vec::new(), &cancel, |item| match item {
        StreamItem::Event(event) => run = fold_event(std::mem::take(&mut run), &event),
        StreamItem::Rejected { .. } => rejected += 1,
    })
    .await?;
    Ok((run, rejected))
}

#[tokio::test]
async fn workflow_run_streams_into_run_state() {
    let server = MockServer::start().await;
    let mut body = String::from("data: {broken\n\n");
    body.push_str(&sse(&[
        json!({"event": "workflow_started", "data": {"id": "wr-1"}}),
        json!({"event": "node_started", "data": {"id": "n1", "node_type": "llm", "title": "Step 1"}}),
        json!({"event": "text_chunk", "data": {"text": "draft"}}),
        json!({"event": "node_finished", "data": {"id": "n1", "elapsed_time": "1.5"}}),
        json!({"event": "workflow_finished", "data": {"outputs": {"answer": "final"}, "files": []}}),
    ]));

    Mock::given(method("POST"))
        .and(path("/v1/workflows/run"))
        .and(header("authorization", "Bearer app-test"))
        .and(body_json(json!({
            "inputs": {"topic": "rust"},
            "response_mode": "streaming",
            "user": "tester"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let topic = inputs(json!({"topic": "rust"}));
    let (run, rejected) = run_and_fold(&client(&server), AppMode::Workflow, topic)
        .await
        .expect("run");

    assert_eq!(rejected, 1);
    assert_eq!(run.status, RunStatus::Finished);
    assert_eq!(run.text, "final");
    assert_eq!(run.nodes.len(), 1);
    assert_eq!(run.nodes[0].elapsed_time, Some(1.5));
}

#[tokio::test]
async fn malformed_first_chunk_then_started_is_running() {
    let server = MockServer::start().await;
    let body = format!("data: not-json\n\n{}", sse(&[json!({"event": "workflow_started"})]));
    Mock::given(method("POST"))
        .and(path("/v1/workflows/run"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let (run, rejected) = run_and_fold(&client(&server), AppMode::Workflow, Map::new())
        .await
        .expect("run");
    assert_eq!(rejected, 1);
    assert_eq!(run.status, RunStatus::Running);
}

#[tokio::test]
async fn completion_mode_posts_to_completion_messages() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/completion-messages"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            sse(&[
                json!({"event": "message", "answer": "Hello"}),
                json!({"event": "message", "answer": " there"}),
            ]),
            "text/event-stream",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let (run, _) = run_and_fold(&client(&server), AppMode::Completion, Map::new())
        .await
        .expect("run");
    assert_eq!(run.text, "Hello there");
}

#[tokio::test]
async fn chat_mode_is_rejected_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = run_and_fold(&client(&server), AppMode::Chat, Map::new())
        .await
        .expect_err("chat apps cannot run");
    assert!(matches!(err, ExecError::UnsupportedMode(AppMode::Chat)));
    assert!(err.is_dispatch_rejection());
}

#[tokio::test]
async fn api_errors_carry_code_and_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/workflows/run"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "code": "unauthorized",
            "message": "Access token is invalid",
            "status": 401
        })))
        .mount(&server)
        .await;

    let err = run_and_fold(&client(&server), AppMode::Workflow, Map::new())
        .await
        .expect_err("unauthorized");
    match err {
        ExecError::Api(api) => {
            assert_eq!(api.status, 401);
            assert_eq!(api.code.as_deref(), Some("unauthorized"));
            assert_eq!(api.message, "Access token is invalid");
        }
        other => panic!("expected api error, got {other:?}"),
    }
}

#[tokio::test]
async fn parameters_and_info_are_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/parameters"))
        .and(query_param("user", "tester"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user_input_form": [
                {"text-input": {"variable": "topic", "label": "Topic", "required": true}},
                {"select": {"variable": "tone", "label": "Tone", "options": ["a", "b"]}}
            ],
            "file_upload": {"image": {"enabled": false}}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "Summarizer",
            "description": "Summarize text",
            "tags": ["docs"],
            "mode": "workflow"
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let fields = client.parameters().await.expect("parameters");
    assert_eq!(fields.len(), 2);
    assert_eq!(fields[1].kind, FieldKind::Select);

    let info = client.info().await.expect("info");
    assert_eq!(info.name, "Summarizer");
    assert_eq!(info.app_mode(), Some(AppMode::Workflow));
}

fn is_multipart_upload(request: &Request) -> bool {
    let body = String::from_utf8_lossy(&request.body);
    request
        .headers
        .get("content-type")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"))
        && body.contains("name=\"user\"")
        && body.contains("filename=\"report.pdf\"")
        && body.contains("quarterly numbers")
}

#[tokio::test]
async fn file_inputs_are_uploaded_then_referenced_in_the_run() {
    let dir = tempfile::tempdir().expect("temp dir");
    let report = dir.path().join("report.pdf");
    std::fs::write(&report, "quarterly numbers").expect("write");

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/files/upload"))
        .and(header("authorization", "Bearer app-test"))
        .and(is_multipart_upload)
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "up-1",
            "name": "report.pdf",
            "size": 17,
            "extension": "pdf",
            "mime_type": "application/pdf"
        })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/workflows/run"))
        .and(body_json(json!({
            "inputs": {
                "topic": "rust",
                "doc": {"transfer_method": "local_file", "upload_file_id": "up-1", "type": "document"},
                "attachments": [
                    {"transfer_method": "local_file", "upload_file_id": "up-1", "type": "document"}
                ]
            },
            "response_mode": "streaming",
            "user": "tester"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            sse(&[json!({"event": "workflow_started"})]),
            "text/event-stream",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let files = vec![
        FileInput {
            variable: "doc".to_string(),
            paths: vec![report.clone()],
            multiple: false,
        },
        FileInput {
            variable: "attachments".to_string(),
            paths: vec![report],
            multiple: true,
        },
    ];
    let cancel = CancellationToken::new();
    let summary = trigger_run(
        &client(&server),
        Some(AppMode::Workflow),
        inputs(json!({"topic": "rust"})),
        files,
        &cancel,
        |_| {},
    )
    .await
    .expect("run");
    assert_eq!(summary.events, 1);
}

#[tokio::test]
async fn missing_upload_file_fails_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let files = vec![FileInput {
        variable: "doc".to_string(),
        paths: vec!["/nonexistent/runpanel/report.pdf".into()],
        multiple: false,
    }];
    let cancel = CancellationToken::new();
    let err = trigger_run(
        &client(&server),
        Some(AppMode::Workflow),
        Map::new(),
        files,
        &cancel,
        |_| {},
    )
    .await
    .expect_err("unreadable file");
    assert!(matches!(err, ExecError::File { .. }));
    assert!(err.is_dispatch_rejection());
}
