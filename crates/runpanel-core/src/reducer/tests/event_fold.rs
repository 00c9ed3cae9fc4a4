use super::*;
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn node_started_then_finished_coerces_missing_fields() {
    let run = fold_all(vec![
        json!({"event": "node_started", "data": {"id": "n1", "node_type": "llm", "title": "Step 1"}}),
        json!({"event": "node_finished", "data": {"id": "n1", "elapsed_time": "1.5"}}),
    ]);

    assert_eq!(run.nodes.len(), 1);
    let node = &run.nodes[0];
    assert_eq!(node.id, "n1");
    assert_eq!(node.status, NodeStatus::Success);
    assert_eq!(node.node_type, "llm");
    assert_eq!(node.title, "Step 1");
    assert_eq!(node.elapsed_time, Some(1.5));
    assert_eq!(node.inputs.as_deref(), Some(""));
    assert_eq!(node.process_data.as_deref(), Some(""));
    assert_eq!(
        node.execution_metadata,
        Some(ExecutionMetadata {
            total_tokens: 0,
            total_price: 0.0,
            currency: String::new(),
        })
    );
}

#[test]
fn node_finished_stringifies_structured_inputs() {
    let run = fold_all(vec![
        json!({"event": "node_started", "data": {"id": "n1", "node_type": "code", "title": "Run"}}),
        json!({"event": "node_finished", "data": {
            "id": "n1",
            "inputs": {"x": 1},
            "process_data": "raw",
            "elapsed_time": 0.25,
            "execution_metadata": {"total_tokens": 12, "total_price": "0.002", "currency": "USD"}
        }}),
    ]);

    let node = run.node("n1").expect("node n1");
    assert_eq!(node.inputs.as_deref(), Some(r#"{"x":1}"#));
    assert_eq!(node.process_data.as_deref(), Some("raw"));
    assert_eq!(node.elapsed_time, Some(0.25));
    assert_eq!(
        node.execution_metadata,
        Some(ExecutionMetadata {
            total_tokens: 12,
            total_price: 0.002,
            currency: "USD".to_string(),
        })
    );
}

#[test]
fn node_finished_for_unknown_id_leaves_nodes_unchanged() {
    let started = fold_all(vec![json!({
        "event": "node_started",
        "data": {"id": "n1", "node_type": "llm", "title": "Step 1"}
    })]);

    let after = fold_event(
        started.clone(),
        &event(json!({"event": "node_finished", "data": {"id": "n2"}})),
    );
    assert_eq!(after.nodes, started.nodes);
}

#[test]
fn node_list_grows_only_on_node_started() {
    let events: Vec<RunEvent> = vec![
        json!({"event": "workflow_started"}),
        json!({"event": "node_started", "data": {"id": "a", "node_type": "start", "title": "Start"}}),
        json!({"event": "node_finished", "data": {"id": "a"}}),
        json!({"event": "node_started", "data": {"id": "b", "node_type": "llm", "title": "LLM"}}),
        json!({"event": "node_finished", "data": {"id": "b"}}),
        json!({"event": "node_finished", "data": {"id": "zz"}}),
    ]
    .into_iter()
    .map(event)
    .collect();

    let mut run = RunState::default();
    let mut last_len = 0;
    for ev in &events {
        run = fold_event(run, ev);
        let grew = run.nodes.len() > last_len;
        assert_eq!(grew, matches!(ev, RunEvent::NodeStarted { .. }), "{}", ev.tag());
        assert!(run.nodes.len() >= last_len);
        last_len = run.nodes.len();
    }
    assert_eq!(last_len, 2);
}

#[test]
fn single_output_overrides_text() {
    let run = fold_all(vec![
        json!({"event": "text_chunk", "data": {"text": "partial"}}),
        json!({"event": "workflow_finished", "data": {"outputs": {"a": "x"}}}),
    ]);

    assert_eq!(run.status, RunStatus::Finished);
    assert_eq!(run.text, "x");
    assert_eq!(Value::Object(run.outputs), json!({"a": "x"}));
}

#[test]
fn multiple_outputs_keep_text_and_store_all_keys() {
    let run = fold_all(vec![
        json!({"event": "text_chunk", "data": {"text": "kept"}}),
        json!({"event": "workflow_finished", "data": {"outputs": {"a": "x", "b": "y"}}}),
    ]);

    assert_eq!(run.text, "kept");
    assert_eq!(Value::Object(run.outputs), json!({"a": "x", "b": "y"}));
}

#[test]
fn non_string_single_output_renders_as_json() {
    let run = fold_all(vec![json!({
        "event": "workflow_finished",
        "data": {"outputs": {"n": [1, 2]}}
    })]);
    assert_eq!(run.text, "[1,2]");
}

#[test]
fn workflow_finished_stores_files_only_when_present() {
    let run = fold_all(vec![json!({
        "event": "workflow_finished",
        "data": {
            "outputs": {},
            "files": [{"id": "f1", "filename": "report.pdf", "type": "document", "url": "https://x/f1"}]
        }
    })]);

    assert!(run.outputs.is_empty());
    assert_eq!(run.files.len(), 1);
    assert_eq!(run.files[0].display_name(), "report.pdf");

    let empty = fold_all(vec![json!({"event": "workflow_finished", "data": {"files": []}})]);
    assert!(empty.files.is_empty());
}

#[test]
fn loosely_typed_files_still_show_the_files_tab() {
    let run = fold_all(vec![json!({
        "event": "workflow_finished",
        "data": {
            "outputs": {},
            "files": [
                {"filename": "r.pdf", "size": "2048"},
                {"filename": "b.png", "size": 1.5},
                null
            ]
        }
    })]);

    assert_eq!(run.files.len(), 3);
    assert!(ResultTab::Files.is_visible(&run));
}

#[test]
fn text_and_message_concatenate_in_arrival_order() {
    let run = fold_all(vec![
        json!({"event": "text_chunk", "data": {"text": "Hel"}}),
        json!({"event": "message", "answer": "lo"}),
        json!({"event": "text_chunk", "data": {"text": ", "}}),
        json!({"event": "message", "answer": "world"}),
    ]);
    assert_eq!(run.text, "Hello, world");
}

#[test]
fn workflow_started_clears_nodes_and_marks_running() {
    let run = fold_all(vec![
        json!({"event": "node_started", "data": {"id": "old", "node_type": "llm", "title": "Old"}}),
        json!({"event": "workflow_started", "data": {"id": "run-1"}}),
    ]);
    assert_eq!(run.status, RunStatus::Running);
    assert!(run.nodes.is_empty());
}

#[test]
fn ignored_and_side_channel_events_do_not_change_state() {
    let base = fold_all(vec![
        json!({"event": "workflow_started"}),
        json!({"event": "text_chunk", "data": {"text": "abc"}}),
    ]);

    for value in [
        json!({"event": "unknown_thing"}),
        json!({"data": {"text": "no tag"}}),
        json!({"event": "text_chunk", "data": {"text": 42}}),
        json!({"event": "node_started", "data": {"id": "n1"}}),
        json!({"event": "node_finished", "data": {"elapsed_time": 1.0}}),
        json!({"event": "node_finished", "data": {"id": 7, "elapsed_time": 1.0}}),
        json!({"event": "node_finished"}),
        json!({"event": "message"}),
        json!({"event": "message", "answer": null}),
        json!({"event": "error"}),
        json!({"event": "error", "message": null}),
        json!({"event": "message_file", "url": "https://x/img.png"}),
        json!({"event": "error", "message": "boom"}),
    ] {
        let after = fold_event(base.clone(), &event(value.clone()));
        assert_eq!(after, base, "{value}");
    }
}
