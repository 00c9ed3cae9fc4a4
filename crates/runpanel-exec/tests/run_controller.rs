use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::stream;
use futures_util::FutureExt;
use futures_util::StreamExt;
use runpanel_core::actions::PanelAction;
use runpanel_core::actions::RuntimeAction;
use runpanel_core::config::AppMode;
use runpanel_core::events::RunEvent;
use runpanel_core::form::FileInput;
use runpanel_exec::ByteStream;
use runpanel_exec::ExecError;
use runpanel_exec::RunController;
use runpanel_exec::RunKind;
use runpanel_exec::RunLauncher;
use runpanel_exec::UploadedFile;
use serde_json::Map;
use serde_json::Value;

/// Emits `workflow_started`, then either ends or stays open forever.
struct ScriptedLauncher {
    hang: bool,
}

impl RunLauncher for ScriptedLauncher {
    fn launch(
        &self,
        _kind: RunKind,
        _inputs: Map<String, Value>,
    ) -> BoxFuture<'_, Result<ByteStream, ExecError>> {
        let first = stream::iter(vec![Ok(Bytes::from_static(
            b"data: {\"event\":\"workflow_started\"}\n\n",
        ))]);
        let body: ByteStream = if self.hang {
            first.chain(stream::pending()).boxed()
        } else {
            first.boxed()
        };
        async move { Ok(body) }.boxed()
    }

    fn upload(&self, path: PathBuf) -> BoxFuture<'_, Result<UploadedFile, ExecError>> {
        async move {
            Err(ExecError::File {
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "scripted"),
                path,
            })
        }
        .boxed()
    }
}

fn collect_until_idle(rx: mpsc::Receiver<PanelAction>) -> Vec<RuntimeAction> {
    let mut out = Vec::new();
    while let Ok(PanelAction::Runtime(action)) = rx.recv_timeout(Duration::from_millis(300)) {
        out.push(action);
    }
    out
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn completed_run_reports_events_then_completion() {
    let (tx, rx) = mpsc::channel();
    let mut controller = RunController::new(
        Arc::new(ScriptedLauncher { hang: false }),
        tokio::runtime::Handle::current(),
        tx,
    );
    controller.start(7, Some(AppMode::Workflow), Map::new(), Vec::new());

    let actions = tokio::task::spawn_blocking(move || collect_until_idle(rx))
        .await
        .expect("collector");

    assert!(matches!(
        actions.as_slice(),
        [
            RuntimeAction::Event { run_id: 7, event: RunEvent::WorkflowStarted },
            RuntimeAction::StreamCompleted { run_id: 7 },
        ]
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn new_run_cancels_the_previous_stream() {
    let (tx, rx) = mpsc::channel();
    let mut controller = RunController::new(
        Arc::new(ScriptedLauncher { hang: true }),
        tokio::runtime::Handle::current(),
        tx,
    );
    controller.start(1, Some(AppMode::Workflow), Map::new(), Vec::new());
    tokio::time::sleep(Duration::from_millis(50)).await;
    controller.start(2, Some(AppMode::Workflow), Map::new(), Vec::new());
    tokio::time::sleep(Duration::from_millis(50)).await;
    controller.cancel(2);

    let actions = tokio::task::spawn_blocking(move || collect_until_idle(rx))
        .await
        .expect("collector");

    assert!(actions.iter().all(|action| matches!(action, RuntimeAction::Event { .. })));
    assert_eq!(actions.len(), 2);
    assert_eq!(controller.active_run_id(), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unknown_mode_is_a_dispatch_rejection() {
    let (tx, rx) = mpsc::channel();
    let mut controller = RunController::new(
        Arc::new(ScriptedLauncher { hang: false }),
        tokio::runtime::Handle::current(),
        tx,
    );
    controller.start(3, None, Map::new(), Vec::new());

    let actions = tokio::task::spawn_blocking(move || collect_until_idle(rx))
        .await
        .expect("collector");
    assert!(matches!(
        actions.as_slice(),
        [RuntimeAction::DispatchRejected { run_id: 3, .. }]
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unreadable_file_rejects_the_run() {
    let (tx, rx) = mpsc::channel();
    let mut controller = RunController::new(
        Arc::new(ScriptedLauncher { hang: false }),
        tokio::runtime::Handle::current(),
        tx,
    );
    let files = vec![FileInput {
        variable: "doc".to_string(),
        paths: vec![PathBuf::from("missing.pdf")],
        multiple: false,
    }];
    controller.start(4, Some(AppMode::Workflow), Map::new(), files);

    let actions = tokio::task::spawn_blocking(move || collect_until_idle(rx))
        .await
        .expect("collector");
    assert!(matches!(
        actions.as_slice(),
        [RuntimeAction::DispatchRejected { run_id: 4, .. }]
    ));
}
