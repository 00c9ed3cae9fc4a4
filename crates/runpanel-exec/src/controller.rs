use std::sync::mpsc::Sender;
use std::sync::Arc;

use runpanel_core::actions::PanelAction;
use runpanel_core::actions::RuntimeAction;
use runpanel_core::config::AppMode;
use runpanel_core::form::FileInput;
use serde_json::Map;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::RunLauncher;
use crate::runner::trigger_run;
use crate::runner::StreamItem;

struct ActiveTask {
    run_id: u64,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns the background task of the in-flight run and forwards its stream as
/// runtime actions tagged with the run id.
pub struct RunController {
    launcher: Arc<dyn RunLauncher>,
    runtime: Handle,
    actions: Sender<PanelAction>,
    active: Option<ActiveTask>,
}

impl RunController {
    pub fn new(
        launcher: Arc<dyn RunLauncher>,
        runtime: Handle,
        actions: Sender<PanelAction>,
    ) -> Self {
        Self {
            launcher,
            runtime,
            actions,
            active: None,
        }
    }

    /// Start `run_id`, cancelling whatever run was still streaming.
    pub fn start(
        &mut self,
        run_id: u64,
        mode: Option<AppMode>,
        inputs: Map<String, Value>,
        files: Vec<FileInput>,
    ) {
        if let Some(previous) = self.active.take() {
            debug!(run_id = previous.run_id, "cancelling superseded run");
            previous.cancel.cancel();
        }

        let cancel = CancellationToken::new();
        let launcher = Arc::clone(&self.launcher);
        let actions = self.actions.clone();
        let token = cancel.clone();

        let task = self.runtime.spawn(async move {
            let events = actions.clone();
            let forward = move |item: StreamItem| {
                let action = match item {
                    StreamItem::Event(event) => RuntimeAction::Event { run_id, event },
                    StreamItem::Rejected { reason } => {
                        RuntimeAction::ChunkRejected { run_id, reason }
                    }
                };
                let _ = events.send(PanelAction::Runtime(action));
            };
            let result =
                trigger_run(launcher.as_ref(), mode, inputs, files, &token, forward).await;

            let done = match result {
                Ok(summary) if summary.cancelled => return,
                Ok(_) => RuntimeAction::StreamCompleted { run_id },
                Err(err) if err.is_dispatch_rejection() => RuntimeAction::DispatchRejected {
                    run_id,
                    message: err.to_string(),
                },
                Err(err) => RuntimeAction::StreamFailed {
                    run_id,
                    message: err.to_string(),
                },
            };
            let _ = actions.send(PanelAction::Runtime(done));
        });

        self.active = Some(ActiveTask {
            run_id,
            cancel,
            task,
        });
    }

    pub fn cancel(&mut self, run_id: u64) {
        if self.active.as_ref().is_some_and(|active| active.run_id == run_id) {
            if let Some(active) = self.active.take() {
                active.cancel.cancel();
            }
        }
    }

    pub fn active_run_id(&self) -> Option<u64> {
        self.active
            .as_ref()
            .filter(|active| !active.task.is_finished())
            .map(|active| active.run_id)
    }

    pub fn shutdown(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
        }
    }
}

impl Drop for RunController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
