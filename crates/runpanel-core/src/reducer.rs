use serde_json::Map;
use serde_json::Value;
use tracing::debug;

use super::actions::PanelAction;
use super::actions::RuntimeAction;
use super::actions::UserAction;
use super::events::RunEvent;
use super::form::FileInput;
use super::form::InputForm;
use super::state::ActiveRun;
use super::state::Notice;
use super::state::NoticeLevel;
use super::state::NodeStatus;
use super::state::PanelState;
use super::state::RunState;
use super::state::RunStatus;
use super::state::WorkflowNode;
use super::view::detail_json;
use super::view::output_text;
use super::view::visible_tabs;
use super::view::ResultTab;

#[derive(Debug, Clone, PartialEq)]
pub enum PanelEffect {
    StartRun {
        run_id: u64,
        inputs: Map<String, Value>,
        files: Vec<FileInput>,
    },
    CancelRun {
        run_id: u64,
    },
    CopyToClipboard(String),
    RequestFrame,
}

/// Fold one event into the run state.
///
/// Total over every [`RunEvent`]: variants that do not touch the run state
/// (`Error`, `MessageFile`, `Ignored`) return it unchanged.
pub fn fold_event(mut run: RunState, event: &RunEvent) -> RunState {
    match event {
        RunEvent::TextChunk { text } => {
            run.text.push_str(text);
        }
        RunEvent::WorkflowStarted => {
            run.status = RunStatus::Running;
            run.nodes.clear();
        }
        RunEvent::WorkflowFinished { outputs, files } => {
            run.status = RunStatus::Finished;
            if outputs.len() == 1 {
                if let Some(value) = outputs.values().next() {
                    run.text = output_text(value);
                }
            }
            if !outputs.is_empty() {
                run.outputs = outputs.clone();
            }
            if !files.is_empty() {
                run.files = files.clone();
            }
        }
        RunEvent::NodeStarted {
            id,
            node_type,
            title,
        } => {
            run.nodes
                .push(WorkflowNode::started(id.clone(), node_type.clone(), title.clone()));
        }
        RunEvent::NodeFinished(done) => {
            match run.nodes.iter_mut().find(|node| node.id == done.id) {
                Some(node) => {
                    node.status = NodeStatus::Success;
                    node.inputs = Some(done.inputs.clone());
                    node.outputs = done.outputs.clone();
                    node.process_data = Some(done.process_data.clone());
                    node.elapsed_time = Some(done.elapsed_time);
                    node.execution_metadata = Some(done.execution_metadata.clone());
                }
                None => debug!(node_id = %done.id, "node_finished for unknown node"),
            }
        }
        RunEvent::Message { answer } => {
            run.text.push_str(answer);
        }
        RunEvent::MessageFile { .. } | RunEvent::Error { .. } => {}
        RunEvent::Ignored { tag, reason } => {
            debug!(tag = tag.as_deref().unwrap_or(""), reason = reason.label(), "event ignored");
        }
    }
    run
}

pub fn fold_events<'a>(run: RunState, events: impl IntoIterator<Item = &'a RunEvent>) -> RunState {
    events.into_iter().fold(run, fold_event)
}

pub fn reduce(state: &mut PanelState, action: PanelAction) -> Vec<PanelEffect> {
    match action {
        PanelAction::User(user) => reduce_user(state, user),
        PanelAction::Runtime(runtime) => reduce_runtime(state, runtime),
    }
}

fn reduce_user(state: &mut PanelState, action: UserAction) -> Vec<PanelEffect> {
    match action {
        UserAction::FocusNextField => {
            state.form.focus_next();
            vec![PanelEffect::RequestFrame]
        }
        UserAction::FocusPrevField => {
            state.form.focus_prev();
            vec![PanelEffect::RequestFrame]
        }
        UserAction::FieldInput(ch) => {
            state.form.input_char(ch);
            vec![PanelEffect::RequestFrame]
        }
        UserAction::FieldBackspace => {
            state.form.backspace();
            vec![PanelEffect::RequestFrame]
        }
        UserAction::FieldPaste(text) => {
            state.form.paste(&text);
            vec![PanelEffect::RequestFrame]
        }
        UserAction::NextOption => {
            state.form.cycle_option(true);
            vec![PanelEffect::RequestFrame]
        }
        UserAction::PrevOption => {
            state.form.cycle_option(false);
            vec![PanelEffect::RequestFrame]
        }
        UserAction::SetFieldValue { variable, value } => {
            state.form.set_value(&variable, value);
            Vec::new()
        }
        UserAction::AddFile { variable, path } => {
            state.form.add_file(&variable, path);
            Vec::new()
        }
        UserAction::SubmitRun => submit_run(state),
        UserAction::CancelRun => {
            if !state.active.in_flight {
                return Vec::new();
            }
            let run_id = state.active.run_id;
            state.active.in_flight = false;
            state.run.status = RunStatus::Idle;
            state
                .notices
                .append(Notice::new(NoticeLevel::Info, "Run cancelled", run_id));
            vec![PanelEffect::CancelRun { run_id }, PanelEffect::RequestFrame]
        }
        UserAction::NextTab => {
            step_tab(state, true);
            vec![PanelEffect::RequestFrame]
        }
        UserAction::PrevTab => {
            step_tab(state, false);
            vec![PanelEffect::RequestFrame]
        }
        UserAction::SelectTab(tab) => {
            if !tab.is_visible(&state.run) {
                return Vec::new();
            }
            state.routing.tab = Some(tab);
            vec![PanelEffect::RequestFrame]
        }
        UserAction::CopyDetail => {
            if !ResultTab::Detail.is_visible(&state.run) {
                return Vec::new();
            }
            vec![PanelEffect::CopyToClipboard(detail_json(&state.run))]
        }
        UserAction::DismissNotice => {
            state.notices.dismiss_latest();
            vec![PanelEffect::RequestFrame]
        }
    }
}

fn submit_run(state: &mut PanelState) -> Vec<PanelEffect> {
    let mut effects = Vec::new();
    if state.active.in_flight {
        effects.push(PanelEffect::CancelRun {
            run_id: state.active.run_id,
        });
    }

    let run_id = state.active.next_run_id;
    state.active = ActiveRun {
        run_id,
        in_flight: true,
        rejected_chunks: 0,
        next_run_id: run_id.saturating_add(1),
    };
    state.run.reset();
    state.run.status = RunStatus::Running;
    state.routing.tab = None;

    effects.push(PanelEffect::StartRun {
        run_id,
        inputs: state.form.values(),
        files: state.form.file_inputs(),
    });
    effects.push(PanelEffect::RequestFrame);
    effects
}

fn reduce_runtime(state: &mut PanelState, action: RuntimeAction) -> Vec<PanelEffect> {
    if let Some(run_id) = action.run_id() {
        if !state.active.accepts(run_id) {
            debug!(
                run_id,
                active_run_id = state.active.run_id,
                "dropping action for inactive run"
            );
            return Vec::new();
        }
    }

    match action {
        RuntimeAction::Event { run_id, event } => {
            if let RunEvent::Error { message } = &event {
                state
                    .notices
                    .append(Notice::new(NoticeLevel::Error, message.as_str(), run_id));
            }
            let run = std::mem::take(&mut state.run);
            state.run = fold_event(run, &event);
            reconcile_tab(state);
            vec![PanelEffect::RequestFrame]
        }
        RuntimeAction::ChunkRejected { run_id, reason } => {
            state.active.rejected_chunks = state.active.rejected_chunks.saturating_add(1);
            debug!(run_id, %reason, "chunk rejected");
            Vec::new()
        }
        RuntimeAction::StreamCompleted { .. } => {
            state.active.in_flight = false;
            state.run.status = RunStatus::Finished;
            reconcile_tab(state);
            vec![PanelEffect::RequestFrame]
        }
        RuntimeAction::StreamFailed { run_id, message }
        | RuntimeAction::DispatchRejected { run_id, message } => {
            state.active.in_flight = false;
            state.run.status = RunStatus::Idle;
            state
                .notices
                .append(Notice::new(NoticeLevel::Error, message, run_id));
            vec![PanelEffect::RequestFrame]
        }
        RuntimeAction::SetAppInfo(info) => {
            if state.header.mode.is_none() {
                state.header.mode = info.app_mode();
            }
            state.header.info = Some(info);
            vec![PanelEffect::RequestFrame]
        }
        RuntimeAction::SetFormFields(fields) => {
            let previous = std::mem::take(&mut state.form);
            let mut form = InputForm::new(fields);
            for (field, idx) in previous.fields().iter().zip(0..) {
                if let Some(value) = previous.value(idx).filter(|v| !v.is_empty()) {
                    form.set_value(&field.variable, value);
                }
            }
            state.form = form;
            vec![PanelEffect::RequestFrame]
        }
        RuntimeAction::Notify { level, message } => {
            state
                .notices
                .append(Notice::new(level, message, state.active.run_id));
            vec![PanelEffect::RequestFrame]
        }
    }
}

fn reconcile_tab(state: &mut PanelState) {
    let visible = visible_tabs(&state.run);
    let keep = state
        .routing
        .tab
        .is_some_and(|tab| visible.contains(&tab));
    if !keep {
        state.routing.tab = visible.first().copied();
    }
}

fn step_tab(state: &mut PanelState, forward: bool) {
    let visible = visible_tabs(&state.run);
    if visible.is_empty() {
        state.routing.tab = None;
        return;
    }
    let len = visible.len();
    let next = match state
        .routing
        .tab
        .and_then(|tab| visible.iter().position(|t| *t == tab))
    {
        Some(idx) if forward => (idx + 1) % len,
        Some(idx) => (idx + len - 1) % len,
        None => 0,
    };
    state.routing.tab = Some(visible[next]);
}

#[cfg(test)]
mod tests;
