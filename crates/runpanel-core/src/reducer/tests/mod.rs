pub(super) use serde_json::Value;

pub(super) use super::fold_event;
pub(super) use super::fold_events;
pub(super) use super::reduce;
pub(super) use super::PanelEffect;
pub(super) use crate::actions::PanelAction;
pub(super) use crate::actions::RuntimeAction;
pub(super) use crate::actions::UserAction;
pub(super) use crate::events::event_from_value;
pub(super) use crate::events::ExecutionMetadata;
pub(super) use crate::events::RunEvent;
pub(super) use crate::form::parse_user_input_form;
pub(super) use crate::state::NodeStatus;
pub(super) use crate::state::NoticeLevel;
pub(super) use crate::state::PanelState;
pub(super) use crate::state::RunState;
pub(super) use crate::state::RunStatus;
pub(super) use crate::view::ResultTab;

mod event_fold;

fn state() -> PanelState {
    PanelState::new(None, 8)
}

fn event(value: Value) -> RunEvent {
    event_from_value(value).expect("event envelope")
}

fn fold_all(values: Vec<Value>) -> RunState {
    let events: Vec<RunEvent> = values.into_iter().map(event).collect();
    fold_events(RunState::default(), &events)
}

/// Submit a run and return the id the panel allocated for it.
fn start_run(state: &mut PanelState) -> u64 {
    let effects = reduce(state, PanelAction::User(UserAction::SubmitRun));
    effects
        .iter()
        .find_map(|effect| match effect {
            PanelEffect::StartRun { run_id, .. } => Some(*run_id),
            _ => None,
        })
        .expect("submit emits StartRun")
}

fn run_event(state: &mut PanelState, run_id: u64, value: Value) -> Vec<PanelEffect> {
    reduce(
        state,
        PanelAction::Runtime(RuntimeAction::Event {
            run_id,
            event: event(value),
        }),
    )
}

fn run_runtime(state: &mut PanelState, action: RuntimeAction) -> Vec<PanelEffect> {
    reduce(state, PanelAction::Runtime(action))
}
