use std::sync::Arc;

use super::events::RunEvent;
use super::form::FormField;
use super::state::AppInfo;
use super::state::NoticeLevel;
use super::view::ResultTab;

#[derive(Debug, Clone)]
pub enum PanelAction {
    User(UserAction),
    Runtime(RuntimeAction),
}

#[derive(Debug, Clone)]
pub enum UserAction {
    FocusNextField,
    FocusPrevField,
    FieldInput(char),
    FieldBackspace,
    FieldPaste(String),
    NextOption,
    PrevOption,
    SetFieldValue { variable: String, value: String },
    AddFile { variable: String, path: String },
    SubmitRun,
    CancelRun,
    NextTab,
    PrevTab,
    SelectTab(ResultTab),
    CopyDetail,
    DismissNotice,
}

/// Actions produced outside the UI thread. Stream-bound actions carry the
/// `run_id` they belong to and are dropped once that run is no longer
/// active.
#[derive(Debug, Clone)]
pub enum RuntimeAction {
    Event {
        run_id: u64,
        event: RunEvent,
    },
    ChunkRejected {
        run_id: u64,
        reason: String,
    },
    StreamCompleted {
        run_id: u64,
    },
    StreamFailed {
        run_id: u64,
        message: String,
    },
    DispatchRejected {
        run_id: u64,
        message: String,
    },
    SetAppInfo(AppInfo),
    SetFormFields(Vec<FormField>),
    Notify {
        level: NoticeLevel,
        message: Arc<str>,
    },
}

impl RuntimeAction {
    pub fn run_id(&self) -> Option<u64> {
        match self {
            Self::Event { run_id, .. }
            | Self::ChunkRejected { run_id, .. }
            | Self::StreamCompleted { run_id }
            | Self::StreamFailed { run_id, .. }
            | Self::DispatchRejected { run_id, .. } => Some(*run_id),
            Self::SetAppInfo(_) | Self::SetFormFields(_) | Self::Notify { .. } => None,
        }
    }
}
