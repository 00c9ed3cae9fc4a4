use std::collections::VecDeque;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use super::config::AppMode;
use super::config::DEFAULT_NOTICE_CAPACITY;
use super::events::ExecutionMetadata;
use super::events::ResultFile;
use super::form::InputForm;
use super::view::ResultTab;

/// Overall run status. `Idle` is the indeterminate state: nothing started
/// yet, or the last run failed before finishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Finished,
}

impl RunStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Finished => "finished",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Running,
    Success,
}

impl NodeStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowNode {
    pub id: String,
    pub status: NodeStatus,
    pub node_type: String,
    pub title: String,
    pub inputs: Option<String>,
    pub outputs: Option<Value>,
    pub process_data: Option<String>,
    pub elapsed_time: Option<f64>,
    pub execution_metadata: Option<ExecutionMetadata>,
}

impl WorkflowNode {
    pub fn started(id: String, node_type: String, title: String) -> Self {
        Self {
            id,
            status: NodeStatus::Running,
            node_type,
            title,
            inputs: None,
            outputs: None,
            process_data: None,
            elapsed_time: None,
            execution_metadata: None,
        }
    }
}

/// Aggregate state of one run, folded from the event stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunState {
    pub status: RunStatus,
    pub text: String,
    pub nodes: Vec<WorkflowNode>,
    pub outputs: Map<String, Value>,
    pub files: Vec<ResultFile>,
}

impl RunState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_running(&self) -> bool {
        self.status == RunStatus::Running
    }

    pub fn node(&self, id: &str) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|node| node.id == id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppInfo {
    pub name: String,
    pub description: String,
    pub mode: Option<String>,
    pub tags: Vec<String>,
}

impl AppInfo {
    pub fn app_mode(&self) -> Option<AppMode> {
        self.mode.as_deref().and_then(|mode| mode.parse().ok())
    }
}

#[derive(Debug, Clone, Default)]
pub struct PanelHeader {
    pub info: Option<AppInfo>,
    pub mode: Option<AppMode>,
}

impl PanelHeader {
    pub fn title(&self) -> &str {
        self.info
            .as_ref()
            .map(|info| info.name.as_str())
            .filter(|name| !name.is_empty())
            .unwrap_or("runpanel")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

impl NoticeLevel {
    pub fn label(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub seq: u64,
    pub level: NoticeLevel,
    pub ts_ms: i64,
    pub message: Arc<str>,
    pub run_id: u64,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<Arc<str>>, run_id: u64) -> Self {
        Self {
            seq: 0,
            level,
            ts_ms: chrono::Utc::now().timestamp_millis(),
            message: message.into(),
            run_id,
        }
    }
}

/// Bounded FIFO of user-visible notices.
#[derive(Debug, Clone)]
pub struct NoticeBuffer {
    cap: usize,
    next_seq: u64,
    buf: VecDeque<Notice>,
}

impl Default for NoticeBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_NOTICE_CAPACITY)
    }
}

impl NoticeBuffer {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            cap,
            next_seq: 1,
            buf: VecDeque::with_capacity(cap),
        }
    }

    pub fn append(&mut self, mut notice: Notice) {
        notice.seq = self.next_seq;
        self.next_seq += 1;

        if self.buf.len() == self.cap {
            self.buf.pop_front();
        }
        self.buf.push_back(notice);
    }

    pub fn dismiss_latest(&mut self) -> Option<Notice> {
        self.buf.pop_back()
    }

    pub fn latest(&self) -> Option<&Notice> {
        self.buf.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notice> {
        self.buf.iter()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

/// Bookkeeping for the run whose events the panel currently accepts.
#[derive(Debug, Clone, Copy)]
pub struct ActiveRun {
    pub run_id: u64,
    pub in_flight: bool,
    pub rejected_chunks: u32,
    pub next_run_id: u64,
}

impl Default for ActiveRun {
    fn default() -> Self {
        Self {
            run_id: 0,
            in_flight: false,
            rejected_chunks: 0,
            next_run_id: 1,
        }
    }
}

impl ActiveRun {
    pub fn accepts(&self, run_id: u64) -> bool {
        self.in_flight && self.run_id == run_id
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PanelRouting {
    pub tab: Option<ResultTab>,
}

#[derive(Debug, Clone, Default)]
pub struct PanelState {
    pub header: PanelHeader,
    pub form: InputForm,
    pub run: RunState,
    pub active: ActiveRun,
    pub routing: PanelRouting,
    pub notices: NoticeBuffer,
}

impl PanelState {
    pub fn new(mode: Option<AppMode>, notice_capacity: usize) -> Self {
        Self {
            header: PanelHeader { info: None, mode },
            notices: NoticeBuffer::new(notice_capacity),
            ..Self::default()
        }
    }
}
