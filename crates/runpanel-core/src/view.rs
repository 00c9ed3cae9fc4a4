//! Presentation derived from run state. Everything here is a pure function
//! of [`RunState`]; renderers decide how to draw it.

use serde_json::Value;

use super::state::NodeStatus;
use super::state::RunState;
use super::state::WorkflowNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultTab {
    Result,
    Files,
    Detail,
}

impl ResultTab {
    pub const ALL: [ResultTab; 3] = [Self::Result, Self::Files, Self::Detail];

    pub fn label(self) -> &'static str {
        match self {
            Self::Result => "Result",
            Self::Files => "Files",
            Self::Detail => "Detail",
        }
    }

    pub fn is_visible(self, run: &RunState) -> bool {
        match self {
            Self::Result => run.outputs.len() == 1,
            Self::Files => !run.files.is_empty(),
            Self::Detail => !run.outputs.is_empty(),
        }
    }
}

pub fn visible_tabs(run: &RunState) -> Vec<ResultTab> {
    ResultTab::ALL
        .into_iter()
        .filter(|tab| tab.is_visible(run))
        .collect()
}

/// Placeholder is shown only before anything has happened.
pub fn shows_empty_state(run: &RunState) -> bool {
    run.text.is_empty() && run.nodes.is_empty() && !run.is_running()
}

/// Outputs rendered as two-space indented JSON, the Detail tab body and the
/// clipboard payload.
pub fn detail_json(run: &RunState) -> String {
    serde_json::to_string_pretty(&run.outputs).unwrap_or_else(|_| "{}".to_string())
}

/// Text of an output value: strings verbatim, everything else as JSON.
pub fn output_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

pub fn node_status_glyph(status: NodeStatus) -> &'static str {
    match status {
        NodeStatus::Running => "…",
        NodeStatus::Success => "✓",
    }
}

/// One-line summary of a node for the execution log.
pub fn node_line(node: &WorkflowNode) -> String {
    let mut line = format!(
        "{} {} ({})",
        node_status_glyph(node.status),
        node.title,
        node.node_type
    );
    if let Some(elapsed) = node.elapsed_time {
        line.push_str(&format!(" {:.3}s", elapsed));
    }
    if let Some(meta) = node
        .execution_metadata
        .as_ref()
        .filter(|meta| meta.total_tokens > 0)
    {
        line.push_str(&format!(" · {} tokens", meta.total_tokens));
        if meta.total_price > 0.0 {
            line.push_str(&format!(" · {} {}", meta.total_price, meta.currency));
        }
    }
    line
}
