//! Decoded run events.
//!
//! Each SSE `data:` payload emitted by the run endpoints is a JSON object with
//! an `event` tag. Node and workflow payloads live under `data`, while chat
//! style events (`message`, `message_file`, `error`) keep their fields at the
//! top level. Decoding checks the per-tag preconditions up front so the
//! reducer only ever sees well-formed variants; anything else becomes
//! [`RunEvent::Ignored`].

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

pub const EVENT_TEXT_CHUNK: &str = "text_chunk";
pub const EVENT_WORKFLOW_STARTED: &str = "workflow_started";
pub const EVENT_WORKFLOW_FINISHED: &str = "workflow_finished";
pub const EVENT_NODE_STARTED: &str = "node_started";
pub const EVENT_NODE_FINISHED: &str = "node_finished";
pub const EVENT_MESSAGE_FILE: &str = "message_file";
pub const EVENT_MESSAGE: &str = "message";
pub const EVENT_ERROR: &str = "error";

#[derive(Debug, Error)]
pub enum EventDecodeError {
    #[error("invalid event json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("event payload is not a json object")]
    NotAnObject,
}

/// File attached to a finished workflow. Servers send a partial record, so
/// every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub belongs_to: Option<String>,
}

impl ResultFile {
    /// Decode one `files` entry field by field. A mistyped field is dropped,
    /// never the entry; a bare string is taken as the file URL.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => Self {
                id: str_field(map, "id"),
                filename: str_field(map, "filename"),
                file_type: str_field(map, "type"),
                url: str_field(map, "url"),
                mime_type: str_field(map, "mime_type"),
                size: map.get("size").and_then(coerce_size),
                transfer_method: str_field(map, "transfer_method"),
                belongs_to: str_field(map, "belongs_to"),
            },
            Value::String(url) => Self {
                url: Some(url.clone()),
                ..Self::default()
            },
            _ => Self::default(),
        }
    }

    pub fn display_name(&self) -> &str {
        self.filename
            .as_deref()
            .or(self.url.as_deref())
            .or(self.id.as_deref())
            .unwrap_or("<unnamed file>")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    pub total_tokens: u64,
    pub total_price: f64,
    pub currency: String,
}

/// Payload of `node_finished` after coercion into display-ready shapes.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeCompletion {
    pub id: String,
    pub inputs: String,
    pub outputs: Option<Value>,
    pub process_data: String,
    pub elapsed_time: f64,
    pub execution_metadata: ExecutionMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    UnknownTag,
    MissingTag,
    Precondition(&'static str),
}

impl IgnoreReason {
    pub fn label(self) -> &'static str {
        match self {
            Self::UnknownTag => "unknown event tag",
            Self::MissingTag => "missing event tag",
            Self::Precondition(field) => field,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    TextChunk {
        text: String,
    },
    WorkflowStarted,
    WorkflowFinished {
        outputs: Map<String, Value>,
        files: Vec<ResultFile>,
    },
    NodeStarted {
        id: String,
        node_type: String,
        title: String,
    },
    NodeFinished(NodeCompletion),
    MessageFile {
        url: String,
    },
    Message {
        answer: String,
    },
    Error {
        message: String,
    },
    Ignored {
        tag: Option<String>,
        reason: IgnoreReason,
    },
}

impl RunEvent {
    pub fn tag(&self) -> &str {
        match self {
            Self::TextChunk { .. } => EVENT_TEXT_CHUNK,
            Self::WorkflowStarted => EVENT_WORKFLOW_STARTED,
            Self::WorkflowFinished { .. } => EVENT_WORKFLOW_FINISHED,
            Self::NodeStarted { .. } => EVENT_NODE_STARTED,
            Self::NodeFinished(_) => EVENT_NODE_FINISHED,
            Self::MessageFile { .. } => EVENT_MESSAGE_FILE,
            Self::Message { .. } => EVENT_MESSAGE,
            Self::Error { .. } => EVENT_ERROR,
            Self::Ignored { tag, .. } => tag.as_deref().unwrap_or(""),
        }
    }
}

/// Decode one SSE `data` payload.
///
/// Only JSON syntax errors and non-object payloads fail; every other shape
/// problem yields [`RunEvent::Ignored`].
pub fn decode_event(data: &str) -> Result<RunEvent, EventDecodeError> {
    let value: Value = serde_json::from_str(data)?;
    event_from_value(value)
}

pub fn event_from_value(value: Value) -> Result<RunEvent, EventDecodeError> {
    let Value::Object(envelope) = value else {
        return Err(EventDecodeError::NotAnObject);
    };

    let Some(tag) = envelope.get("event").and_then(Value::as_str) else {
        return Ok(RunEvent::Ignored {
            tag: None,
            reason: IgnoreReason::MissingTag,
        });
    };
    let data = envelope.get("data").and_then(Value::as_object);

    let event = match tag {
        EVENT_TEXT_CHUNK => match data.and_then(|d| str_field(d, "text")) {
            Some(text) => RunEvent::TextChunk { text },
            None => ignored(tag, "data.text"),
        },
        EVENT_WORKFLOW_STARTED => RunEvent::WorkflowStarted,
        EVENT_WORKFLOW_FINISHED => {
            let outputs = data
                .and_then(|d| d.get("outputs"))
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            let files = data
                .and_then(|d| d.get("files"))
                .and_then(Value::as_array)
                .map(|items| decode_files(items))
                .unwrap_or_default();
            RunEvent::WorkflowFinished { outputs, files }
        }
        EVENT_NODE_STARTED => {
            let fields = data.and_then(|d| {
                Some((
                    str_field(d, "id")?,
                    str_field(d, "node_type")?,
                    str_field(d, "title")?,
                ))
            });
            match fields {
                Some((id, node_type, title)) => RunEvent::NodeStarted {
                    id,
                    node_type,
                    title,
                },
                None => ignored(tag, "data.id/node_type/title"),
            }
        }
        EVENT_NODE_FINISHED => match data {
            Some(d) => match str_field(d, "id") {
                Some(id) => RunEvent::NodeFinished(NodeCompletion {
                    id,
                    inputs: stringify_field(d.get("inputs")),
                    outputs: d.get("outputs").cloned(),
                    process_data: stringify_field(d.get("process_data")),
                    elapsed_time: coerce_number(d.get("elapsed_time")),
                    execution_metadata: coerce_metadata(d.get("execution_metadata")),
                }),
                None => ignored(tag, "data.id"),
            },
            None => ignored(tag, "data.id"),
        },
        EVENT_MESSAGE_FILE => match str_field(&envelope, "url") {
            Some(url) => RunEvent::MessageFile { url },
            None => ignored(tag, "url"),
        },
        EVENT_MESSAGE => match str_field(&envelope, "answer") {
            Some(answer) => RunEvent::Message { answer },
            None => ignored(tag, "answer"),
        },
        EVENT_ERROR => match envelope.get("message") {
            Some(Value::String(message)) => RunEvent::Error {
                message: message.clone(),
            },
            Some(Value::Null) | None => ignored(tag, "message"),
            Some(other) => RunEvent::Error {
                message: other.to_string(),
            },
        },
        _ => RunEvent::Ignored {
            tag: Some(tag.to_string()),
            reason: IgnoreReason::UnknownTag,
        },
    };
    Ok(event)
}

fn ignored(tag: &str, field: &'static str) -> RunEvent {
    RunEvent::Ignored {
        tag: Some(tag.to_string()),
        reason: IgnoreReason::Precondition(field),
    }
}

fn str_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}

fn decode_files(items: &[Value]) -> Vec<ResultFile> {
    items.iter().map(ResultFile::from_value).collect()
}

fn coerce_size(value: &Value) -> Option<u64> {
    match value {
        Value::Number(_) | Value::String(_) => {
            let size = coerce_number(Some(value));
            (size >= 0.0).then(|| size.round() as u64)
        }
        _ => None,
    }
}

/// Strings pass through; absent or null become empty; anything else is
/// rendered as compact JSON.
pub fn stringify_field(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

/// Numbers pass through, numeric strings are parsed, everything else is 0.
pub fn coerce_number(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(number)) => number.as_f64().unwrap_or(0.0),
        Some(Value::String(text)) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return 0.0;
            }
            trimmed
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .unwrap_or(0.0)
        }
        _ => 0.0,
    }
}

pub fn coerce_metadata(value: Option<&Value>) -> ExecutionMetadata {
    let Some(Value::Object(map)) = value else {
        return ExecutionMetadata::default();
    };
    let total_tokens = coerce_number(map.get("total_tokens"));
    ExecutionMetadata {
        total_tokens: if total_tokens > 0.0 {
            total_tokens.round() as u64
        } else {
            0
        },
        total_price: coerce_number(map.get("total_price")),
        currency: map
            .get("currency")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    }
}
