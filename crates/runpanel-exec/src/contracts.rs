use runpanel_core::config::AppMode;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use serde_json::Map;
use serde_json::Value;

use crate::error::ExecError;

pub const RESPONSE_MODE_STREAMING: &str = "streaming";
pub const TRANSFER_METHOD_LOCAL_FILE: &str = "local_file";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    Workflow,
    Completion,
}

impl RunKind {
    pub fn path(self) -> &'static str {
        match self {
            Self::Workflow => "workflows/run",
            Self::Completion => "completion-messages",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Workflow => "workflow",
            Self::Completion => "completion",
        }
    }
}

/// Pick the run operation for an application mode. Chat-style apps have no
/// single-shot run and are rejected.
pub fn select_run_kind(mode: AppMode) -> Result<RunKind, ExecError> {
    match mode {
        AppMode::Workflow => Ok(RunKind::Workflow),
        AppMode::Completion => Ok(RunKind::Completion),
        other => Err(ExecError::UnsupportedMode(other)),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRequest {
    pub inputs: Map<String, Value>,
    pub response_mode: &'static str,
    pub user: String,
}

impl RunRequest {
    pub fn streaming(inputs: Map<String, Value>, user: impl Into<String>) -> Self {
        Self {
            inputs,
            response_mode: RESPONSE_MODE_STREAMING,
            user: user.into(),
        }
    }
}

/// Response of `POST /files/upload`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UploadedFile {
    pub id: String,
    pub name: String,
    pub extension: Option<String>,
    pub mime_type: Option<String>,
}

impl UploadedFile {
    pub fn file_type(&self) -> &'static str {
        let extension = self
            .extension
            .as_deref()
            .or_else(|| self.name.rsplit_once('.').map(|(_, ext)| ext))
            .unwrap_or_default();
        file_type_for_extension(extension)
    }

    /// The run `inputs` value that references this upload.
    pub fn input_value(&self) -> Value {
        json!({
            "transfer_method": TRANSFER_METHOD_LOCAL_FILE,
            "upload_file_id": self.id,
            "type": self.file_type(),
        })
    }
}

/// File category the run endpoints expect for an uploaded file.
pub fn file_type_for_extension(extension: &str) -> &'static str {
    match extension.trim_start_matches('.').to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" | "png" | "gif" | "webp" | "svg" => "image",
        "mp3" | "m4a" | "wav" | "amr" | "mpga" => "audio",
        "mp4" | "mov" | "mpeg" | "webm" => "video",
        "txt" | "md" | "markdown" | "mdx" | "pdf" | "html" | "htm" | "xlsx" | "xls" | "doc"
        | "docx" | "csv" | "eml" | "msg" | "pptx" | "ppt" | "xml" | "epub" => "document",
        _ => "custom",
    }
}
