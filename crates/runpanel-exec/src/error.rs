use std::path::PathBuf;

use runpanel_core::config::AppMode;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// Error body returned by the app API on non-2xx responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub status: u16,
    pub code: Option<String>,
    pub message: String,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{code} ({}): {}", self.status, self.message),
            None => write!(f, "{}: {}", self.status, self.message),
        }
    }
}

impl ApiError {
    /// Decode an error response. JSON bodies contribute `code` and
    /// `message`; anything else becomes the message verbatim.
    pub fn from_body(status: u16, canonical: Option<&str>, body: &str) -> Self {
        let fallback = canonical.unwrap_or("request failed").to_string();
        if body.trim().is_empty() {
            return Self {
                status,
                code: None,
                message: fallback,
            };
        }

        match serde_json::from_str::<serde_json::Value>(body) {
            Ok(value) if value.is_object() => {
                let code = value
                    .get("code")
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
                let message = value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .unwrap_or(fallback);
                let status = value
                    .get("status")
                    .and_then(|v| v.as_u64())
                    .and_then(|v| u16::try_from(v).ok())
                    .unwrap_or(status);
                Self {
                    status,
                    code,
                    message,
                }
            }
            _ => Self {
                status,
                code: None,
                message: body.trim().to_string(),
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("unsupported app mode: {0}")]
    UnsupportedMode(AppMode),
    #[error("app mode is not known; set [app] mode or check the app info endpoint")]
    UnknownMode,
    #[error("missing api key")]
    MissingApiKey,
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("cannot read {path:?}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("api error {0}")]
    Api(ApiError),
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ExecError {
    /// Errors raised before any request leaves the process.
    pub fn is_dispatch_rejection(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedMode(_)
                | Self::UnknownMode
                | Self::MissingApiKey
                | Self::InvalidConfig(_)
                | Self::File { .. }
        )
    }
}
