use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

pub const DEFAULT_BASE_URL: &str = "https://api.dify.ai/v1";
pub const DEFAULT_USER: &str = "runpanel";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_NOTICE_CAPACITY: usize = 50;

/// Application mode as reported by the app info endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppMode {
    Workflow,
    Completion,
    Chat,
    AdvancedChat,
    AgentChat,
}

impl AppMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Workflow => "workflow",
            Self::Completion => "completion",
            Self::Chat => "chat",
            Self::AdvancedChat => "advanced-chat",
            Self::AgentChat => "agent-chat",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Workflow => "Workflow",
            Self::Completion => "Text generator",
            Self::Chat => "Chatbot",
            Self::AdvancedChat => "Chatflow",
            Self::AgentChat => "Agent",
        }
    }
}

impl fmt::Display for AppMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAppMode(pub String);

impl fmt::Display for UnknownAppMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown app mode: {}", self.0)
    }
}

impl std::error::Error for UnknownAppMode {}

impl FromStr for AppMode {
    type Err = UnknownAppMode;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "workflow" => Ok(Self::Workflow),
            "completion" | "text-generator" | "text_generator" => Ok(Self::Completion),
            "chat" => Ok(Self::Chat),
            "advanced-chat" | "advanced_chat" => Ok(Self::AdvancedChat),
            "agent-chat" | "agent_chat" => Ok(Self::AgentChat),
            other => Err(UnknownAppMode(other.to_string())),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub app: AppConfig,
    pub ui: UiConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub user: String,
    pub connect_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            user: DEFAULT_USER.to_string(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub mode: Option<AppMode>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct UiConfig {
    pub notice_capacity: usize,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            notice_capacity: DEFAULT_NOTICE_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn app_mode_accepts_dashed_and_underscored_names() {
        assert_eq!("advanced-chat".parse::<AppMode>(), Ok(AppMode::AdvancedChat));
        assert_eq!("TEXT_GENERATOR".parse::<AppMode>(), Ok(AppMode::Completion));
        assert_eq!(
            "plugin".parse::<AppMode>(),
            Err(UnknownAppMode("plugin".to_string()))
        );
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"app":{"mode":"workflow"}}"#).expect("config");
        assert_eq!(config.app.mode, Some(AppMode::Workflow));
        assert_eq!(config.api, ApiConfig::default());
        assert_eq!(config.ui.notice_capacity, DEFAULT_NOTICE_CAPACITY);
    }
}
