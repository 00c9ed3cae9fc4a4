//! Config file loading and environment overrides.

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use runpanel_core::config::AppMode;
use runpanel_core::config::Config;

pub const ENV_API_KEY: &str = "RUNPANEL_API_KEY";
pub const ENV_BASE_URL: &str = "RUNPANEL_BASE_URL";
pub const ENV_USER: &str = "RUNPANEL_USER";
pub const ENV_MODE: &str = "RUNPANEL_MODE";

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("runpanel").join("config.toml"))
}

/// Load `path`, or the default location when none is given. A missing file
/// yields defaults; a file that fails to parse is an error.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let explicit = path.is_some();
    let Some(path) = path.map(Path::to_path_buf).or_else(default_config_path) else {
        return Ok(Config::default());
    };

    if !path.exists() {
        if explicit {
            bail!("config file not found: {}", path.display());
        }
        return Ok(Config::default());
    }

    let text = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("failed to parse config: {}", path.display()))
}

/// Apply `RUNPANEL_*` overrides read through `lookup`.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if let Some(key) = lookup(ENV_API_KEY) {
        config.api.api_key = Some(key);
    }
    if let Some(url) = lookup(ENV_BASE_URL) {
        config.api.base_url = url;
    }
    if let Some(user) = lookup(ENV_USER) {
        config.api.user = user;
    }
    if let Some(mode) = lookup(ENV_MODE) {
        let mode: AppMode = mode
            .parse()
            .with_context(|| format!("invalid {ENV_MODE}"))?;
        config.app.mode = Some(mode);
    }
    Ok(())
}

pub fn load(path: Option<&Path>) -> Result<Config> {
    let mut config = load_config(path)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputValue {
    Text(String),
    /// Local path to upload, from `key=@path`.
    File(String),
}

/// Parse a `key=value` run input. `key=@path` names a file to upload and
/// `key=@@text` passes a literal leading `@`.
pub fn parse_input(raw: &str) -> Result<(String, InputValue)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("input must be key=value: {raw}");
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("input key is empty: {raw}");
    }
    let value = match value.strip_prefix('@') {
        Some(rest) if rest.starts_with('@') => InputValue::Text(rest.to_string()),
        Some("") => bail!("file input needs a path: {raw}"),
        Some(path) => InputValue::File(path.to_string()),
        None => InputValue::Text(value.to_string()),
    };
    Ok((key.to_string(), value))
}
