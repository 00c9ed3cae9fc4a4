use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use futures_util::FutureExt;
use futures_util::StreamExt;
use reqwest::multipart::Form;
use reqwest::multipart::Part;
use reqwest::Response;
use runpanel_core::config::ApiConfig;
use runpanel_core::form::parse_user_input_form;
use runpanel_core::form::FormField;
use runpanel_core::state::AppInfo;
use serde_json::Map;
use serde_json::Value;
use tracing::debug;

use crate::contracts::RunKind;
use crate::contracts::RunRequest;
use crate::contracts::UploadedFile;
use crate::error::ApiError;
use crate::error::ExecError;

pub type ByteStream = BoxStream<'static, Result<Bytes, ExecError>>;

/// Starts a run and hands back its raw response body.
pub trait RunLauncher: Send + Sync {
    fn launch(
        &self,
        kind: RunKind,
        inputs: Map<String, Value>,
    ) -> BoxFuture<'_, Result<ByteStream, ExecError>>;

    /// Upload a local file so a run can reference it.
    fn upload(&self, path: PathBuf) -> BoxFuture<'_, Result<UploadedFile, ExecError>>;
}

/// Client for the app-scoped service API (`/workflows/run`,
/// `/completion-messages`, `/parameters`, `/info`).
#[derive(Debug, Clone)]
pub struct AppClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    user: String,
}

impl AppClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ExecError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(ExecError::MissingApiKey)?
            .to_string();
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        reqwest::Url::parse(&base_url)
            .map_err(|err| ExecError::InvalidConfig(format!("base_url {base_url:?}: {err}")))?;

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs.max(1)))
            .build()?;

        Ok(Self {
            http,
            base_url,
            api_key,
            user: config.user.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// POST the run request and return the SSE body as a byte stream.
    pub async fn start_run(
        &self,
        kind: RunKind,
        inputs: Map<String, Value>,
    ) -> Result<ByteStream, ExecError> {
        let body = RunRequest::streaming(inputs, self.user.clone());
        debug!(kind = kind.label(), inputs = body.inputs.len(), "posting run request");
        let response = self
            .http
            .post(self.url(kind.path()))
            .bearer_auth(&self.api_key)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&body)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(ExecError::from))
            .boxed())
    }

    /// Upload a local file as multipart `file` with the configured `user`.
    pub async fn upload_file(&self, path: &Path) -> Result<UploadedFile, ExecError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| ExecError::File {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        debug!(file = %name, bytes = bytes.len(), "uploading file");

        let form = Form::new()
            .text("user", self.user.clone())
            .part("file", Part::bytes(bytes).file_name(name));
        let response = self
            .http
            .post(self.url("files/upload"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;
        let response = check_status(response).await?;
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|err| ExecError::Decode(format!("files/upload: {err}")))
    }

    pub async fn parameters(&self) -> Result<Vec<FormField>, ExecError> {
        let value = self.get_json("parameters").await?;
        let form = value.get("user_input_form").unwrap_or(&Value::Null);
        Ok(parse_user_input_form(form))
    }

    pub async fn info(&self) -> Result<AppInfo, ExecError> {
        let value = self.get_json("info").await?;
        serde_json::from_value(value).map_err(|err| ExecError::Decode(format!("app info: {err}")))
    }

    async fn get_json(&self, path: &str) -> Result<Value, ExecError> {
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(&self.api_key)
            .query(&[("user", self.user.as_str())])
            .send()
            .await?;
        let response = check_status(response).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|err| ExecError::Decode(format!("{path}: {err}")))
    }
}

impl RunLauncher for AppClient {
    fn launch(
        &self,
        kind: RunKind,
        inputs: Map<String, Value>,
    ) -> BoxFuture<'_, Result<ByteStream, ExecError>> {
        self.start_run(kind, inputs).boxed()
    }

    fn upload(&self, path: PathBuf) -> BoxFuture<'_, Result<UploadedFile, ExecError>> {
        async move { self.upload_file(&path).await }.boxed()
    }
}

async fn check_status(response: Response) -> Result<Response, ExecError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ExecError::Api(ApiError::from_body(
        status.as_u16(),
        status.canonical_reason(),
        &body,
    )))
}
