//! Client for remote code-interpreter sessions.
//!
//! Speaks the dynamic-sessions REST protocol: every request is scoped to a
//! session by the `identifier` query parameter, and files live under
//! `/mnt/data/` inside the session.

use base64::Engine as _;
use regex::Regex;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::errors::AgentError;
use crate::tools::Tool;

pub mod auth;
pub mod tools;

pub use auth::{
    token_provider_from_config, AccessTokenProvider, AzureCliTokenProvider, StaticTokenProvider,
};
pub use tools::{CodeInterpreterTool, ListFilesTool};

pub const API_VERSION: &str = "2024-02-02-preview";
pub const REMOTE_DATA_DIR: &str = "/mnt/data";
const REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFileMetadata {
    pub filename: String,
    #[serde(rename = "size")]
    pub size_in_bytes: u64,
}

impl RemoteFileMetadata {
    pub fn full_path(&self) -> String {
        format!("{}/{}", REMOTE_DATA_DIR, self.filename)
    }
}

#[derive(Debug, Deserialize)]
struct FileListResponse {
    #[serde(default)]
    value: Vec<FileListEntry>,
}

#[derive(Debug, Deserialize)]
struct FileListEntry {
    properties: Option<RemoteFileMetadata>,
}

impl FileListResponse {
    fn into_metadata(self) -> Vec<RemoteFileMetadata> {
        self.value
            .into_iter()
            .filter_map(|entry| entry.properties)
            .collect()
    }
}

/// Strips markdown fences and a leading `python` tag that models wrap code in.
pub fn sanitize_input(code: &str) -> String {
    static LEADING: OnceLock<Regex> = OnceLock::new();
    static TRAILING: OnceLock<Regex> = OnceLock::new();
    let leading =
        LEADING.get_or_init(|| Regex::new(r"^(\s|`)*(?i:python)?\s*").expect("valid regex"));
    let trailing = TRAILING.get_or_init(|| Regex::new(r"(\s|`)*$").expect("valid regex"));

    let code = leading.replace(code, "");
    trailing.replace(&code, "").into_owned()
}

/// One remote interpreter session.
pub struct CodeInterpreterToolSpec {
    client: Client,
    pool_management_endpoint: String,
    session_id: String,
    local_save_path: Option<PathBuf>,
    sanitize_input: bool,
    token_provider: Arc<dyn AccessTokenProvider>,
}

impl CodeInterpreterToolSpec {
    /// A fresh session (random UUID identifier) on the given pool.
    pub fn new(
        pool_management_endpoint: impl Into<String>,
        token_provider: Arc<dyn AccessTokenProvider>,
    ) -> Result<Self, AgentError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AgentError::SandboxError(format!("Failed to create HTTP client: {}", e)))?;

        let pool_management_endpoint = pool_management_endpoint.into();
        if pool_management_endpoint.trim().is_empty() {
            return Err(AgentError::ConfigError(
                "Pool management endpoint must not be empty".to_string(),
            ));
        }

        Ok(Self {
            client,
            pool_management_endpoint,
            session_id: uuid::Uuid::new_v4().to_string(),
            local_save_path: None,
            sanitize_input: true,
            token_provider,
        })
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    /// Directory that image results are written to.
    pub fn with_local_save_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_save_path = Some(path.into());
        self
    }

    pub fn with_sanitize_input(mut self, sanitize_input: bool) -> Self {
        self.sanitize_input = sanitize_input;
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn local_save_path(&self) -> Option<&Path> {
        self.local_save_path.as_deref()
    }

    pub fn build_url(&self, path: &str) -> String {
        let mut endpoint = self.pool_management_endpoint.clone();
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }
        let separator = if path.contains('?') { '&' } else { '?' };
        format!(
            "{}{}{}identifier={}&api-version={}",
            endpoint,
            path,
            separator,
            urlencoding::encode(&self.session_id),
            API_VERSION
        )
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, AgentError> {
        let token = self.token_provider.access_token().await?;
        Ok(request.bearer_auth(token))
    }

    async fn send(&self, request: RequestBuilder, operation: &str) -> Result<reqwest::Response, AgentError> {
        let response = self
            .authorized(request)
            .await?
            .send()
            .await
            .map_err(|e| AgentError::SandboxError(format!("{} request failed: {}", operation, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!("Sandbox {} failed with {}: {}", operation, status, body);
            return Err(AgentError::SandboxError(format!(
                "{} returned {}: {}",
                operation, status, body
            )));
        }
        Ok(response)
    }

    /// Runs Python code in the session and returns the response `properties`.
    pub async fn code_interpreter(&self, python_code: &str) -> Result<Value, AgentError> {
        let code = if self.sanitize_input {
            sanitize_input(python_code)
        } else {
            python_code.to_string()
        };

        let body = serde_json::json!({
            "properties": {
                "codeInputType": "inline",
                "executionType": "synchronous",
                "code": code,
            }
        });

        log::debug!("Executing code in session {}:\n{}", self.session_id, code);
        let request = self.client.post(self.build_url("code/execute")).json(&body);
        let response: Value = self
            .send(request, "code/execute")
            .await?
            .json()
            .await
            .map_err(|e| AgentError::SandboxError(format!("Invalid execution response: {}", e)))?;

        let mut properties = response.get("properties").cloned().unwrap_or(Value::Null);
        if let Some(result) = properties.get_mut("result").filter(|r| r.is_object()) {
            self.save_image_result(result).await?;
        }
        Ok(properties)
    }

    async fn save_image_result(&self, result: &mut Value) -> Result<(), AgentError> {
        let Some(object) = result.as_object_mut() else {
            return Ok(());
        };
        if object.get("type").and_then(Value::as_str) != Some("image") {
            return Ok(());
        }
        let Some(encoded) = object.remove("base64_data") else {
            return Ok(());
        };
        let Value::String(encoded) = encoded else {
            return Err(AgentError::SandboxError(format!(
                "Image result base64_data must be a string, got {}",
                encoded
            )));
        };

        let Some(dir) = &self.local_save_path else {
            object.insert("saved_to_local_path".to_string(), Value::Bool(false));
            return Ok(());
        };

        let format = object
            .get("format")
            .and_then(Value::as_str)
            .unwrap_or("png")
            .to_string();
        let data = base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| AgentError::SandboxError(format!("Invalid base64 image data: {}", e)))?;

        tokio::fs::create_dir_all(dir).await?;
        let file_path = dir.join(format!(
            "{}-{}.{}",
            self.session_id,
            uuid::Uuid::new_v4(),
            format
        ));
        tokio::fs::write(&file_path, data).await?;
        log::info!("Saved sandbox image output to {}", file_path.display());

        object.insert(
            "saved_to_local_path".to_string(),
            Value::String(file_path.to_string_lossy().to_string()),
        );
        Ok(())
    }

    /// Uploads a local file to `/mnt/data/<basename>` in the session.
    ///
    /// An empty result means the service accepted the request but reported
    /// no stored file.
    pub async fn upload_file(&self, local_file_path: &Path) -> Result<Vec<RemoteFileMetadata>, AgentError> {
        let filename = local_file_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| {
                AgentError::ConfigError(format!(
                    "Dataset path {} has no file name",
                    local_file_path.display()
                ))
            })?;

        let data = tokio::fs::read(local_file_path).await.map_err(|e| {
            AgentError::IoError(format!(
                "Failed to read dataset {}: {}",
                local_file_path.display(),
                e
            ))
        })?;

        let part = Part::bytes(data)
            .file_name(format!("{}/{}", REMOTE_DATA_DIR, filename))
            .mime_str("application/octet-stream")
            .map_err(|e| AgentError::SandboxError(format!("Invalid upload part: {}", e)))?;
        let form = Form::new().percent_encode_noop().part("file", part);

        log::info!(
            "Uploading {} to session {}",
            local_file_path.display(),
            self.session_id
        );
        let request = self.client.post(self.build_url("files/upload")).multipart(form);
        let response: FileListResponse = self
            .send(request, "files/upload")
            .await?
            .json()
            .await
            .map_err(|e| AgentError::SandboxError(format!("Invalid upload response: {}", e)))?;

        Ok(response.into_metadata())
    }

    pub async fn list_files(&self) -> Result<Vec<RemoteFileMetadata>, AgentError> {
        let request = self.client.get(self.build_url("files"));
        let response: FileListResponse = self
            .send(request, "files")
            .await?
            .json()
            .await
            .map_err(|e| AgentError::SandboxError(format!("Invalid file list response: {}", e)))?;

        Ok(response.into_metadata())
    }

    /// Downloads a session file, writing it to `local_file_path` when given.
    pub async fn download_file_to_local(
        &self,
        remote_file_path: &str,
        local_file_path: Option<&Path>,
    ) -> Result<Vec<u8>, AgentError> {
        let remote = remote_file_path
            .trim_start_matches(REMOTE_DATA_DIR)
            .trim_start_matches('/');
        let request = self
            .client
            .get(self.build_url(&format!("files/content/{}", remote)));
        let bytes = self
            .send(request, "files/content")
            .await?
            .bytes()
            .await
            .map_err(|e| AgentError::SandboxError(format!("Failed to read file content: {}", e)))?
            .to_vec();

        if let Some(path) = local_file_path {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(path, &bytes).await?;
            log::info!("Downloaded {} to {}", remote_file_path, path.display());
        }
        Ok(bytes)
    }

    /// The agent-facing tools: `code_interpreter` and `list_files`.
    pub fn to_tool_list(self: &Arc<Self>) -> Vec<Arc<dyn Tool>> {
        let code_interpreter: Arc<dyn Tool> = Arc::new(CodeInterpreterTool::new(self.clone()));
        let list_files: Arc<dyn Tool> = Arc::new(ListFilesTool::new(self.clone()));
        vec![code_interpreter, list_files]
    }
}

impl std::fmt::Debug for CodeInterpreterToolSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeInterpreterToolSpec")
            .field("pool_management_endpoint", &self.pool_management_endpoint)
            .field("session_id", &self.session_id)
            .field("local_save_path", &self.local_save_path)
            .finish_non_exhaustive()
    }
}
