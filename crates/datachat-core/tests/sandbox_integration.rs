//! Sandbox client and interpreter assembler against an in-process mock of the
//! session pool API.

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{Path as UrlPath, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine as _;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::net::TcpListener;

use datachat_core::config::EngineConfig;
use datachat_core::core_types::{LLMResponse, Message};
use datachat_core::engine::build_interpreter_agent_with_token;
use datachat_core::errors::AgentError;
use datachat_core::llm::{ToolMetadata, LLM};
use datachat_core::rag::DummyEmbeddingGenerator;
use datachat_core::sandbox::{AccessTokenProvider, CodeInterpreterToolSpec, StaticTokenProvider};
use datachat_core::settings::Settings;

const TOKEN: &str = "test-token";

#[derive(Debug, Clone)]
struct RecordedRequest {
    path: String,
    query: HashMap<String, String>,
    authorization: Option<String>,
    body: Vec<u8>,
}

#[derive(Clone)]
struct SandboxState {
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    accept_uploads: bool,
}

impl SandboxState {
    fn record(&self, path: &str, query: HashMap<String, String>, headers: &HeaderMap, body: &[u8]) {
        self.requests.lock().unwrap().push(RecordedRequest {
            path: path.to_string(),
            query,
            authorization: headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            body: body.to_vec(),
        });
    }
}

fn file_entry(filename: &str, size: u64) -> Value {
    json!({"properties": {"filename": filename, "size": size}})
}

async fn upload_handler(
    State(state): State<SandboxState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Value> {
    state.record("files/upload", query, &headers, &body);
    if state.accept_uploads {
        Json(json!({"value": [file_entry("grades.csv", 42)]}))
    } else {
        Json(json!({"value": []}))
    }
}

async fn list_handler(
    State(state): State<SandboxState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Json<Value> {
    state.record("files", query, &headers, &[]);
    Json(json!({"value": [file_entry("grades.csv", 42), {"id": "no-properties"}]}))
}

async fn execute_handler(
    State(state): State<SandboxState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Json<Value> {
    state.record("code/execute", query, &headers, payload.to_string().as_bytes());
    let code = payload["properties"]["code"].as_str().unwrap_or_default();

    if code.contains("plt.") {
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"png-bytes");
        Json(json!({
            "properties": {
                "status": "Success",
                "stdout": "",
                "stderr": "",
                "result": {"type": "image", "format": "png", "base64_data": encoded}
            }
        }))
    } else {
        Json(json!({
            "properties": {"status": "Success", "stdout": "72.0\n", "stderr": "", "result": null}
        }))
    }
}

async fn content_handler(
    State(state): State<SandboxState>,
    UrlPath(name): UrlPath<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Vec<u8>, StatusCode> {
    state.record(&format!("files/content/{}", name), query, &headers, &[]);
    if name == "grades.csv" {
        Ok(b"name,grade\nada,72\n".to_vec())
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

struct MockSandbox {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockSandbox {
    async fn start(accept_uploads: bool) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let state = SandboxState {
            requests: Arc::new(Mutex::new(Vec::new())),
            accept_uploads,
        };
        let requests = state.requests.clone();

        let app = Router::new()
            .route("/files/upload", post(upload_handler))
            .route("/files", get(list_handler))
            .route("/files/content/{name}", get(content_handler))
            .route("/code/execute", post(execute_handler))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, requests }
    }

    fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

struct ScriptedModel {
    responses: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedModel {
    fn new(texts: &[&str]) -> Self {
        Self {
            responses: Mutex::new(texts.iter().map(|t| t.to_string()).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl LLM for ScriptedModel {
    async fn generate(
        &self,
        messages: Vec<Message>,
        _tools: Option<Vec<ToolMetadata>>,
    ) -> Result<LLMResponse, AgentError> {
        self.requests.lock().unwrap().push(messages);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .map(LLMResponse::text)
            .ok_or_else(|| AgentError::LLMError("No scripted responses left".to_string()))
    }
}

fn token() -> Arc<dyn AccessTokenProvider> {
    Arc::new(StaticTokenProvider::new(TOKEN))
}

fn dataset(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("grades.csv");
    std::fs::write(&path, "name,grade\nada,72\n").unwrap();
    path
}

fn interpreter_config(sandbox: &MockSandbox, dir: &TempDir) -> EngineConfig {
    EngineConfig {
        pool_management_endpoint: Some(sandbox.endpoint()),
        dataset_path: Some(dataset(dir)),
        visual_output_dir: dir.path().join("visual_outputs"),
        ..EngineConfig::default()
    }
}

#[tokio::test]
async fn test_requests_carry_identifier_and_token() {
    let sandbox = MockSandbox::start(true).await;
    let dir = TempDir::new().unwrap();
    let spec = CodeInterpreterToolSpec::new(sandbox.endpoint(), token())
        .unwrap()
        .with_session_id("session one");

    let uploaded = spec.upload_file(&dataset(&dir)).await.unwrap();
    assert_eq!(uploaded.len(), 1);
    assert_eq!(uploaded[0].filename, "grades.csv");
    assert_eq!(uploaded[0].size_in_bytes, 42);
    assert_eq!(uploaded[0].full_path(), "/mnt/data/grades.csv");

    let listed = spec.list_files().await.unwrap();
    assert_eq!(listed.len(), 1);

    let requests = sandbox.requests();
    assert_eq!(requests.len(), 2);
    for request in &requests {
        assert_eq!(request.query.get("identifier").map(String::as_str), Some("session one"));
        assert_eq!(
            request.query.get("api-version").map(String::as_str),
            Some("2024-02-02-preview")
        );
        assert_eq!(request.authorization.as_deref(), Some("Bearer test-token"));
    }

    let upload_body = String::from_utf8_lossy(&requests[0].body);
    assert!(upload_body.contains("name=\"file\""));
    assert!(upload_body.contains("grades.csv"));
}

#[tokio::test]
async fn test_code_execution_saves_images() {
    let sandbox = MockSandbox::start(true).await;
    let dir = TempDir::new().unwrap();
    let save_dir = dir.path().join("visual_outputs");
    let spec = CodeInterpreterToolSpec::new(sandbox.endpoint(), token())
        .unwrap()
        .with_session_id("s1")
        .with_local_save_path(save_dir.clone());

    let properties = spec
        .code_interpreter("```python\nimport matplotlib.pyplot as plt\nplt.plot([1, 2])\n```")
        .await
        .unwrap();

    let result = &properties["result"];
    assert!(result.get("base64_data").is_none());
    let saved = PathBuf::from(result["saved_to_local_path"].as_str().unwrap());
    assert!(saved.starts_with(&save_dir));
    assert!(saved.file_name().unwrap().to_string_lossy().starts_with("s1-"));
    assert_eq!(std::fs::read(&saved).unwrap(), b"png-bytes");

    let payload: Value =
        serde_json::from_slice(&sandbox.requests()[0].body).unwrap();
    assert_eq!(payload["properties"]["codeInputType"], "inline");
    assert_eq!(payload["properties"]["executionType"], "synchronous");
    assert_eq!(
        payload["properties"]["code"],
        "import matplotlib.pyplot as plt\nplt.plot([1, 2])"
    );
}

#[tokio::test]
async fn test_download_file() {
    let sandbox = MockSandbox::start(true).await;
    let dir = TempDir::new().unwrap();
    let spec = CodeInterpreterToolSpec::new(sandbox.endpoint(), token()).unwrap();
    let target = dir.path().join("out").join("grades.csv");

    let bytes = spec
        .download_file_to_local("/mnt/data/grades.csv", Some(&target))
        .await
        .unwrap();
    assert_eq!(bytes, b"name,grade\nada,72\n");
    assert_eq!(std::fs::read(&target).unwrap(), bytes);

    let missing = spec.download_file_to_local("nope.csv", None).await;
    assert!(matches!(missing, Err(AgentError::SandboxError(_))));
}

#[tokio::test]
async fn test_interpreter_agent_runs_code() {
    let sandbox = MockSandbox::start(true).await;
    let dir = TempDir::new().unwrap();
    let config = interpreter_config(&sandbox, &dir);
    let model = Arc::new(ScriptedModel::new(&[
        "Thought: I need to compute the mean.\nAction: code_interpreter\nAction Input: {\"python_code\": \"import pandas as pd\\nprint(pd.read_csv('/mnt/data/grades.csv').grade.mean())\"}",
        "Thought: I can answer without using any more tools.\nAnswer: The average grade is 72.",
    ]));
    let settings = Settings::new(model.clone(), Arc::new(DummyEmbeddingGenerator::new()));

    let mut session = build_interpreter_agent_with_token(&config, &settings, token())
        .await
        .unwrap();
    assert_eq!(session.uploaded.len(), 1);
    assert!(config.visual_output_dir.is_dir());
    assert!(session.agent.is_verbose());
    assert_eq!(session.agent.memory_len(), 0);
    assert_eq!(
        session.interpreter.local_save_path(),
        Some(config.visual_output_dir.as_path())
    );

    let tool_names: Vec<String> = session
        .agent
        .tools()
        .iter()
        .map(|t| t.metadata().name)
        .collect();
    assert_eq!(tool_names, vec!["code_interpreter", "list_files"]);

    let answer = session.agent.chat("What is the average grade?").await.unwrap();
    assert_eq!(answer, "The average grade is 72.");

    let requests = model.requests.lock().unwrap().clone();
    let header = &requests[0][0].content;
    assert!(header.contains("Sorry, I cannot answer your query."));
    assert!(header.contains("> Tool Name: code_interpreter"));
    assert!(requests[1].last().unwrap().content.contains("72.0"));

    let executed = sandbox
        .requests()
        .into_iter()
        .filter(|r| r.path == "code/execute")
        .count();
    assert_eq!(executed, 1);
}

#[tokio::test]
async fn test_empty_upload_is_upload_failed() {
    let sandbox = MockSandbox::start(false).await;
    let dir = TempDir::new().unwrap();
    let config = interpreter_config(&sandbox, &dir);
    let settings = Settings::new(
        Arc::new(ScriptedModel::new(&[])),
        Arc::new(DummyEmbeddingGenerator::new()),
    );

    let result = build_interpreter_agent_with_token(&config, &settings, token()).await;
    assert!(matches!(result, Err(AgentError::UploadFailed(_))));
}

#[tokio::test]
async fn test_unreachable_sandbox_is_sandbox_error() {
    let dir = TempDir::new().unwrap();
    let config = EngineConfig {
        pool_management_endpoint: Some("http://127.0.0.1:9".to_string()),
        dataset_path: Some(dataset(&dir)),
        visual_output_dir: dir.path().join("visual_outputs"),
        ..EngineConfig::default()
    };
    let settings = Settings::new(
        Arc::new(ScriptedModel::new(&[])),
        Arc::new(DummyEmbeddingGenerator::new()),
    );

    let result = build_interpreter_agent_with_token(&config, &settings, token()).await;
    assert!(matches!(result, Err(AgentError::SandboxError(_))));
}
