//! Agent assembly.
//!
//! Two entry points, each called once per conversation:
//! [`build_chat_agent`] for the general tool-calling agent and
//! [`build_interpreter_agent`] for the ReAct agent bound to a code
//! interpreter session holding the uploaded dataset.

use std::sync::Arc;

use crate::agent::Agent;
use crate::config::EngineConfig;
use crate::errors::AgentError;
use crate::prompts::INTERPRETER_SYSTEM_HEADER;
use crate::rag::{AsQueryEngine, IndexProvider, StorageIndexProvider};
use crate::react::ReActAgent;
use crate::sandbox::{
    token_provider_from_config, AccessTokenProvider, CodeInterpreterToolSpec, RemoteFileMetadata,
};
use crate::settings::Settings;
use crate::tools::{QueryEngineTool, Tool, ToolFactory};

/// What the chat assembler needs besides the configuration.
#[derive(Clone)]
pub struct EngineContext {
    pub settings: Settings,
    pub index_provider: Arc<dyn IndexProvider>,
}

impl EngineContext {
    pub fn new(settings: Settings, index_provider: Arc<dyn IndexProvider>) -> Self {
        Self {
            settings,
            index_provider,
        }
    }

    /// Settings from the configuration and the index persisted under
    /// `config.storage_dir`.
    pub fn from_config(config: &EngineConfig) -> Result<Self, AgentError> {
        Ok(Self {
            settings: Settings::from_config(config)?,
            index_provider: Arc::new(StorageIndexProvider::new(config.storage_dir.clone())),
        })
    }
}

/// The interpreter agent together with the sandbox it drives.
pub struct InterpreterSession {
    pub agent: ReActAgent,
    pub interpreter: Arc<CodeInterpreterToolSpec>,
    pub uploaded: Vec<RemoteFileMetadata>,
}

impl std::fmt::Debug for InterpreterSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterpreterSession")
            .field("session_id", &self.interpreter.session_id())
            .field("uploaded", &self.uploaded)
            .finish_non_exhaustive()
    }
}

/// The `query_engine` tool over the current index, or `None` when no index
/// has been generated.
pub async fn build_retrieval_tool(
    provider: &dyn IndexProvider,
    settings: &Settings,
    top_k: usize,
) -> Result<Option<Arc<dyn Tool>>, AgentError> {
    let Some(index) = provider.get_index().await? else {
        log::info!("No index found, chat agent runs without the query engine tool");
        return Ok(None);
    };

    log::info!(
        "Index with {} nodes loaded, similarity_top_k={}",
        index.len(),
        top_k
    );
    let query_engine = index.as_query_engine(settings, top_k);
    let tool: Arc<dyn Tool> = Arc::new(QueryEngineTool::from_defaults(query_engine));
    Ok(Some(tool))
}

/// The retrieval tool (if any) followed by the configured tools in file order.
pub async fn collect_tools(
    ctx: &EngineContext,
    config: &EngineConfig,
) -> Result<Vec<Arc<dyn Tool>>, AgentError> {
    let mut tools = Vec::new();
    if let Some(tool) =
        build_retrieval_tool(ctx.index_provider.as_ref(), &ctx.settings, config.top_k).await?
    {
        tools.push(tool);
    }
    tools.extend(ToolFactory::from_env(config).await?);
    Ok(tools)
}

pub async fn build_chat_agent(
    config: &EngineConfig,
    ctx: &EngineContext,
) -> Result<Agent, AgentError> {
    let tools = collect_tools(ctx, config).await?;
    log::info!("Building chat agent with {} tools", tools.len());

    Ok(Agent::from_llm(
        ctx.settings.llm.clone(),
        tools,
        config.system_prompt.clone(),
        true,
    ))
}

/// Uploads the dataset into a fresh sandbox session and builds the ReAct
/// agent over it.
pub async fn build_interpreter_agent(
    config: &EngineConfig,
    settings: &Settings,
) -> Result<InterpreterSession, AgentError> {
    build_interpreter_agent_with_token(config, settings, token_provider_from_config(config)).await
}

pub async fn build_interpreter_agent_with_token(
    config: &EngineConfig,
    settings: &Settings,
    token_provider: Arc<dyn AccessTokenProvider>,
) -> Result<InterpreterSession, AgentError> {
    let endpoint = config.require_pool_management_endpoint()?;
    let dataset_path = config.require_dataset_path()?;

    tokio::fs::create_dir_all(&config.visual_output_dir)
        .await
        .map_err(|e| {
            AgentError::IoError(format!(
                "Failed to create {}: {}",
                config.visual_output_dir.display(),
                e
            ))
        })?;

    let interpreter = Arc::new(
        CodeInterpreterToolSpec::new(endpoint, token_provider)?
            .with_local_save_path(config.visual_output_dir.clone()),
    );
    log::info!(
        "Uploading {} to sandbox session {}",
        dataset_path.display(),
        interpreter.session_id()
    );
    let uploaded = interpreter.upload_file(dataset_path).await?;

    let mut agent = ReActAgent::builder()
        .llm(settings.llm.clone())
        .tools(interpreter.to_tool_list())
        .system_header(INTERPRETER_SYSTEM_HEADER)
        .verbose(true)
        .build()?;
    agent.reset();

    if uploaded.is_empty() {
        return Err(AgentError::UploadFailed(format!(
            "Sandbox accepted no files for {}",
            dataset_path.display()
        )));
    }

    log::info!(
        "Interpreter agent ready with {} uploaded file(s)",
        uploaded.len()
    );
    Ok(InterpreterSession {
        agent,
        interpreter,
        uploaded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::{DummyEmbeddingGenerator, EmbeddingGenerator, RagDocument, VectorIndex};
    use crate::sandbox::StaticTokenProvider;
    use crate::test_utils::{ScriptedLLM, StaticIndexProvider};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn settings(llm: Arc<ScriptedLLM>) -> Settings {
        Settings::new(llm, Arc::new(DummyEmbeddingGenerator::with_dimension(8)))
    }

    async fn index() -> VectorIndex {
        let embed = DummyEmbeddingGenerator::with_dimension(8);
        let mut index = VectorIndex::new();
        let content = "Average grade was 72.";
        let embedding = embed.generate_embedding(content).await.unwrap();
        index
            .add_node(
                RagDocument::new(content.to_string(), "grades.txt".to_string()),
                embedding,
            )
            .unwrap();
        index
    }

    fn config_without_tools() -> EngineConfig {
        EngineConfig {
            tools_config_path: PathBuf::from("/nonexistent/tools.yaml"),
            ..EngineConfig::default()
        }
    }

    fn tool_names(tools: &[Arc<dyn Tool>]) -> Vec<String> {
        tools.iter().map(|t| t.metadata().name).collect()
    }

    #[tokio::test]
    async fn test_no_index_no_retrieval_tool() {
        let settings = settings(Arc::new(ScriptedLLM::new(vec![])));
        let tool = build_retrieval_tool(&StaticIndexProvider::absent(), &settings, 3)
            .await
            .unwrap();
        assert!(tool.is_none());
    }

    #[tokio::test]
    async fn test_chat_agent_with_index_and_top_k() {
        let ctx = EngineContext::new(
            settings(Arc::new(ScriptedLLM::new(vec![]))),
            Arc::new(StaticIndexProvider::present(index().await)),
        );
        let config = EngineConfig {
            top_k: 5,
            system_prompt: Some("You are a data analyst.".to_string()),
            ..config_without_tools()
        };

        let agent = build_chat_agent(&config, &ctx).await.unwrap();
        assert_eq!(tool_names(agent.tools()), vec!["query_engine"]);
        assert_eq!(agent.system_prompt(), Some("You are a data analyst."));
        assert!(agent.is_verbose());

        let tool = build_retrieval_tool(ctx.index_provider.as_ref(), &ctx.settings, config.top_k)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tool.metadata().name, "query_engine");
    }

    #[tokio::test]
    async fn test_retrieval_tool_is_bounded_by_top_k() {
        let embed = DummyEmbeddingGenerator::with_dimension(8);
        let mut index = VectorIndex::new();
        for i in 0..6 {
            let content = format!("Section {} of the grades report", i);
            let embedding = embed.generate_embedding(&content).await.unwrap();
            index
                .add_node(RagDocument::new(content, format!("report-{}.md", i)), embedding)
                .unwrap();
        }

        let llm = Arc::new(ScriptedLLM::from_texts(&["answer"]));
        let tool = build_retrieval_tool(&StaticIndexProvider::present(index), &settings(llm.clone()), 5)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            tool.execute(serde_json::json!({"input": "grades"})).await.unwrap(),
            "answer"
        );
        let prompt = llm.recorded_requests()[0][0].content.clone();
        assert_eq!(prompt.matches("source: report-").count(), 5);
    }

    #[tokio::test]
    async fn test_chat_agent_without_index_or_prompt() {
        let ctx = EngineContext::new(
            settings(Arc::new(ScriptedLLM::new(vec![]))),
            Arc::new(StaticIndexProvider::absent()),
        );
        let agent = build_chat_agent(&config_without_tools(), &ctx).await.unwrap();
        assert!(agent.tools().is_empty());
        assert!(agent.system_prompt().is_none());
    }

    #[tokio::test]
    async fn test_retrieval_tool_comes_before_configured_tools() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tools.yaml");
        std::fs::write(&path, "local:\n  web_search: {}\n  calculator: {}\n").unwrap();

        let ctx = EngineContext::new(
            settings(Arc::new(ScriptedLLM::new(vec![]))),
            Arc::new(StaticIndexProvider::present(index().await)),
        );
        let config = EngineConfig {
            tools_config_path: path,
            ..EngineConfig::default()
        };

        let tools = collect_tools(&ctx, &config).await.unwrap();
        assert_eq!(
            tool_names(&tools),
            vec!["query_engine", "web_search", "calculator"]
        );
    }

    #[tokio::test]
    async fn test_no_index_yields_exactly_the_file_tools() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tools.yaml");
        std::fs::write(&path, "local:\n  calculator: {}\n  web_search:\n    provider: duckduckgo\n").unwrap();

        let ctx = EngineContext::new(
            settings(Arc::new(ScriptedLLM::new(vec![]))),
            Arc::new(StaticIndexProvider::absent()),
        );
        let config = EngineConfig {
            tools_config_path: path,
            ..EngineConfig::default()
        };

        let tools = collect_tools(&ctx, &config).await.unwrap();
        assert_eq!(tool_names(&tools), vec!["calculator", "web_search"]);
    }

    #[tokio::test]
    async fn test_top_k_from_environment_bounds_retrieval() {
        let vars: std::collections::HashMap<String, String> = [
            ("TOP_K", "5"),
            ("TOOLS_CONFIG_PATH", "/nonexistent/tools.yaml"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let config = EngineConfig::from_vars(&vars).unwrap();

        let embed = DummyEmbeddingGenerator::with_dimension(8);
        let mut index = VectorIndex::new();
        for i in 0..7 {
            let content = format!("Chapter {} of the enrollment handbook", i);
            let embedding = embed.generate_embedding(&content).await.unwrap();
            index
                .add_node(RagDocument::new(content, format!("handbook-{}.md", i)), embedding)
                .unwrap();
        }

        let llm = Arc::new(ScriptedLLM::from_texts(&["five chapters"]));
        let ctx = EngineContext::new(
            settings(llm.clone()),
            Arc::new(StaticIndexProvider::present(index)),
        );

        let tools = collect_tools(&ctx, &config).await.unwrap();
        assert_eq!(tool_names(&tools), vec!["query_engine"]);
        tools[0]
            .execute(serde_json::json!({"input": "enrollment"}))
            .await
            .unwrap();

        let prompt = llm.recorded_requests()[0][0].content.clone();
        assert_eq!(prompt.matches("source: handbook-").count(), 5);
    }

    #[tokio::test]
    async fn test_bad_tools_file_propagates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tools.yaml");
        std::fs::write(&path, "local:\n  wikipedia: {}\n").unwrap();

        let ctx = EngineContext::new(
            settings(Arc::new(ScriptedLLM::new(vec![]))),
            Arc::new(StaticIndexProvider::absent()),
        );
        let config = EngineConfig {
            tools_config_path: path,
            ..EngineConfig::default()
        };
        assert!(matches!(
            build_chat_agent(&config, &ctx).await,
            Err(AgentError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn test_interpreter_requires_endpoint_and_dataset() {
        let settings = settings(Arc::new(ScriptedLLM::new(vec![])));
        let token: Arc<dyn AccessTokenProvider> = Arc::new(StaticTokenProvider::new("t"));

        let config = EngineConfig {
            dataset_path: Some(PathBuf::from("data/grades.csv")),
            ..EngineConfig::default()
        };
        match build_interpreter_agent_with_token(&config, &settings, token.clone()).await {
            Err(AgentError::ConfigError(message)) => {
                assert!(message.contains("POOL_MANAGEMENT_ENDPOINT"))
            }
            other => panic!("expected config error, got {:?}", other),
        }

        let config = EngineConfig {
            pool_management_endpoint: Some("http://127.0.0.1:9".to_string()),
            ..EngineConfig::default()
        };
        match build_interpreter_agent_with_token(&config, &settings, token).await {
            Err(AgentError::ConfigError(message)) => assert!(message.contains("DATASET_PATH")),
            other => panic!("expected config error, got {:?}", other),
        }
    }
}
