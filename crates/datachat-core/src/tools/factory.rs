//! Tools declared in the tools configuration file.
//!
//! ```yaml
//! local:
//!   calculator: {}
//!   web_search:
//!     provider: tavily
//!     api_key: tvly-...
//!   interpreter:
//!     pool_management_endpoint: https://...
//! ```

use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::path::Path;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::errors::AgentError;
use crate::sandbox::{token_provider_from_config, CodeInterpreterToolSpec};
use crate::tools::web_search::{WebSearchConfig, WebSearchTool};
use crate::tools::{CalculatorTool, Tool};

#[derive(Debug, Default, Deserialize)]
struct ToolsFile {
    #[serde(default)]
    local: Option<Mapping>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct InterpreterToolConfig {
    pool_management_endpoint: Option<String>,
}

pub struct ToolFactory;

impl ToolFactory {
    /// Tools from the file at `config.tools_config_path`.
    pub async fn from_env(config: &EngineConfig) -> Result<Vec<Arc<dyn Tool>>, AgentError> {
        Self::from_config_file(&config.tools_config_path, config).await
    }

    /// Tools in file order. A missing file declares no tools.
    pub async fn from_config_file(
        path: &Path,
        config: &EngineConfig,
    ) -> Result<Vec<Arc<dyn Tool>>, AgentError> {
        if !path.exists() {
            log::debug!("No tools file at {}, no extra tools loaded", path.display());
            return Ok(Vec::new());
        }

        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            AgentError::ConfigError(format!(
                "Failed to read tools file {}: {}",
                path.display(),
                e
            ))
        })?;

        let tools = Self::from_yaml(&content, config)?;
        log::info!("Loaded {} tools from {}", tools.len(), path.display());
        Ok(tools)
    }

    pub fn from_yaml(content: &str, config: &EngineConfig) -> Result<Vec<Arc<dyn Tool>>, AgentError> {
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        let file: Option<ToolsFile> = serde_yaml::from_str(content)
            .map_err(|e| AgentError::ConfigError(format!("Invalid tools file: {}", e)))?;

        let Some(local) = file.and_then(|f| f.local) else {
            return Ok(Vec::new());
        };

        let mut tools = Vec::new();
        for (name, options) in local {
            let name = name.as_str().ok_or_else(|| {
                AgentError::ConfigError(format!("Tool names must be strings, got {:?}", name))
            })?;
            tools.extend(Self::create_tool(name, options, config)?);
        }
        Ok(tools)
    }

    fn create_tool(
        name: &str,
        options: Value,
        config: &EngineConfig,
    ) -> Result<Vec<Arc<dyn Tool>>, AgentError> {
        match name {
            "calculator" => {
                let tool: Arc<dyn Tool> = Arc::new(CalculatorTool::new());
                Ok(vec![tool])
            }
            "web_search" => {
                let options: WebSearchConfig = parse_options(name, options)?;
                let tool: Arc<dyn Tool> = Arc::new(WebSearchTool::from_config(&options)?);
                Ok(vec![tool])
            }
            "interpreter" => {
                let options: InterpreterToolConfig = parse_options(name, options)?;
                let endpoint = match options.pool_management_endpoint {
                    Some(endpoint) => endpoint,
                    None => config.require_pool_management_endpoint()?.to_string(),
                };
                let spec = CodeInterpreterToolSpec::new(endpoint, token_provider_from_config(config))?
                    .with_local_save_path(config.visual_output_dir.clone());
                Ok(Arc::new(spec).to_tool_list())
            }
            other => Err(AgentError::ConfigError(format!(
                "Unknown tool '{}' in tools file. Supported tools: calculator, web_search, interpreter",
                other
            ))),
        }
    }
}

fn parse_options<T>(name: &str, options: Value) -> Result<T, AgentError>
where
    T: for<'de> Deserialize<'de> + Default,
{
    if options.is_null() {
        return Ok(T::default());
    }
    serde_yaml::from_value(options)
        .map_err(|e| AgentError::ConfigError(format!("Invalid options for tool '{}': {}", name, e)))
}
