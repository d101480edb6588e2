//! Web search tool backed by DuckDuckGo, Tavily, or Serper.

use crate::errors::AgentError;
use crate::llm::ToolMetadata;
use crate::tools::Tool;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const TOOL_NAME: &str = "web_search";
const DEFAULT_MAX_RESULTS: usize = 5;
const MAX_RESULTS_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchProvider {
    #[default]
    DuckDuckGo,
    Tavily,
    Serper,
}

impl SearchProvider {
    fn default_endpoint(self) -> &'static str {
        match self {
            Self::DuckDuckGo => "https://api.duckduckgo.com/",
            Self::Tavily => "https://api.tavily.com/search",
            Self::Serper => "https://google.serper.dev/search",
        }
    }

    fn requires_api_key(self) -> bool {
        !matches!(self, Self::DuckDuckGo)
    }
}

/// Options accepted under `web_search:` in the tools file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebSearchConfig {
    #[serde(default)]
    pub provider: SearchProvider,
    pub api_key: Option<String>,
    pub max_results: Option<usize>,
    /// Overrides the provider's public endpoint.
    pub endpoint: Option<String>,
}

pub struct WebSearchTool {
    client: Client,
    provider: SearchProvider,
    api_key: Option<String>,
    endpoint: String,
    default_max_results: usize,
}

impl WebSearchTool {
    pub fn new() -> Self {
        Self::build(SearchProvider::DuckDuckGo, None, None, DEFAULT_MAX_RESULTS)
    }

    pub fn from_config(config: &WebSearchConfig) -> Result<Self, AgentError> {
        let api_key = config.api_key.clone().filter(|key| !key.trim().is_empty());
        if config.provider.requires_api_key() && api_key.is_none() {
            return Err(AgentError::ConfigError(format!(
                "web_search provider {:?} requires an api_key",
                config.provider
            )));
        }

        let max_results = config.max_results.unwrap_or(DEFAULT_MAX_RESULTS);
        if max_results == 0 || max_results > MAX_RESULTS_LIMIT {
            return Err(AgentError::ConfigError(format!(
                "web_search max_results must be between 1 and {}",
                MAX_RESULTS_LIMIT
            )));
        }

        Ok(Self::build(
            config.provider,
            api_key,
            config.endpoint.clone(),
            max_results,
        ))
    }

    fn build(
        provider: SearchProvider,
        api_key: Option<String>,
        endpoint: Option<String>,
        default_max_results: usize,
    ) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| Client::new()),
            provider,
            api_key,
            endpoint: endpoint.unwrap_or_else(|| provider.default_endpoint().to_string()),
            default_max_results,
        }
    }

    pub fn provider(&self) -> SearchProvider {
        self.provider
    }

    fn api_key(&self) -> Result<&str, AgentError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| AgentError::tool(TOOL_NAME, format!("{:?} API key not configured", self.provider)))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, AgentError> {
        let response = request.send().await.map_err(|e| {
            AgentError::tool(TOOL_NAME, format!("{:?} request failed: {}", self.provider, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::tool(
                TOOL_NAME,
                format!("{:?} returned {}: {}", self.provider, status, body),
            ));
        }

        response.json().await.map_err(|e| {
            AgentError::tool(TOOL_NAME, format!("Failed to parse {:?} response: {}", self.provider, e))
        })
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>, AgentError> {
        match self.provider {
            SearchProvider::DuckDuckGo => {
                let request = self
                    .client
                    .get(&self.endpoint)
                    .query(&[
                        ("q", query),
                        ("format", "json"),
                        ("no_html", "1"),
                        ("skip_disambig", "1"),
                    ])
                    .header("User-Agent", "datachat/0.1");
                Ok(duckduckgo_results(&self.send(request).await?, max_results))
            }
            SearchProvider::Tavily => {
                let request = self.client.post(&self.endpoint).json(&json!({
                    "api_key": self.api_key()?,
                    "query": query,
                    "search_depth": "basic",
                    "include_answer": true,
                    "max_results": max_results
                }));
                Ok(tavily_results(&self.send(request).await?))
            }
            SearchProvider::Serper => {
                let request = self
                    .client
                    .post(&self.endpoint)
                    .header("X-API-KEY", self.api_key()?)
                    .json(&json!({ "q": query, "num": max_results }));
                Ok(serper_results(&self.send(request).await?))
            }
        }
    }
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

fn non_empty(value: &Value) -> Option<&str> {
    value.as_str().filter(|s| !s.is_empty())
}

fn duckduckgo_results(data: &Value, max_results: usize) -> Vec<String> {
    let mut results = Vec::new();
    if let Some(answer) = non_empty(&data["Answer"]) {
        results.push(format!("Instant Answer: {}", answer));
    }
    if let Some(abstract_text) = non_empty(&data["Abstract"]) {
        results.push(format!("Abstract: {}", abstract_text));
    }

    let remaining = max_results.saturating_sub(results.len());
    if let Some(topics) = data["RelatedTopics"].as_array() {
        let related = topics
            .iter()
            .filter_map(|topic| non_empty(&topic["Text"]))
            .take(remaining)
            .enumerate()
            .map(|(i, text)| format!("Related {}: {}", i + 1, text));
        results.extend(related);
    }
    results
}

fn tavily_results(data: &Value) -> Vec<String> {
    let mut results = Vec::new();
    if let Some(answer) = non_empty(&data["answer"]) {
        results.push(format!("Answer: {}", answer));
    }
    for (i, result) in data["results"].as_array().into_iter().flatten().enumerate() {
        if let (Some(title), Some(content), Some(url)) = (
            result["title"].as_str(),
            result["content"].as_str(),
            result["url"].as_str(),
        ) {
            results.push(format!("Result {}: {}\nContent: {}\nURL: {}", i + 1, title, content, url));
        }
    }
    results
}

fn serper_results(data: &Value) -> Vec<String> {
    let mut results = Vec::new();
    let graph = &data["knowledgeGraph"];
    if let (Some(title), Some(description)) = (graph["title"].as_str(), graph["description"].as_str()) {
        results.push(format!("Knowledge: {} - {}", title, description));
    }
    for (i, result) in data["organic"].as_array().into_iter().flatten().enumerate() {
        if let (Some(title), Some(snippet), Some(link)) = (
            result["title"].as_str(),
            result["snippet"].as_str(),
            result["link"].as_str(),
        ) {
            results.push(format!("Result {}: {}\nSnippet: {}\nURL: {}", i + 1, title, snippet, link));
        }
    }
    results
}

#[async_trait]
impl Tool for WebSearchTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: TOOL_NAME.to_string(),
            description: "Search the web for current information on any topic. Useful for finding recent news, facts, or general information.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query to look up on the web"
                    },
                    "max_results": {
                        "type": "integer",
                        "description": format!("Maximum number of results to return (default: {})", self.default_max_results),
                        "minimum": 1,
                        "maximum": MAX_RESULTS_LIMIT
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<String, AgentError> {
        let query = arguments
            .get("query")
            .and_then(Value::as_str)
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| AgentError::tool(TOOL_NAME, "Missing or invalid 'query' parameter"))?;

        let max_results = arguments
            .get("max_results")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(self.default_max_results);
        if max_results == 0 || max_results > MAX_RESULTS_LIMIT {
            return Err(AgentError::tool(
                TOOL_NAME,
                format!("max_results must be between 1 and {}", MAX_RESULTS_LIMIT),
            ));
        }

        log::info!("Web search ({:?}): '{}' (max_results: {})", self.provider, query, max_results);
        let results = self.search(query, max_results).await?;

        if results.is_empty() {
            Ok(format!("No results found for '{}'", query))
        } else {
            Ok(format!("Search results for '{}':\n\n{}", query, results.join("\n\n")))
        }
    }
}
