use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::errors::AgentError;
use crate::llm::ToolMetadata;
use crate::sandbox::CodeInterpreterToolSpec;
use crate::tools::Tool;

pub const CODE_INTERPRETER_TOOL: &str = "code_interpreter";
pub const LIST_FILES_TOOL: &str = "list_files";

pub struct CodeInterpreterTool {
    spec: Arc<CodeInterpreterToolSpec>,
}

impl CodeInterpreterTool {
    pub fn new(spec: Arc<CodeInterpreterToolSpec>) -> Self {
        Self { spec }
    }
}

#[async_trait]
impl Tool for CodeInterpreterTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: CODE_INTERPRETER_TOOL.to_string(),
            description: "code_interpreter(python_code: str) -> dict\nThis tool is used to execute python commands when you need to perform calculations or computations in a Session. Input should be a valid python command. The tool returns the result, stdout, and stderr. Uploaded files are available under /mnt/data/.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "python_code": {
                        "type": "string",
                        "description": "Python code to be executed"
                    }
                },
                "required": ["python_code"]
            }),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<String, AgentError> {
        let code = match &arguments {
            Value::String(code) => code.as_str(),
            _ => arguments
                .get("python_code")
                .or_else(|| arguments.get("input"))
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    AgentError::tool(CODE_INTERPRETER_TOOL, "Missing or invalid 'python_code' parameter")
                })?,
        };

        let properties = self
            .spec
            .code_interpreter(code)
            .await
            .map_err(|e| AgentError::tool(CODE_INTERPRETER_TOOL, e.to_string()))?;
        Ok(properties.to_string())
    }
}

pub struct ListFilesTool {
    spec: Arc<CodeInterpreterToolSpec>,
}

impl ListFilesTool {
    pub fn new(spec: Arc<CodeInterpreterToolSpec>) -> Self {
        Self { spec }
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: LIST_FILES_TOOL.to_string(),
            description: "list_files() -> list\nList the files available in a Session, with their sizes in bytes.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
        }
    }

    async fn execute(&self, _arguments: Value) -> Result<String, AgentError> {
        let files = self
            .spec
            .list_files()
            .await
            .map_err(|e| AgentError::tool(LIST_FILES_TOOL, e.to_string()))?;

        let listing: Vec<Value> = files
            .iter()
            .map(|file| {
                json!({
                    "filename": file.filename,
                    "full_path": file.full_path(),
                    "size_in_bytes": file.size_in_bytes,
                })
            })
            .collect();
        Ok(Value::Array(listing).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::StaticTokenProvider;

    #[test]
    fn test_tool_list_names() {
        let spec = Arc::new(
            CodeInterpreterToolSpec::new("http://localhost:1", Arc::new(StaticTokenProvider::new("t")))
                .unwrap(),
        );
        let names: Vec<String> = spec
            .to_tool_list()
            .iter()
            .map(|tool| tool.metadata().name)
            .collect();
        assert_eq!(names, vec![CODE_INTERPRETER_TOOL, LIST_FILES_TOOL]);
    }

    #[tokio::test]
    async fn test_code_interpreter_requires_code() {
        let spec = Arc::new(
            CodeInterpreterToolSpec::new("http://localhost:1", Arc::new(StaticTokenProvider::new("t")))
                .unwrap(),
        );
        let tool = CodeInterpreterTool::new(spec);
        let err = tool.execute(json!({"code": 1})).await.unwrap_err();
        assert!(matches!(err, AgentError::ToolError { .. }));
    }
}
