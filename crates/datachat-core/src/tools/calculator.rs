//! Arithmetic tool for quick numeric checks during a conversation.

use crate::errors::AgentError;
use crate::llm::ToolMetadata;
use crate::tools::Tool;
use async_trait::async_trait;
use serde_json::{json, Value};

const TOOL_NAME: &str = "calculator";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
    Sqrt,
    Percent,
}

impl Operation {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "add" => Self::Add,
            "subtract" => Self::Subtract,
            "multiply" => Self::Multiply,
            "divide" => Self::Divide,
            "power" => Self::Power,
            "sqrt" => Self::Sqrt,
            "percent" => Self::Percent,
            _ => return None,
        })
    }

    fn is_unary(self) -> bool {
        matches!(self, Self::Sqrt)
    }
}

#[derive(Default)]
pub struct CalculatorTool;

impl CalculatorTool {
    pub fn new() -> Self {
        Self
    }
}

fn operand(arguments: &Value, key: &str, operation: &str) -> Result<f64, AgentError> {
    arguments.get(key).and_then(Value::as_f64).ok_or_else(|| {
        AgentError::tool(
            TOOL_NAME,
            format!("Missing or invalid parameter '{}' for {}", key, operation),
        )
    })
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        format!("{}", value as i64)
    } else {
        format!("{:.6}", value)
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    }
}

#[async_trait]
impl Tool for CalculatorTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: TOOL_NAME.to_string(),
            description: "Performs arithmetic: add, subtract, multiply, divide, power, sqrt, and percent (a as a percentage of b)".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "operation": {
                        "type": "string",
                        "enum": ["add", "subtract", "multiply", "divide", "power", "sqrt", "percent"],
                        "description": "The arithmetic operation to perform"
                    },
                    "a": {
                        "type": "number",
                        "description": "The first number"
                    },
                    "b": {
                        "type": "number",
                        "description": "The second number (not required for sqrt)"
                    }
                },
                "required": ["operation", "a"]
            }),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<String, AgentError> {
        let name = arguments
            .get("operation")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::tool(TOOL_NAME, "Missing or invalid 'operation' parameter"))?;
        let operation = Operation::parse(name)
            .ok_or_else(|| AgentError::tool(TOOL_NAME, format!("Unknown operation: {}", name)))?;

        let a = operand(&arguments, "a", name)?;
        let b = if operation.is_unary() {
            0.0
        } else {
            operand(&arguments, "b", name)?
        };

        let result = match operation {
            Operation::Add => a + b,
            Operation::Subtract => a - b,
            Operation::Multiply => a * b,
            Operation::Divide | Operation::Percent if b == 0.0 => {
                return Err(AgentError::tool(TOOL_NAME, "Division by zero is not allowed"));
            }
            Operation::Divide => a / b,
            Operation::Percent => a / b * 100.0,
            Operation::Power => a.powf(b),
            Operation::Sqrt if a < 0.0 => {
                return Err(AgentError::tool(
                    TOOL_NAME,
                    "Cannot calculate square root of negative number",
                ));
            }
            Operation::Sqrt => a.sqrt(),
        };

        if !result.is_finite() {
            return Err(AgentError::tool(TOOL_NAME, "Result is not a finite number"));
        }

        let formatted = format_number(result);
        log::debug!("Calculator: {} {} {} = {}", a, name, b, formatted);
        Ok(formatted)
    }
}
