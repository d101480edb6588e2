//! Parser for Thought / Action / Action Input / Answer model output.

use regex::Regex;
use serde_json::{json, Value};
use std::sync::OnceLock;

use crate::errors::AgentError;

const IMPLICIT_THOUGHT: &str = "(Implicit) I can answer without any more tools!";

#[derive(Debug, Clone, PartialEq)]
pub enum ReasoningStep {
    Action {
        thought: String,
        action: String,
        action_input: Value,
    },
    Response {
        thought: String,
        response: String,
    },
}

fn action_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)(?:\s*Thought:(.*?)|(.+?))\n+Action:\s*([^\n\(\) ]+).*?\n+Action Input:(.*)")
            .expect("valid regex")
    })
}

fn answer_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\s*Thought:(.*?)Answer:(.*)$").expect("valid regex"))
}

/// Parses one model turn.
///
/// Output without a `Thought:` is taken as an implicit final answer. An
/// `Action:` takes priority over an `Answer:` in the same output.
pub fn parse_reasoning(output: &str) -> Result<ReasoningStep, AgentError> {
    if !output.contains("Thought:") {
        return Ok(ReasoningStep::Response {
            thought: IMPLICIT_THOUGHT.to_string(),
            response: output.trim().to_string(),
        });
    }

    if output.contains("Action:") {
        return parse_action(output);
    }

    if output.contains("Answer:") {
        let captures = answer_regex().captures(output).ok_or_else(|| {
            AgentError::ParsingError(format!("Could not extract final answer from: {}", output))
        })?;
        return Ok(ReasoningStep::Response {
            thought: captures[1].trim().to_string(),
            response: captures[2].trim().to_string(),
        });
    }

    Err(AgentError::ParsingError(format!(
        "Could not parse output: {}",
        output
    )))
}

fn parse_action(output: &str) -> Result<ReasoningStep, AgentError> {
    let captures = action_regex().captures(output).ok_or_else(|| {
        AgentError::ParsingError(format!(
            "Could not extract tool use from input text: {}",
            output
        ))
    })?;

    let thought = captures
        .get(1)
        .or_else(|| captures.get(2))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();
    let action = captures[3].trim().to_string();
    // A hallucinated observation after the input is not part of it.
    let input = captures[4].split("\nObservation:").next().unwrap_or_default();
    let action_input = parse_action_input(input.trim())?;

    Ok(ReasoningStep::Action {
        thought,
        action,
        action_input,
    })
}

/// The first JSON object in the input, then the same with Python-style
/// single-quoted strings converted, then any `"key": "value"` pairs, and
/// finally a bare string wrapped as `{"input": ...}`. Text after the object
/// is ignored.
fn parse_action_input(raw: &str) -> Result<Value, AgentError> {
    let raw = raw.trim_matches('`').trim();
    let Some(start) = raw.find('{') else {
        if raw.is_empty() {
            return Err(AgentError::ParsingError("Empty Action Input".to_string()));
        }
        return Ok(json!({ "input": raw }));
    };
    let candidate = &raw[start..];

    if let Some(value) = first_json_value(candidate) {
        return Ok(value);
    }

    let normalized = double_quote_strings(candidate);
    if let Some(value) = first_json_value(&normalized) {
        return Ok(value);
    }

    let pairs = key_value_pairs(&normalized);
    if !pairs.is_empty() {
        return Ok(Value::Object(pairs));
    }

    Err(AgentError::ParsingError(format!(
        "Invalid JSON in Action Input: {}",
        candidate
    )))
}

fn first_json_value(input: &str) -> Option<Value> {
    serde_json::Deserializer::from_str(input)
        .into_iter::<Value>()
        .next()
        .and_then(Result::ok)
}

/// Rewrites single-quoted string literals as double-quoted ones, leaving
/// apostrophes inside double-quoted strings alone.
fn double_quote_strings(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                out.push('"');
                while let Some(c) = chars.next() {
                    out.push(c);
                    if c == '\\' {
                        if let Some(escaped) = chars.next() {
                            out.push(escaped);
                        }
                    } else if c == '"' {
                        break;
                    }
                }
            }
            '\'' => {
                out.push('"');
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => match chars.next() {
                            Some('\'') => out.push('\''),
                            Some(escaped) => {
                                out.push('\\');
                                out.push(escaped);
                            }
                            None => out.push('\\'),
                        },
                        '"' => out.push_str("\\\""),
                        '\'' => break,
                        c => out.push(c),
                    }
                }
                out.push('"');
            }
            c => out.push(c),
        }
    }
    out
}

fn key_value_pairs(input: &str) -> serde_json::Map<String, Value> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r#""(\w+)":\s*"((?:[^"\\]|\\.)*)""#).expect("valid regex")
    });
    re.captures_iter(input)
        .map(|caps| {
            let value = serde_json::from_str::<String>(&format!("\"{}\"", &caps[2]))
                .unwrap_or_else(|_| caps[2].to_string());
            (caps[1].to_string(), Value::String(value))
        })
        .collect()
}
