// crates/human-relay-mcp/src/tools.rs
// ============================================================================
// Module: Human Relay Tools
// Description: Tool catalog and dispatch into the pending request broker.
// Purpose: Validate tool arguments and translate broker outcomes to results.
// Dependencies: human-relay-core, jsonschema, serde, serde_json
// ============================================================================

//! ## Overview
//! [`ToolRouter`] owns the fixed catalog of human-backed tools. Every call is
//! validated against the tool's input schema and then handed to the
//! [`PendingRequestBroker`], which suspends it until the operator answers or
//! the deadline expires. Operator errors and timeouts surface as tool results
//! flagged with `isError`, not as protocol errors.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use human_relay_core::BrokerError;
use human_relay_core::Outcome;
use human_relay_core::PendingRequestBroker;
use jsonschema::Draft;
use jsonschema::Validator;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// Tool definition used by MCP tool listing.
///
/// # Invariants
/// - `name` is a stable MCP tool identifier.
/// - `input_schema` is a JSON Schema payload for the tool input shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolDefinition {
    /// MCP tool name.
    pub name: String,
    /// Tool description for clients.
    pub description: String,
    /// JSON schema for tool input.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Returns the fixed catalog of human-backed tools.
#[must_use]
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "ask_human".to_string(),
            description: "Ask the human operator a question and wait for their response. Use \
                          this when you need human input, decision-making, or information that \
                          only a human would know."
                .to_string(),
            input_schema: object_schema(
                &[
                    ("question", "The question or request for the human operator"),
                    ("context", "Additional context to help the human understand what you need"),
                ],
                &["question"],
            ),
        },
        ToolDefinition {
            name: "human_search".to_string(),
            description: "Ask the human to search for information. The human will look up the \
                          information and provide their findings."
                .to_string(),
            input_schema: object_schema(
                &[
                    ("query", "What the human should search for"),
                    ("sources", "Suggested sources or where to look (optional)"),
                ],
                &["query"],
            ),
        },
        ToolDefinition {
            name: "human_decision".to_string(),
            description: "Ask the human to make a decision between options. Useful when you need \
                          human judgment or preference."
                .to_string(),
            input_schema: object_schema(
                &[
                    ("decision_needed", "What decision needs to be made"),
                    ("options", "The available options (can be a list or description)"),
                    ("recommendation", "Your recommendation (optional)"),
                ],
                &["decision_needed", "options"],
            ),
        },
    ]
}

/// Builds an object schema whose properties are all strings.
fn object_schema(properties: &[(&str, &str)], required: &[&str]) -> Value {
    let mut props = Map::new();
    for (name, description) in properties {
        props.insert((*name).to_string(), json!({ "type": "string", "description": description }));
    }
    json!({
        "type": "object",
        "properties": props,
        "required": required,
    })
}

// ============================================================================
// SECTION: Results
// ============================================================================

/// Tool output content block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolContent {
    /// Plain text output.
    Text {
        /// Text payload.
        text: String,
    },
}

/// MCP `tools/call` result payload.
///
/// # Invariants
/// - `is_error` is true exactly when the broker outcome was a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolCallResult {
    /// Tool output content.
    pub content: Vec<ToolContent>,
    /// Whether the tool reported a failure.
    #[serde(rename = "isError")]
    pub is_error: bool,
}

impl ToolCallResult {
    /// Returns the first text block, if any.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.content.iter().find_map(|block| match block {
            ToolContent::Text {
                text,
            } => Some(text.as_str()),
        })
    }
}

impl From<Outcome> for ToolCallResult {
    fn from(outcome: Outcome) -> Self {
        let is_error = !outcome.is_success();
        let text = match outcome {
            Outcome::Success {
                text,
            } => text,
            Outcome::Failure {
                message, ..
            } => message,
        };
        Self {
            content: vec![ToolContent::Text {
                text,
            }],
            is_error,
        }
    }
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Catalog entry with its compiled argument validator.
struct RegisteredTool {
    /// Public definition.
    definition: ToolDefinition,
    /// Compiled input schema.
    validator: Validator,
}

/// Tool router dispatching calls into the broker.
///
/// Cloning is cheap; clones share the catalog and the broker.
#[derive(Clone)]
pub struct ToolRouter {
    /// Broker resolving calls.
    broker: PendingRequestBroker,
    /// Registered tools in listing order.
    tools: Arc<[RegisteredTool]>,
}

impl ToolRouter {
    /// Builds a router over the standard tool catalog.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Internal`] when a catalog schema fails to compile.
    pub fn new(broker: PendingRequestBroker) -> Result<Self, ToolError> {
        let tools = tool_definitions()
            .into_iter()
            .map(|definition| {
                let validator = compile_schema(&definition.input_schema)?;
                Ok(RegisteredTool {
                    definition,
                    validator,
                })
            })
            .collect::<Result<Vec<_>, ToolError>>()?;
        Ok(Self {
            broker,
            tools: tools.into(),
        })
    }

    /// Returns the broker behind this router.
    #[must_use]
    pub const fn broker(&self) -> &PendingRequestBroker {
        &self.broker
    }

    /// Lists the tool catalog.
    #[must_use]
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|tool| tool.definition.clone()).collect()
    }

    /// Validates a tool call and waits for the human outcome.
    ///
    /// Missing or `null` arguments are treated as an empty object.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnknownTool`] for names outside the catalog,
    /// [`ToolError::InvalidParams`] when arguments fail validation, and
    /// [`ToolError::Internal`] when the broker cannot register the request.
    pub async fn handle_tool_call(
        &self,
        name: &str,
        arguments: Option<Value>,
    ) -> Result<ToolCallResult, ToolError> {
        let tool = self
            .tools
            .iter()
            .find(|tool| tool.definition.name == name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        let arguments = match arguments {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(_) => {
                return Err(ToolError::InvalidParams("arguments must be an object".to_string()));
            }
        };
        validate_arguments(&tool.validator, &arguments)?;
        let outcome = self
            .broker
            .submit(tool.definition.name.clone(), arguments)
            .await
            .map_err(ToolError::from)?;
        Ok(ToolCallResult::from(outcome))
    }
}

/// Compiles a JSON schema for argument validation.
fn compile_schema(schema: &Value) -> Result<Validator, ToolError> {
    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(schema)
        .map_err(|err| ToolError::Internal(format!("invalid tool schema: {err}")))
}

/// Validates tool arguments against a compiled schema.
fn validate_arguments(validator: &Validator, arguments: &Map<String, Value>) -> Result<(), ToolError> {
    let instance = Value::Object(arguments.clone());
    let messages: Vec<String> = validator.iter_errors(&instance).map(|err| err.to_string()).collect();
    if messages.is_empty() {
        Ok(())
    } else {
        Err(ToolError::InvalidParams(messages.join("; ")))
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Tool dispatch errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    /// Tool name not recognized.
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    /// Arguments failed validation.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),
    /// Result serialization failed.
    #[error("serialization failure")]
    Serialization,
    /// Broker or catalog failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<BrokerError> for ToolError {
    fn from(error: BrokerError) -> Self {
        Self::Internal(error.to_string())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
