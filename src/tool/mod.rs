//! Tool capability contract.
//!
//! A tool is a named, described, schema-typed capability the model can
//! request during a chat. Schemas are advisory: the engine forwards the
//! model's arguments as-is and leaves validation to the tool itself.

pub mod simple;

pub use simple::SimpleTool;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::chat::message::ToolArgs;
use crate::error::ToolError;

/// Declared kind of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Number,
}

/// One declared parameter of a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolParam {
    #[serde(rename = "type")]
    pub kind: ParamKind,
    pub description: String,
}

/// Ordered parameter schema, keyed by parameter name.
pub type ToolSchema = BTreeMap<String, ToolParam>;

/// A capability the model can invoke during a chat.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters(&self) -> ToolSchema;

    /// Invoke the tool. Invoked at most once per tool-call entry per
    /// resolution round; failures propagate to the chat's caller.
    async fn invoke(&self, args: ToolArgs) -> Result<String, ToolError>;
}

/// Fetch a required argument, or fail with `InvalidParameters`.
pub fn require_arg<'a>(args: &'a ToolArgs, name: &str, tool: &str) -> Result<&'a str, ToolError> {
    args.get(name)
        .map(String::as_str)
        .ok_or_else(|| ToolError::InvalidParameters {
            name: tool.to_string(),
            reason: format!("missing required argument: {name}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_arg_present_and_missing() {
        let args = ToolArgs::from([("a".to_string(), "2".to_string())]);
        assert_eq!(require_arg(&args, "a", "sum").unwrap(), "2");

        let err = require_arg(&args, "b", "sum").unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameters { .. }));
        assert!(err.to_string().contains("missing required argument: b"));
    }

    #[test]
    fn param_kind_serializes_lowercase() {
        let param = ToolParam {
            kind: ParamKind::Number,
            description: "first input number".into(),
        };
        let json = serde_json::to_value(&param).unwrap();
        assert_eq!(json["type"], "number");
    }
}
