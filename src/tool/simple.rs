//! Closure-backed tool definitions.
//!
//! Most tools are a name, a schema, and a function. `SimpleTool` packages
//! those without requiring a dedicated struct per tool.

use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;

use crate::chat::message::ToolArgs;
use crate::error::ToolError;
use crate::tool::{ParamKind, Tool, ToolParam, ToolSchema};

type Handler = Arc<dyn Fn(ToolArgs) -> BoxFuture<'static, Result<String, ToolError>> + Send + Sync>;

/// A tool built from a closure.
pub struct SimpleTool {
    name: String,
    description: String,
    params: ToolSchema,
    handler: Handler,
}

impl SimpleTool {
    pub fn builder(name: impl Into<String>, description: impl Into<String>) -> SimpleToolBuilder {
        SimpleToolBuilder {
            name: name.into(),
            description: description.into(),
            params: ToolSchema::new(),
        }
    }
}

#[async_trait]
impl Tool for SimpleTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> ToolSchema {
        self.params.clone()
    }

    async fn invoke(&self, args: ToolArgs) -> Result<String, ToolError> {
        (self.handler)(args).await
    }
}

/// Builder for [`SimpleTool`].
pub struct SimpleToolBuilder {
    name: String,
    description: String,
    params: ToolSchema,
}

impl SimpleToolBuilder {
    /// Declare a parameter.
    pub fn param(
        mut self,
        name: impl Into<String>,
        kind: ParamKind,
        description: impl Into<String>,
    ) -> Self {
        self.params.insert(
            name.into(),
            ToolParam {
                kind,
                description: description.into(),
            },
        );
        self
    }

    /// Finish with a synchronous handler.
    pub fn handler<F>(self, f: F) -> SimpleTool
    where
        F: Fn(ToolArgs) -> Result<String, ToolError> + Send + Sync + 'static,
    {
        self.build(move |args| {
            let out = f(args);
            async move { out }.boxed()
        })
    }

    /// Finish with an asynchronous handler.
    pub fn async_handler<F, Fut>(self, f: F) -> SimpleTool
    where
        F: Fn(ToolArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, ToolError>> + Send + 'static,
    {
        self.build(move |args| f(args).boxed())
    }

    fn build<F>(self, f: F) -> SimpleTool
    where
        F: Fn(ToolArgs) -> BoxFuture<'static, Result<String, ToolError>> + Send + Sync + 'static,
    {
        SimpleTool {
            name: self.name,
            description: self.description,
            params: self.params,
            handler: Arc::new(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::require_arg;

    fn sum_tool() -> SimpleTool {
        SimpleTool::builder("sum", "returns the sum of the two input numbers")
            .param("a", ParamKind::Number, "first input number")
            .param("b", ParamKind::Number, "second input number")
            .handler(|args| {
                let a: i64 = require_arg(&args, "a", "sum")?.parse().map_err(|e| {
                    ToolError::InvalidParameters {
                        name: "sum".into(),
                        reason: format!("a: {e}"),
                    }
                })?;
                let b: i64 = require_arg(&args, "b", "sum")?.parse().map_err(|e| {
                    ToolError::InvalidParameters {
                        name: "sum".into(),
                        reason: format!("b: {e}"),
                    }
                })?;
                Ok((a + b).to_string())
            })
    }

    #[tokio::test]
    async fn sync_handler_invokes() {
        let tool = sum_tool();
        assert_eq!(tool.name(), "sum");
        assert_eq!(tool.parameters().len(), 2);

        let args = ToolArgs::from([
            ("a".to_string(), "2".to_string()),
            ("b".to_string(), "3".to_string()),
        ]);
        assert_eq!(tool.invoke(args).await.unwrap(), "5");
    }

    #[tokio::test]
    async fn async_handler_invokes() {
        let tool = SimpleTool::builder("date", "returns a fixed date")
            .async_handler(|_args| async { Ok("2024-05-13".to_string()) });
        assert_eq!(tool.invoke(ToolArgs::new()).await.unwrap(), "2024-05-13");
    }

    #[tokio::test]
    async fn handler_errors_propagate() {
        let tool = sum_tool();
        let err = tool.invoke(ToolArgs::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameters { .. }));
    }
}
