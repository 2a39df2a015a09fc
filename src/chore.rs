//! Chores: single task specifications driving one chat to completion.

use std::sync::Arc;

use crate::chat::{Chat, ChatEventHandlers, ChatParams};
use crate::config::Config;
use crate::error::{ConfigError, Result};
use crate::llm::Llm;
use crate::tool::Tool;
use crate::worker::Worker;

/// A single task specification. Immutable; each `exec` produces a fresh
/// chat which is returned to the caller, never retained.
#[derive(Clone)]
pub struct Chore {
    pub task: String,
    /// Hint describing the expected shape of the final answer.
    pub output: Option<String>,
    pub context: Option<String>,
    pub tools: Vec<Arc<dyn Tool>>,
    pub worker: Option<Worker>,
    /// Adapter override; the worker's adapter wins when both are present.
    pub llm: Option<Arc<dyn Llm>>,
}

impl Chore {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            output: None,
            context: None,
            tools: Vec::new(),
            worker: None,
            llm: None,
        }
    }

    pub fn output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn worker(mut self, worker: Worker) -> Self {
        self.worker = Some(worker);
        self
    }

    pub fn llm(mut self, llm: Arc<dyn Llm>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Render the seed user prompt: the task, then the context block, then
    /// the expected-output block, separated by blank lines.
    pub fn prompt(&self) -> String {
        let mut chunks = vec![self.task.clone()];
        if let Some(context) = &self.context {
            chunks.push(format!(
                "This is the context you're working with:\n{context}"
            ));
        }
        if let Some(output) = &self.output {
            chunks.push(format!(
                "This is the expected output for your final answer: {output}"
            ));
        }
        chunks.join("\n\n")
    }

    /// Build a chat and drive it to completion: one generated response,
    /// then tool resolution until no requests remain. Engine failures
    /// propagate; nothing is retried here.
    pub async fn exec(&self, config: &Config, handlers: ChatEventHandlers) -> Result<Chat> {
        let llm = self
            .worker
            .as_ref()
            .and_then(|w| w.llm.clone())
            .or_else(|| self.llm.clone())
            .or_else(|| config.default_llm.clone())
            .ok_or(ConfigError::NoDefaultAdapter)?;

        let mut tools = self
            .worker
            .as_ref()
            .map(|w| w.tools.clone())
            .unwrap_or_default();
        tools.extend(self.tools.iter().cloned());

        let mut chat = Chat::new(ChatParams {
            llm,
            system: self.worker.as_ref().map(Worker::prompt),
            prompt: Some(self.prompt()),
            tools,
            max_tool_rounds: config.max_tool_rounds,
            handlers,
        });

        chat.generate_next_message().await?;
        chat.handle_tool_use().await?;
        Ok(chat)
    }
}
