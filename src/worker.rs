//! Worker personas.
//!
//! A worker is a reusable persona: a role, a goal, an optional backstory,
//! plus default tools and an optional default adapter. Chores executed under
//! a worker inherit its rendered system instruction and defaults.

use std::sync::Arc;

use crate::llm::Llm;
use crate::tool::Tool;

/// A reusable persona supplying a system instruction and defaults.
#[derive(Clone)]
pub struct Worker {
    pub role: String,
    pub goal: String,
    pub story: Option<String>,
    pub tools: Vec<Arc<dyn Tool>>,
    pub llm: Option<Arc<dyn Llm>>,
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("role", &self.role)
            .field("goal", &self.goal)
            .field("story", &self.story)
            .finish_non_exhaustive()
    }
}

impl Worker {
    pub fn new(role: impl Into<String>, goal: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            goal: goal.into(),
            story: None,
            tools: Vec::new(),
            llm: None,
        }
    }

    pub fn story(mut self, story: impl Into<String>) -> Self {
        self.story = Some(story.into());
        self
    }

    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn llm(mut self, llm: Arc<dyn Llm>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Render the system instruction for chats run under this persona.
    pub fn prompt(&self) -> String {
        let mut out = format!("Your role is {}.\n", self.role);
        if let Some(story) = &self.story {
            out.push_str(story);
            out.push('\n');
        }
        out.push_str(&format!("\nYour personal goal: {}", self.goal));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_with_defaults() {
        let worker = Worker::new("a", "b");
        assert_eq!(worker.role, "a");
        assert_eq!(worker.goal, "b");
        assert!(worker.story.is_none());
        assert!(worker.tools.is_empty());
        assert!(worker.llm.is_none());
    }

    #[test]
    fn prompt_without_story() {
        let worker = Worker::new("a", "b");
        assert_eq!(worker.prompt(), "Your role is a.\n\nYour personal goal: b");
    }

    #[test]
    fn prompt_with_story() {
        let worker = Worker::new("a", "b").story("c");
        assert_eq!(worker.prompt(), "Your role is a.\nc\n\nYour personal goal: b");
    }
}
