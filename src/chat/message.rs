//! Conversation turn data model.
//!
//! A chat is an alternating sequence of user and chatbot turns. Chatbot turns
//! may carry tool-use requests; the following user turn carries the matching
//! tool results.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Arguments passed to a tool invocation, keyed by parameter name.
pub type ToolArgs = BTreeMap<String, String>;

/// Author of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Chatbot,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Chatbot => write!(f, "chatbot"),
        }
    }
}

/// A chatbot request to invoke a named tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolUse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub input: ToolArgs,
}

/// The recorded output of one tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub output: String,
}

/// One turn in a chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ChatMessage {
    User {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tools: Vec<ToolResult>,
    },
    Chatbot {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tools: Vec<ToolUse>,
    },
}

impl ChatMessage {
    /// A plain user turn.
    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage::User {
            content: content.into(),
            tools: Vec::new(),
        }
    }

    /// A plain chatbot turn.
    pub fn chatbot(content: impl Into<String>) -> Self {
        ChatMessage::Chatbot {
            content: content.into(),
            tools: Vec::new(),
        }
    }

    /// A chatbot turn that requests tool invocations.
    pub fn chatbot_with_tools(content: impl Into<String>, tools: Vec<ToolUse>) -> Self {
        ChatMessage::Chatbot {
            content: content.into(),
            tools,
        }
    }

    /// A user turn carrying tool results (content is empty by convention).
    pub fn tool_results(tools: Vec<ToolResult>) -> Self {
        ChatMessage::User {
            content: String::new(),
            tools,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            ChatMessage::User { .. } => Role::User,
            ChatMessage::Chatbot { .. } => Role::Chatbot,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            ChatMessage::User { content, .. } | ChatMessage::Chatbot { content, .. } => content,
        }
    }

    /// Tool-use requests carried by a chatbot turn, empty for user turns.
    pub fn tool_uses(&self) -> &[ToolUse] {
        match self {
            ChatMessage::Chatbot { tools, .. } => tools,
            ChatMessage::User { .. } => &[],
        }
    }
}
