//! Error types for shiftwork.

use crate::chat::message::Role;

/// Top-level error type for the crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Chat error: {0}")]
    Chat(#[from] ChatError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Shift error: {0}")]
    Shift(#[from] ShiftError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Chat engine errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("Invalid turn order: expecting a {expected} message")]
    InvalidTurnOrder { expected: Role },

    #[error("Chat is not ready (last turn must be a user turn)")]
    NotReady,

    #[error("Chat is not complete (last turn must be a chatbot turn)")]
    NotComplete,

    #[error("Chat has no messages")]
    NoMessages,

    #[error("Tool resolution did not converge after {rounds} rounds")]
    ToolLoopExceeded { rounds: usize },
}

/// Model adapter errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Adapter {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Tool invocation errors.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Tool {name} not found")]
    NotFound { name: String },

    #[error("Tool {name} execution failed: {reason}")]
    ExecutionFailed { name: String, reason: String },

    #[error("Invalid parameters for tool {name}: {reason}")]
    InvalidParameters { name: String, reason: String },
}

/// Job execution errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum JobError {
    #[error("Job has no executions")]
    NoExecutions,

    #[error("Chore {name} not defined")]
    ChoreNotDefined { name: String },

    #[error("Worker {name} not defined")]
    WorkerNotDefined { name: String },
}

/// Shift registry errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ShiftError {
    #[error("Duplicate {kind} name: {name}")]
    DuplicateName { kind: &'static str, name: String },

    #[error("Job {name} not defined")]
    JobNotDefined { name: String },

    #[error("Chore {name} not defined")]
    ChoreNotDefined { name: String },
}

/// Configuration errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No model adapter available: neither the chore, its worker, nor the config supplies one")]
    NoDefaultAdapter,
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
