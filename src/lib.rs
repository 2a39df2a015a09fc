//! shiftwork — a multi-turn chat engine with tool resolution, composed
//! into chores, jobs, and shifts.
//!
//! The chat engine owns one conversation: it enforces turn alternation,
//! drives a pluggable model adapter (with streaming accumulation) to
//! produce chatbot turns, and resolves model-requested tool invocations
//! until the conversation settles. Chores wrap single tasks around the
//! engine, jobs chain chore executions on an append-only tape, and a
//! shift is the name-keyed registry that starts jobs.

pub mod chat;
pub mod chore;
pub mod config;
pub mod error;
pub mod events;
pub mod job;
pub mod llm;
pub mod shift;
pub mod tool;
pub mod worker;
