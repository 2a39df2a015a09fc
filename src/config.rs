//! Engine configuration.

use std::fmt;
use std::sync::Arc;

use crate::llm::Llm;

/// Configuration threaded through `Shift` and `Chore::exec`.
///
/// An explicit value owned by the caller; there is no process-global
/// default, so tests and tenants never share adapter state.
#[derive(Clone, Default)]
pub struct Config {
    /// Adapter used when neither a chore nor its worker supplies one.
    pub default_llm: Option<Arc<dyn Llm>>,
    /// Upper bound on tool-resolution rounds per chat. `None` means
    /// unbounded, matching a backend that eventually stops requesting tools.
    pub max_tool_rounds: Option<usize>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_llm(mut self, llm: Arc<dyn Llm>) -> Self {
        self.default_llm = Some(llm);
        self
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = Some(rounds);
        self
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("default_llm", &self.default_llm.is_some())
            .field("max_tool_rounds", &self.max_tool_rounds)
            .finish()
    }
}
