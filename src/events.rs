//! Notification payloads published while a chat generates a response.

/// An incremental content fragment emitted by a model adapter, before the
/// engine knows which turn position it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDelta {
    /// The new fragment of text.
    pub text: String,
    /// Everything accumulated so far, including `text`.
    pub snapshot: String,
}

/// A chat-level delta: the fragment plus the index the in-flight turn will
/// occupy once complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDelta {
    pub text: String,
    pub snapshot: String,
    pub index: usize,
}
