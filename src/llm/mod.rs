//! Model adapter contract and streaming accumulation.
//!
//! Backends implement [`LlmAdapter`] over their native event and response
//! types; the chat engine consumes the object-safe [`Llm`] boundary, which is
//! blanket-implemented for every adapter. Vendor wire protocols live outside
//! this crate.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;

use crate::chat::message::ChatMessage;
use crate::error::LlmError;
use crate::events::ContentDelta;
use crate::tool::Tool;

/// One generation request: system instruction, full turn history, tool set.
#[derive(Clone)]
pub struct ChatRequest {
    pub system: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<Arc<dyn Tool>>,
}

/// Reply from [`LlmAdapter::issue_request`]: either a complete backend
/// response, or a sequence of partial events to accumulate.
pub enum LlmReply<E, R> {
    Complete(R),
    Stream(BoxStream<'static, Result<E, LlmError>>),
}

/// Backend capability contract.
///
/// Accumulation is sequential and stateful per in-flight request:
/// `accumulate` is called once per stream element, strictly in arrival
/// order, with no concurrent overlap.
#[async_trait]
pub trait LlmAdapter: Send + Sync + 'static {
    /// Backend-native partial event.
    type Event: Send;
    /// Backend-native response; `Default` is the empty partial response.
    type Response: Default + Send;

    async fn issue_request(
        &self,
        request: &ChatRequest,
    ) -> Result<LlmReply<Self::Event, Self::Response>, LlmError>;

    /// Fold one partial event into the response so far, returning any text
    /// fragment it carried.
    fn accumulate(&self, event: Self::Event, response: &mut Self::Response) -> Option<String>;

    /// Turn a completed response into a chatbot turn. A stream that ended
    /// without producing a consistent response surfaces `InvalidResponse`
    /// here; the engine treats that as fatal and does not retry.
    fn extract_message(&self, response: Self::Response) -> Result<ChatMessage, LlmError>;
}

/// Sink for content deltas produced while a response streams in.
pub type DeltaSink<'a> = &'a (dyn Fn(ContentDelta) + Send + Sync);

/// Object-safe boundary the chat engine drives.
#[async_trait]
pub trait Llm: Send + Sync {
    async fn generate_next_message(
        &self,
        request: ChatRequest,
        on_delta: DeltaSink<'_>,
    ) -> Result<ChatMessage, LlmError>;
}

#[async_trait]
impl<A: LlmAdapter> Llm for A {
    async fn generate_next_message(
        &self,
        request: ChatRequest,
        on_delta: DeltaSink<'_>,
    ) -> Result<ChatMessage, LlmError> {
        let response = match self.issue_request(&request).await? {
            LlmReply::Complete(response) => response,
            LlmReply::Stream(mut events) => {
                let mut response = A::Response::default();
                let mut snapshot = String::new();
                while let Some(event) = events.next().await {
                    if let Some(text) = self.accumulate(event?, &mut response)
                        && !text.is_empty()
                    {
                        snapshot.push_str(&text);
                        on_delta(ContentDelta {
                            text,
                            snapshot: snapshot.clone(),
                        });
                    }
                }
                response
            }
        };
        self.extract_message(response)
    }
}
