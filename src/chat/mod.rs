//! Chat engine: the turn state machine, response generation, and the
//! tool-resolution loop.
//!
//! A `Chat` owns its message history and exactly one adapter. Turns strictly
//! alternate starting with a user turn; the derived status tells the caller
//! whether the chat is waiting for a user prompt (`Pending`), a chatbot
//! response (`Ready`), or is settled (`Complete`).

pub mod message;

pub use message::{ChatMessage, Role, ToolArgs, ToolResult, ToolUse};

use std::sync::Arc;

use crate::error::{ChatError, Result};
use crate::events::MessageDelta;
use crate::llm::{ChatRequest, Llm};
use crate::tool::Tool;

/// Derived chat lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatStatus {
    /// No turns yet.
    Pending,
    /// Last turn is a user turn; a chatbot response is expected.
    Ready,
    /// Last turn is a chatbot turn.
    Complete,
}

/// Observer of appended turns. Invoked synchronously, in registration order,
/// on the calling task.
pub type MessageHandler = Arc<dyn Fn(&ChatMessage, &Chat) + Send + Sync>;

/// Observer of streamed content fragments for the in-flight chatbot turn.
pub type DeltaHandler = Arc<dyn Fn(&MessageDelta, &Chat) + Send + Sync>;

/// Optional observers supplied at construction time.
#[derive(Default, Clone)]
pub struct ChatEventHandlers {
    pub on_message: Option<MessageHandler>,
    pub on_message_delta: Option<DeltaHandler>,
}

/// Construction parameters for [`Chat`].
pub struct ChatParams {
    pub llm: Arc<dyn Llm>,
    pub system: Option<String>,
    /// Seed user turn appended at construction.
    pub prompt: Option<String>,
    pub tools: Vec<Arc<dyn Tool>>,
    /// See [`crate::config::Config::max_tool_rounds`].
    pub max_tool_rounds: Option<usize>,
    pub handlers: ChatEventHandlers,
}

impl ChatParams {
    pub fn new(llm: Arc<dyn Llm>) -> Self {
        Self {
            llm,
            system: None,
            prompt: None,
            tools: Vec::new(),
            max_tool_rounds: None,
            handlers: ChatEventHandlers::default(),
        }
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }
}

/// One conversation with a model backend.
pub struct Chat {
    llm: Arc<dyn Llm>,
    system: Option<String>,
    messages: Vec<ChatMessage>,
    tools: Vec<Arc<dyn Tool>>,
    max_tool_rounds: Option<usize>,
    message_handlers: Vec<MessageHandler>,
    delta_handlers: Vec<DeltaHandler>,
}

impl std::fmt::Debug for Chat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chat")
            .field("status", &self.status())
            .field("system", &self.system)
            .field("messages", &self.messages)
            .finish_non_exhaustive()
    }
}

impl Chat {
    pub fn new(params: ChatParams) -> Self {
        let mut chat = Self {
            llm: params.llm,
            system: params.system,
            messages: Vec::new(),
            tools: params.tools,
            max_tool_rounds: params.max_tool_rounds,
            message_handlers: Vec::new(),
            delta_handlers: Vec::new(),
        };

        // Handlers attach before the seed turn so they observe it.
        if let Some(handler) = params.handlers.on_message {
            chat.message_handlers.push(handler);
        }
        if let Some(handler) = params.handlers.on_message_delta {
            chat.delta_handlers.push(handler);
        }
        if let Some(prompt) = params.prompt {
            chat.push_and_notify(ChatMessage::user(prompt));
        }
        chat
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn status(&self) -> ChatStatus {
        match self.messages.last() {
            None => ChatStatus::Pending,
            Some(m) if m.role() == Role::User => ChatStatus::Ready,
            Some(_) => ChatStatus::Complete,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn system(&self) -> Option<&str> {
        self.system.as_deref()
    }

    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    /// Content of the first (seed) user turn.
    pub fn input(&self) -> Result<&str> {
        match self.messages.first() {
            Some(m) => Ok(m.content()),
            None => Err(ChatError::NoMessages.into()),
        }
    }

    /// Content of the final chatbot turn.
    pub fn output(&self) -> Result<&str> {
        if self.status() != ChatStatus::Complete {
            return Err(ChatError::NotComplete.into());
        }
        match self.messages.last() {
            Some(m) => Ok(m.content()),
            None => Err(ChatError::NoMessages.into()),
        }
    }

    // ── Observers ───────────────────────────────────────────────────

    pub fn on_message(&mut self, handler: impl Fn(&ChatMessage, &Chat) + Send + Sync + 'static) {
        self.message_handlers.push(Arc::new(handler));
    }

    pub fn on_message_delta(
        &mut self,
        handler: impl Fn(&MessageDelta, &Chat) + Send + Sync + 'static,
    ) {
        self.delta_handlers.push(Arc::new(handler));
    }

    // ── State machine ───────────────────────────────────────────────

    /// Append a turn, enforcing strict alternation. On error the chat is
    /// left unmodified.
    pub fn add_message(&mut self, message: ChatMessage) -> Result<()> {
        match (message.role(), self.status()) {
            (Role::User, ChatStatus::Ready) => {
                return Err(ChatError::InvalidTurnOrder {
                    expected: Role::Chatbot,
                }
                .into());
            }
            (Role::Chatbot, status) if status != ChatStatus::Ready => {
                return Err(ChatError::InvalidTurnOrder {
                    expected: Role::User,
                }
                .into());
            }
            _ => {}
        }
        self.push_and_notify(message);
        Ok(())
    }

    fn push_and_notify(&mut self, message: ChatMessage) {
        self.messages.push(message);
        let handlers = self.message_handlers.clone();
        let this: &Chat = &*self;
        if let Some(appended) = this.messages.last() {
            for handler in &handlers {
                handler(appended, this);
            }
        }
    }

    /// Drive the adapter to produce the next chatbot turn and append it.
    ///
    /// This is the engine's only suspension point besides tool invocation:
    /// the request itself, and consumption of the adapter's event stream.
    pub async fn generate_next_message(&mut self) -> Result<()> {
        if self.status() != ChatStatus::Ready {
            return Err(ChatError::NotReady.into());
        }

        let request = ChatRequest {
            system: self.system.clone(),
            messages: self.messages.clone(),
            tools: self.tools.clone(),
        };
        // The position the completed turn will occupy.
        let index = self.messages.len();
        let llm = Arc::clone(&self.llm);
        let handlers = self.delta_handlers.clone();
        let this: &Chat = &*self;
        let message = llm
            .generate_next_message(request, &|delta| {
                let delta = MessageDelta {
                    text: delta.text,
                    snapshot: delta.snapshot,
                    index,
                };
                for handler in &handlers {
                    handler(&delta, this);
                }
            })
            .await?;
        self.add_message(message)
    }

    /// Resolve tool-use requests until the chat settles on a turn with none.
    ///
    /// Each round invokes the requested tools strictly in the order the
    /// model emitted them, appends one user turn carrying the results, and
    /// generates the next chatbot turn. A round bound, when configured,
    /// turns a backend that never stops requesting tools into an error
    /// instead of an endless loop.
    pub async fn handle_tool_use(&mut self) -> Result<()> {
        if self.status() != ChatStatus::Complete {
            return Err(ChatError::NotComplete.into());
        }

        let mut rounds = 0usize;
        loop {
            let tool_uses = match self.messages.last() {
                Some(m) if !m.tool_uses().is_empty() => m.tool_uses().to_vec(),
                _ => return Ok(()),
            };
            if let Some(max) = self.max_tool_rounds
                && rounds >= max
            {
                return Err(ChatError::ToolLoopExceeded { rounds }.into());
            }
            rounds += 1;

            let mut results = Vec::with_capacity(tool_uses.len());
            for tool_use in &tool_uses {
                let tool = self
                    .tools
                    .iter()
                    .find(|t| t.name() == tool_use.name)
                    .cloned();
                match tool {
                    Some(tool) => {
                        let output = tool.invoke(tool_use.input.clone()).await?;
                        results.push(ToolResult {
                            id: tool_use.id.clone(),
                            name: tool_use.name.clone(),
                            output,
                        });
                    }
                    None => {
                        tracing::warn!(
                            tool = %tool_use.name,
                            "skipping tool call: tool not available in this chat"
                        );
                    }
                }
            }

            self.add_message(ChatMessage::tool_results(results))?;
            self.generate_next_message().await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::error::{Error, ToolError};
    use crate::llm::testing::ScriptedLlm;
    use crate::tool::{ParamKind, SimpleTool, require_arg};

    fn sum_tool() -> Arc<dyn Tool> {
        Arc::new(
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
                }),
        )
    }

    fn sum_use(a: &str, b: &str) -> ToolUse {
        ToolUse {
            id: Some("toolu_1".into()),
            name: "sum".into(),
            input: ToolArgs::from([
                ("a".to_string(), a.to_string()),
                ("b".to_string(), b.to_string()),
            ]),
        }
    }

    #[test]
    fn status_follows_last_turn() {
        let mut chat = Chat::new(ChatParams::new(ScriptedLlm::new([])));
        assert_eq!(chat.status(), ChatStatus::Pending);
        chat.add_message(ChatMessage::user("a")).unwrap();
        assert_eq!(chat.status(), ChatStatus::Ready);
        chat.add_message(ChatMessage::chatbot("b")).unwrap();
        assert_eq!(chat.status(), ChatStatus::Complete);
    }

    #[test]
    fn add_message_enforces_alternation() {
        let mut chat = Chat::new(ChatParams::new(ScriptedLlm::new([])));

        // A chatbot turn can never come first.
        let err = chat.add_message(ChatMessage::chatbot("x")).unwrap_err();
        assert!(matches!(
            err,
            Error::Chat(ChatError::InvalidTurnOrder {
                expected: Role::User
            })
        ));
        assert!(chat.messages().is_empty());

        chat.add_message(ChatMessage::user("first")).unwrap();
        let err = chat.add_message(ChatMessage::user("again")).unwrap_err();
        assert!(matches!(
            err,
            Error::Chat(ChatError::InvalidTurnOrder {
                expected: Role::Chatbot
            })
        ));
        assert_eq!(chat.messages().len(), 1);

        chat.add_message(ChatMessage::chatbot("reply")).unwrap();
        let err = chat.add_message(ChatMessage::chatbot("more")).unwrap_err();
        assert!(matches!(err, Error::Chat(ChatError::InvalidTurnOrder { .. })));
        assert_eq!(chat.messages().len(), 2);
    }

    #[test]
    fn input_and_output_accessors() {
        let mut chat = Chat::new(ChatParams::new(ScriptedLlm::new([])));
        assert!(chat.input().is_err());

        chat.add_message(ChatMessage::user("a")).unwrap();
        assert_eq!(chat.input().unwrap(), "a");
        assert!(matches!(
            chat.output().unwrap_err(),
            Error::Chat(ChatError::NotComplete)
        ));

        chat.add_message(ChatMessage::chatbot("b")).unwrap();
        assert_eq!(chat.output().unwrap(), "b");
    }

    #[test]
    fn seed_prompt_notifies_observers() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let mut params = ChatParams::new(ScriptedLlm::new([])).prompt("hello");
        params.handlers.on_message = Some(Arc::new(move |_m, _c| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        let chat = Chat::new(params);
        assert_eq!(chat.messages().len(), 1);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn generate_appends_chatbot_turn() {
        let llm = ScriptedLlm::new([ChatMessage::chatbot("Hello")]);
        let mut chat = Chat::new(ChatParams::new(llm).prompt("Write one word."));
        chat.generate_next_message().await.unwrap();
        assert_eq!(chat.messages().len(), 2);
        assert_eq!(chat.output().unwrap(), "Hello");
    }

    #[tokio::test]
    async fn generate_requires_ready() {
        let llm = ScriptedLlm::new([ChatMessage::chatbot("Hello")]);
        let mut chat = Chat::new(ChatParams::new(llm));
        let err = chat.generate_next_message().await.unwrap_err();
        assert!(matches!(err, Error::Chat(ChatError::NotReady)));
    }

    #[tokio::test]
    async fn streaming_deltas_precede_message_and_index_correctly() {
        // "HelloHelloHello" = 15 chars → 3 five-char fragments.
        let llm = ScriptedLlm::streaming(5, [ChatMessage::chatbot("HelloHelloHello")]);
        let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

        let mut params = ChatParams::new(llm).prompt("go");
        let deltas = Arc::clone(&log);
        params.handlers.on_message_delta = Some(Arc::new(move |d, _c| {
            deltas
                .lock()
                .unwrap()
                .push(format!("delta:{}:{}:{}", d.index, d.text, d.snapshot));
        }));
        let messages = Arc::clone(&log);
        params.handlers.on_message = Some(Arc::new(move |m, _c| {
            messages.lock().unwrap().push(format!("message:{}", m.content()));
        }));

        let mut chat = Chat::new(params);
        chat.generate_next_message().await.unwrap();

        let log = log.lock().unwrap().clone();
        assert_eq!(
            log,
            vec![
                "message:go",
                "delta:1:Hello:Hello",
                "delta:1:Hello:HelloHello",
                "delta:1:Hello:HelloHelloHello",
                "message:HelloHelloHello",
            ]
        );
        assert_eq!(chat.output().unwrap(), "HelloHelloHello");
    }

    #[tokio::test]
    async fn tool_round_trip() {
        let llm = ScriptedLlm::new([ChatMessage::chatbot("The sum is 5.")]);
        let mut chat = Chat::new(ChatParams::new(llm).tool(sum_tool()));
        chat.add_message(ChatMessage::user("What is 2 + 3?")).unwrap();
        chat.add_message(ChatMessage::chatbot_with_tools("", vec![sum_use("2", "3")]))
            .unwrap();

        chat.handle_tool_use().await.unwrap();

        assert_eq!(chat.messages().len(), 4);
        match &chat.messages()[2] {
            ChatMessage::User { content, tools } => {
                assert_eq!(content, "");
                assert_eq!(tools.len(), 1);
                assert_eq!(tools[0].id.as_deref(), Some("toolu_1"));
                assert_eq!(tools[0].name, "sum");
                assert_eq!(tools[0].output, "5");
            }
            other => panic!("expected user turn with tool results, got {other:?}"),
        }
        assert_eq!(chat.output().unwrap(), "The sum is 5.");
    }

    #[tokio::test]
    async fn handle_tool_use_noop_without_tool_calls() {
        let mut chat = Chat::new(ChatParams::new(ScriptedLlm::new([])));
        chat.add_message(ChatMessage::user("hi")).unwrap();
        chat.add_message(ChatMessage::chatbot("hello")).unwrap();

        chat.handle_tool_use().await.unwrap();
        assert_eq!(chat.messages().len(), 2);
        // Idempotent: a second pass is still a no-op.
        chat.handle_tool_use().await.unwrap();
        assert_eq!(chat.messages().len(), 2);
    }

    #[tokio::test]
    async fn handle_tool_use_requires_complete() {
        let mut chat = Chat::new(ChatParams::new(ScriptedLlm::new([])));
        chat.add_message(ChatMessage::user("hi")).unwrap();
        let err = chat.handle_tool_use().await.unwrap_err();
        assert!(matches!(err, Error::Chat(ChatError::NotComplete)));
    }

    #[tokio::test]
    async fn missing_tool_is_skipped_not_fatal() {
        let llm = ScriptedLlm::new([ChatMessage::chatbot("done")]);
        let mut chat = Chat::new(ChatParams::new(llm));
        chat.add_message(ChatMessage::user("go")).unwrap();
        chat.add_message(ChatMessage::chatbot_with_tools(
            "",
            vec![ToolUse {
                id: None,
                name: "nonexistent".into(),
                input: ToolArgs::new(),
            }],
        ))
        .unwrap();

        chat.handle_tool_use().await.unwrap();

        // The round still produced a (result-free) user turn and a reply.
        assert_eq!(chat.messages().len(), 4);
        match &chat.messages()[2] {
            ChatMessage::User { tools, .. } => assert!(tools.is_empty()),
            other => panic!("expected user turn, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn two_tool_calls_resolve_in_emission_order() {
        // "slow" sleeps; if calls ran concurrently and results were gathered
        // on completion, "fast" would finish first. Order must follow the
        // model's emission order regardless.
        let slow: Arc<dyn Tool> = Arc::new(
            SimpleTool::builder("slow", "slow echo").async_handler(|_args| async {
                tokio::time::sleep(Duration::from_millis(30)).await;
                Ok("slow-out".to_string())
            }),
        );
        let fast: Arc<dyn Tool> = Arc::new(
            SimpleTool::builder("fast", "fast echo")
                .handler(|_args| Ok("fast-out".to_string())),
        );

        let llm = ScriptedLlm::new([ChatMessage::chatbot("done")]);
        let mut chat = Chat::new(ChatParams::new(llm).tool(slow).tool(fast));
        chat.add_message(ChatMessage::user("go")).unwrap();
        chat.add_message(ChatMessage::chatbot_with_tools(
            "",
            vec![
                ToolUse {
                    id: Some("1".into()),
                    name: "slow".into(),
                    input: ToolArgs::new(),
                },
                ToolUse {
                    id: Some("2".into()),
                    name: "fast".into(),
                    input: ToolArgs::new(),
                },
            ],
        ))
        .unwrap();

        chat.handle_tool_use().await.unwrap();

        match &chat.messages()[2] {
            ChatMessage::User { tools, .. } => {
                let outputs: Vec<&str> = tools.iter().map(|r| r.output.as_str()).collect();
                assert_eq!(outputs, vec!["slow-out", "fast-out"]);
            }
            other => panic!("expected user turn, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn bounded_tool_loop_reports_exceeded() {
        // Every scripted reply requests the tool again.
        let looping = || ChatMessage::chatbot_with_tools("", vec![sum_use("1", "1")]);
        let llm = ScriptedLlm::new([looping(), looping(), looping()]);
        let mut params = ChatParams::new(llm).tool(sum_tool());
        params.max_tool_rounds = Some(2);
        let mut chat = Chat::new(params);
        chat.add_message(ChatMessage::user("go")).unwrap();
        chat.add_message(ChatMessage::chatbot_with_tools("", vec![sum_use("1", "1")]))
            .unwrap();

        let err = chat.handle_tool_use().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Chat(ChatError::ToolLoopExceeded { rounds: 2 })
        ));
    }

    #[tokio::test]
    async fn multi_round_tool_resolution_converges() {
        let llm = ScriptedLlm::new([
            // Round one: ask for another sum.
            ChatMessage::chatbot_with_tools("", vec![sum_use("5", "7")]),
            // Round two: settle.
            ChatMessage::chatbot("The answer is 12."),
        ]);
        let mut chat = Chat::new(ChatParams::new(llm).tool(sum_tool()));
        chat.add_message(ChatMessage::user("go")).unwrap();
        chat.add_message(ChatMessage::chatbot_with_tools("", vec![sum_use("2", "3")]))
            .unwrap();

        chat.handle_tool_use().await.unwrap();
        // seed + bot + results + bot + results + bot
        assert_eq!(chat.messages().len(), 6);
        assert_eq!(chat.output().unwrap(), "The answer is 12.");
    }
}
