use std::sync::Arc;

use tracing::{debug, warn};

use crate::agent::ToolLoop;
use crate::llm::chat::ChatModel;
use crate::llm::messages::ChatMessage;
use crate::memory::SessionStore;
use crate::rag::responder::RagResponder;
use crate::router::{Intent, route};
use crate::tools::calculator::CalculatorTool;
use crate::tools::calendar::CalendarTool;
use crate::tools::documents::DocumentSearchTool;
use crate::tools::weather::WeatherTool;
use crate::tools::web_search::WebSearchTool;
use crate::tools::{RegistryError, SharedTool, ToolRegistry};

const NO_INDEX_TEXT: &str = "Sorry, the internal document index is not configured, \
so I cannot answer from the documents.";

const SMALLTALK_FAILURE_TEXT: &str =
    "Sorry, I could not reach the language model. Please try again.";

/// How questions reach the responders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssistantMode {
    /// Intent router in front: agent loop, retrieval, or plain chat.
    Routed,
    /// Every question goes straight to the tool-calling loop, with
    /// document retrieval registered as one more tool.
    Direct,
}

impl AssistantMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AssistantMode::Routed => "routed",
            AssistantMode::Direct => "direct",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "routed" => Some(Self::Routed),
            "direct" => Some(Self::Direct),
            _ => None,
        }
    }
}

/// Builds the startup tool registry: calculator, weather, web search,
/// calendar, and document search when an index is configured.
pub fn builtin_registry(
    calendar_file: &str,
    responder: Option<Arc<RagResponder>>,
) -> Result<ToolRegistry, RegistryError> {
    let mut tools: Vec<SharedTool> = vec![
        Arc::new(CalculatorTool),
        Arc::new(WeatherTool::new()),
        Arc::new(WebSearchTool::new()),
        Arc::new(CalendarTool::new(calendar_file)),
    ];
    if let Some(responder) = responder {
        tools.push(Arc::new(DocumentSearchTool::new(responder)));
    }
    ToolRegistry::from_tools(tools)
}

/// Front door wiring the router, the tool-calling loop, the retrieval
/// responder, and the session store. One call per user question; the full
/// sequence runs to completion before returning.
pub struct Assistant {
    model: Arc<dyn ChatModel>,
    registry: ToolRegistry,
    responder: Option<Arc<RagResponder>>,
    memory: Arc<dyn SessionStore>,
    mode: AssistantMode,
    max_steps: usize,
}

impl Assistant {
    pub fn new(
        model: Arc<dyn ChatModel>,
        registry: ToolRegistry,
        responder: Option<Arc<RagResponder>>,
        memory: Arc<dyn SessionStore>,
        mode: AssistantMode,
        max_steps: usize,
    ) -> Self {
        Self {
            model,
            registry,
            responder,
            memory,
            mode,
            max_steps,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Answers one user question within the given session. Every produced
    /// message, including tool traffic, is appended to the session history.
    pub async fn respond(&self, session_id: &str, question: &str) -> String {
        let mut history = self.memory.load(session_id);
        let user = ChatMessage::user(question);
        self.memory.append(session_id, user.clone());
        history.push(user);

        let intent = match self.mode {
            AssistantMode::Direct => Intent::Agent,
            AssistantMode::Routed => route(self.model.as_ref(), question).await,
        };
        debug!(intent = intent.as_str(), session_id, "dispatching question");

        match intent {
            Intent::Agent => self.run_agent(session_id, &history).await,
            Intent::Rag => self.run_retrieval(session_id, question).await,
            Intent::Smalltalk => self.run_smalltalk(session_id, &history).await,
        }
    }

    async fn run_agent(&self, session_id: &str, history: &[ChatMessage]) -> String {
        let agent = ToolLoop::new(self.model.as_ref(), &self.registry, self.max_steps);
        let outcome = agent.run(history).await;
        for message in outcome.messages {
            self.memory.append(session_id, message);
        }
        outcome.answer
    }

    async fn run_retrieval(&self, session_id: &str, question: &str) -> String {
        let answer = match &self.responder {
            Some(responder) => responder.answer(question).await,
            None => NO_INDEX_TEXT.to_string(),
        };
        self.memory
            .append(session_id, ChatMessage::assistant(answer.clone(), Vec::new()));
        answer
    }

    async fn run_smalltalk(&self, session_id: &str, history: &[ChatMessage]) -> String {
        let answer = match self.model.complete(history, &[]).await {
            Ok(reply) => reply.content,
            Err(err) => {
                warn!(error = %err, "smalltalk model call failed");
                SMALLTALK_FAILURE_TEXT.to_string()
            }
        };
        self.memory
            .append(session_id, ChatMessage::assistant(answer.clone(), Vec::new()));
        answer
    }
}

#[cfg(test)]
mod tests {
    use super::{Assistant, AssistantMode};
    use crate::agent::DEFAULT_MAX_STEPS;
    use crate::llm::chat::{AssistantReply, ChatModel};
    use crate::llm::messages::{ChatMessage, MessageRole};
    use crate::llm::provider::ProviderError;
    use crate::llm::tools::{ToolCall, ToolDefinition, ToolParam};
    use crate::memory::{InMemorySessionStore, SessionStore};
    use crate::tools::{Tool, ToolRegistry};
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::{Arc, Mutex};

    struct UpperTool;

    #[async_trait]
    impl Tool for UpperTool {
        fn name(&self) -> &str {
            "upper"
        }

        fn description(&self) -> &str {
            "uppercases text"
        }

        fn params(&self) -> Vec<ToolParam> {
            vec![ToolParam::required_string("text", "Text to uppercase.")]
        }

        async fn invoke(&self, args: &Value) -> String {
            args["text"].as_str().unwrap_or("").to_uppercase()
        }
    }

    struct ScriptedModel {
        replies: Mutex<Vec<AssistantReply>>,
        tool_turns: Mutex<Vec<usize>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<AssistantReply>) -> Self {
            Self {
                replies: Mutex::new(replies),
                tool_turns: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(
            &self,
            _messages: &[ChatMessage],
            tools: &[ToolDefinition],
        ) -> Result<AssistantReply, ProviderError> {
            self.tool_turns.lock().unwrap().push(tools.len());
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                return Ok(AssistantReply {
                    content: "fallback".to_string(),
                    tool_calls: Vec::new(),
                    usage: None,
                });
            }
            Ok(replies.remove(0))
        }
    }

    fn final_reply(content: &str) -> AssistantReply {
        AssistantReply {
            content: content.to_string(),
            tool_calls: Vec::new(),
            usage: None,
        }
    }

    fn assistant_with(
        model: ScriptedModel,
        mode: AssistantMode,
    ) -> (Assistant, Arc<InMemorySessionStore>, Arc<ScriptedModel>) {
        let model = Arc::new(model);
        let memory = Arc::new(InMemorySessionStore::new());
        let registry = ToolRegistry::from_tools(vec![Arc::new(UpperTool)]).unwrap();
        let assistant = Assistant::new(
            model.clone(),
            registry,
            None,
            memory.clone(),
            mode,
            DEFAULT_MAX_STEPS,
        );
        (assistant, memory, model)
    }

    #[tokio::test]
    async fn direct_mode_goes_straight_to_the_loop_with_tools() {
        let model = ScriptedModel::new(vec![
            AssistantReply {
                content: String::new(),
                tool_calls: vec![ToolCall {
                    id: "call_1".to_string(),
                    name: "upper".to_string(),
                    args: json!({"text": "hi"}),
                }],
                usage: None,
            },
            final_reply("HI it is"),
        ]);
        let (assistant, memory, model) = assistant_with(model, AssistantMode::Direct);

        let answer = assistant.respond("s1", "uppercase hi please").await;
        assert_eq!(answer, "HI it is");

        // user, assistant(tool call), tool result, assistant(final)
        let history = memory.load("s1");
        assert_eq!(history.len(), 4);
        assert_eq!(history[2].role, MessageRole::Tool);
        assert_eq!(history[2].content, "HI");

        // No routing turn happened; both model turns saw the registry.
        assert_eq!(*model.tool_turns.lock().unwrap(), vec![1, 1]);
    }

    #[tokio::test]
    async fn routed_smalltalk_chats_without_tools() {
        // First scripted reply answers the classification, second the chat.
        let model = ScriptedModel::new(vec![final_reply("SMALLTALK"), final_reply("hello there")]);
        let (assistant, memory, model) = assistant_with(model, AssistantMode::Routed);

        let answer = assistant.respond("s1", "bonjour").await;
        assert_eq!(answer, "hello there");
        assert_eq!(memory.load("s1").len(), 2);

        // Classification turn and chat turn both ran without tools.
        assert_eq!(*model.tool_turns.lock().unwrap(), vec![0, 0]);
    }

    #[tokio::test]
    async fn routed_rag_without_an_index_degrades_to_text() {
        let model = ScriptedModel::new(Vec::new());
        let (assistant, memory, _model) = assistant_with(model, AssistantMode::Routed);

        let answer = assistant
            .respond("s1", "According to the manual, what is the refund policy?")
            .await;
        assert!(answer.contains("not configured"));
        assert_eq!(memory.load("s1").len(), 2);
    }

    #[tokio::test]
    async fn history_persists_across_turns_in_one_session() {
        let model = ScriptedModel::new(vec![
            final_reply("SMALLTALK"),
            final_reply("first answer"),
            final_reply("SMALLTALK"),
            final_reply("second answer"),
        ]);
        let (assistant, memory, _model) = assistant_with(model, AssistantMode::Routed);

        assistant.respond("s1", "hello").await;
        assistant.respond("s1", "and again").await;

        let history = memory.load("s1");
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].content, "hello");
        assert_eq!(history[1].content, "first answer");
        assert_eq!(history[2].content, "and again");
        assert_eq!(history[3].content, "second answer");

        assert!(memory.load("other").is_empty());
    }
}
