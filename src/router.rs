use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::llm::chat::ChatModel;
use crate::llm::messages::ChatMessage;

/// Where a question should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Tool-calling agent loop.
    Agent,
    /// Grounded document retrieval.
    Rag,
    /// Plain chat with no tools.
    Smalltalk,
}

impl Intent {
    pub fn as_str(self) -> &'static str {
        match self {
            Intent::Agent => "agent",
            Intent::Rag => "rag",
            Intent::Smalltalk => "smalltalk",
        }
    }
}

// Arithmetic shapes and weather/web vocabulary, French and English forms.
const AGENT_PATTERN: &str = r"(?i)(\d+\s*[-+*/^]\s*\d+|\bm[ée]t[ée]o\b|\btemp[ée]rature\b|\bweather\b|\bweb\b|\bgoogle\b|\binternet\b)";

const DOC_HINTS: &[&str] = &[
    "according to",
    "selon",
    "dans le document",
    "in the document",
    "manual",
    "manuel",
    "policy",
    "politique",
    "procédure",
    "procedure",
    "report",
    "rapport",
    "pdf",
    "docx",
];

const CLASSIFIER_PROMPT: &str =
    "You are a router. Reply with exactly one word: RAG, AGENT or SMALLTALK.";

fn agent_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(AGENT_PATTERN).expect("agent pattern is valid"))
}

/// Rule-based routing, first match wins. `None` means no heuristic fired.
pub fn heuristic_route(question: &str) -> Option<Intent> {
    if agent_regex().is_match(question) {
        return Some(Intent::Agent);
    }

    let lowered = question.to_lowercase();
    if DOC_HINTS.iter().any(|hint| lowered.contains(hint)) {
        return Some(Intent::Rag);
    }

    None
}

/// Classifies a question, falling back to one constrained model call when
/// no heuristic fires. Anything the model says that is not one of the three
/// labels, and any model failure, coerces to smalltalk.
pub async fn route(model: &dyn ChatModel, question: &str) -> Intent {
    if let Some(intent) = heuristic_route(question) {
        debug!(intent = intent.as_str(), "heuristic route");
        return intent;
    }

    let messages = vec![
        ChatMessage::system(CLASSIFIER_PROMPT),
        ChatMessage::user(format!("Question: {question}")),
    ];

    let intent = match model.complete(&messages, &[]).await {
        Ok(reply) => match reply.content.trim().to_uppercase().as_str() {
            "RAG" => Intent::Rag,
            "AGENT" => Intent::Agent,
            "SMALLTALK" => Intent::Smalltalk,
            other => {
                debug!(label = other, "unrecognized classification label");
                Intent::Smalltalk
            }
        },
        Err(err) => {
            warn!(error = %err, "classification call failed");
            Intent::Smalltalk
        }
    };

    debug!(intent = intent.as_str(), "model route");
    intent
}

#[cfg(test)]
mod tests {
    use super::{Intent, heuristic_route, route};
    use crate::llm::chat::{AssistantReply, ChatModel};
    use crate::llm::messages::ChatMessage;
    use crate::llm::provider::{Provider, ProviderError};
    use crate::llm::tools::ToolDefinition;
    use async_trait::async_trait;

    struct FixedReplyModel {
        reply: &'static str,
    }

    #[async_trait]
    impl ChatModel for FixedReplyModel {
        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _tools: &[ToolDefinition],
        ) -> Result<AssistantReply, ProviderError> {
            Ok(AssistantReply {
                content: self.reply.to_string(),
                tool_calls: Vec::new(),
                usage: None,
            })
        }
    }

    struct FailingModel;

    #[async_trait]
    impl ChatModel for FailingModel {
        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _tools: &[ToolDefinition],
        ) -> Result<AssistantReply, ProviderError> {
            Err(ProviderError::EmptyResponse {
                provider: Provider::Openai,
            })
        }
    }

    #[test]
    fn arithmetic_routes_to_agent() {
        assert_eq!(heuristic_route("2+2"), Some(Intent::Agent));
        assert_eq!(
            heuristic_route("calcule 5000 * (1 + 0.045)^5"),
            Some(Intent::Agent)
        );
    }

    #[test]
    fn weather_vocabulary_routes_to_agent_in_both_languages() {
        assert_eq!(
            heuristic_route("Quelle est la météo à Paris"),
            Some(Intent::Agent)
        );
        assert_eq!(
            heuristic_route("what's the weather like today"),
            Some(Intent::Agent)
        );
        assert_eq!(
            heuristic_route("quelle température fait-il"),
            Some(Intent::Agent)
        );
    }

    #[test]
    fn document_hints_route_to_rag() {
        assert_eq!(
            heuristic_route("According to the manual, what is the policy?"),
            Some(Intent::Rag)
        );
        assert_eq!(
            heuristic_route("Que dit le rapport annuel ?"),
            Some(Intent::Rag)
        );
    }

    #[test]
    fn unhinted_questions_fall_through_to_the_model() {
        assert_eq!(heuristic_route("25 mars réunion"), None);
        assert_eq!(heuristic_route("bonjour"), None);
    }

    #[tokio::test]
    async fn model_labels_are_honored() {
        let model = FixedReplyModel { reply: " rag \n" };
        assert_eq!(route(&model, "25 mars réunion").await, Intent::Rag);

        let model = FixedReplyModel { reply: "AGENT" };
        assert_eq!(route(&model, "25 mars réunion").await, Intent::Agent);
    }

    #[tokio::test]
    async fn unrecognized_labels_coerce_to_smalltalk() {
        let model = FixedReplyModel {
            reply: "I think this is about documents",
        };
        assert_eq!(route(&model, "25 mars réunion").await, Intent::Smalltalk);
    }

    #[tokio::test]
    async fn model_failure_coerces_to_smalltalk() {
        assert_eq!(
            route(&FailingModel, "25 mars réunion").await,
            Intent::Smalltalk
        );
    }

    #[tokio::test]
    async fn heuristics_win_before_the_model_is_consulted() {
        // The fixed reply would say RAG; the arithmetic heuristic must win.
        let model = FixedReplyModel { reply: "RAG" };
        assert_eq!(route(&model, "12 * 12").await, Intent::Agent);
    }
}
