use tracing::{debug, warn};

use crate::llm::chat::ChatModel;
use crate::llm::messages::ChatMessage;
use crate::tools::ToolRegistry;

pub const DEFAULT_MAX_STEPS: usize = 6;

const GIVE_UP_TEXT: &str = "Sorry, I could not finish resolving the requested \
tool calls within the step limit. Please rephrase or simplify the question.";

const MODEL_FAILURE_TEXT: &str =
    "Sorry, I could not reach the language model. Please try again.";

/// Outcome of one loop run: the final answer plus every message produced,
/// in order, for the session store to append.
#[derive(Debug)]
pub struct LoopOutcome {
    pub answer: String,
    pub messages: Vec<ChatMessage>,
}

/// The model/tool exchange: the model chooses tool calls, the loop executes
/// them and feeds results back, until the model answers without tools.
///
/// Each model turn requesting N tool calls appends exactly N correlated
/// tool-result messages before the model is consulted again; an unknown tool
/// name or a failing execution produces an error-text result, never an
/// absence. The loop is bounded: after `max_steps` model turns that still
/// request tools, it stops with a designated give-up answer.
pub struct ToolLoop<'a> {
    model: &'a dyn ChatModel,
    registry: &'a ToolRegistry,
    max_steps: usize,
}

impl<'a> ToolLoop<'a> {
    pub fn new(model: &'a dyn ChatModel, registry: &'a ToolRegistry, max_steps: usize) -> Self {
        Self {
            model,
            registry,
            max_steps: max_steps.max(1),
        }
    }

    /// Runs the loop over the given history. The history already ends with
    /// the user's question; produced messages are appended to the returned
    /// outcome, not to the input.
    pub async fn run(&self, history: &[ChatMessage]) -> LoopOutcome {
        let definitions = self.registry.definitions();
        let mut transcript: Vec<ChatMessage> = history.to_vec();
        let mut produced: Vec<ChatMessage> = Vec::new();

        for step in 0..self.max_steps {
            let reply = match self.model.complete(&transcript, &definitions).await {
                Ok(reply) => reply,
                Err(err) => {
                    warn!(error = %err, step, "model turn failed");
                    let message = ChatMessage::assistant(MODEL_FAILURE_TEXT, Vec::new());
                    produced.push(message.clone());
                    return LoopOutcome {
                        answer: MODEL_FAILURE_TEXT.to_string(),
                        messages: produced,
                    };
                }
            };

            let assistant = reply.to_message();
            transcript.push(assistant.clone());
            produced.push(assistant);

            if reply.tool_calls.is_empty() {
                debug!(step, "final answer");
                return LoopOutcome {
                    answer: reply.content,
                    messages: produced,
                };
            }

            for call in &reply.tool_calls {
                let output = match self.registry.get(&call.name) {
                    Some(tool) => {
                        debug!(tool = %call.name, step, "executing tool");
                        tool.invoke(&call.args).await
                    }
                    None => {
                        warn!(tool = %call.name, "unknown tool requested");
                        format!(
                            "Unknown tool '{}'. Available tools: {}.",
                            call.name,
                            self.registry.names().join(", ")
                        )
                    }
                };
                let result = ChatMessage::tool_result(call.id.clone(), output);
                transcript.push(result.clone());
                produced.push(result);
            }
        }

        warn!(max_steps = self.max_steps, "step limit reached");
        let message = ChatMessage::assistant(GIVE_UP_TEXT, Vec::new());
        produced.push(message);
        LoopOutcome {
            answer: GIVE_UP_TEXT.to_string(),
            messages: produced,
        }
    }
}
