use std::sync::Arc;

use tracing::debug;

use crate::llm::chat::ChatModel;
use crate::llm::messages::ChatMessage;
use crate::rag::index::{DocumentIndex, Fragment};

pub const DEFAULT_TOP_K: usize = 4;

/// Upper bound on the context block handed to the model.
const MAX_CONTEXT_CHARS: usize = 6_000;

const GROUNDING_PROMPT: &str = "You are an assistant that answers from the content \
of internal documents. Answer the question using ONLY the excerpts provided below. \
If the answer is not in the excerpts, say honestly that you do not have that \
information in the internal documents. Be concise, and name the relevant sources \
when possible.";

const UNAVAILABLE_TEXT: &str =
    "Sorry, the internal document index is unavailable right now. Please try again later.";

/// Answers a question from the top-k fragments of the document index.
///
/// One retrieval, one model call. Index errors surface as the response
/// text rather than propagating.
pub struct RagResponder {
    index: Arc<dyn DocumentIndex>,
    model: Arc<dyn ChatModel>,
    top_k: usize,
}

impl RagResponder {
    pub fn new(index: Arc<dyn DocumentIndex>, model: Arc<dyn ChatModel>, top_k: usize) -> Self {
        Self {
            index,
            model,
            top_k,
        }
    }

    pub async fn answer(&self, question: &str) -> String {
        let fragments = match self.index.retrieve(question, self.top_k).await {
            Ok(fragments) => fragments,
            Err(reason) => {
                debug!(%reason, "document index unavailable");
                return UNAVAILABLE_TEXT.to_string();
            }
        };

        let context = format_fragments(&fragments);
        let messages = vec![
            ChatMessage::system(GROUNDING_PROMPT),
            ChatMessage::user(format!("Question: {question}\n\nExcerpts:\n{context}")),
        ];

        match self.model.complete(&messages, &[]).await {
            Ok(reply) => reply.content,
            Err(err) => {
                debug!(error = %err, "grounded model call failed");
                "Sorry, I could not reach the language model to answer from the documents."
                    .to_string()
            }
        }
    }
}

/// Joins fragments as `[source] text` blocks, bounded to the context budget.
fn format_fragments(fragments: &[Fragment]) -> String {
    if fragments.is_empty() {
        return "(no matching excerpts)".to_string();
    }

    let mut blocks = Vec::new();
    let mut used = 0;
    for fragment in fragments {
        let block = format!("[{}] {}", fragment.source, fragment.text);
        if used + block.len() > MAX_CONTEXT_CHARS && !blocks.is_empty() {
            break;
        }
        used += block.len();
        blocks.push(block);
    }
    blocks.join("\n\n---\n\n")
}
