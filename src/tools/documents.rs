use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::llm::tools::ToolParam;
use crate::rag::responder::RagResponder;
use crate::tools::{Tool, required_str_arg};

/// Adapts the retrieval responder to the tool contract.
///
/// In direct mode the model picks this tool like any other, which is how
/// document questions reach the index without the intent router.
pub struct DocumentSearchTool {
    responder: Arc<RagResponder>,
}

impl DocumentSearchTool {
    pub fn new(responder: Arc<RagResponder>) -> Self {
        Self { responder }
    }
}

#[async_trait]
impl Tool for DocumentSearchTool {
    fn name(&self) -> &str {
        "document_search"
    }

    fn description(&self) -> &str {
        "Use this tool ONLY to answer questions about the manuals, reports, \
         or theory contained in the internal documents."
    }

    fn params(&self) -> Vec<ToolParam> {
        vec![ToolParam::required_string(
            "question",
            "Question to answer from the internal documents.",
        )]
    }

    async fn invoke(&self, args: &Value) -> String {
        match required_str_arg(args, "question") {
            Ok(question) => self.responder.answer(&question).await,
            Err(reason) => format!("Document search failed: {reason}."),
        }
    }
}
