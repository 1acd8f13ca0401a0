use std::env;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::llm::tools::ToolParam;
use crate::tools::{Tool, required_str_arg};

const TAVILY_URL: &str = "https://api.tavily.com/search";
const API_KEY_ENV: &str = "TAVILY_API_KEY";
const MAX_RESULTS: usize = 3;

/// Web search backed by the Tavily REST API.
pub struct WebSearchTool {
    client: reqwest::Client,
}

impl WebSearchTool {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    async fn search(&self, api_key: &str, query: &str) -> Result<String, String> {
        let payload = json!({
            "api_key": api_key,
            "query": query,
            "max_results": MAX_RESULTS,
        });

        let response = self
            .client
            .post(TAVILY_URL)
            .json(&payload)
            .send()
            .await
            .map_err(|err| format!("Web search failed: {err}."))?;

        if !response.status().is_success() {
            return Err(format!(
                "Web search failed: the search service returned {}.",
                response.status()
            ));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|err| format!("Web search failed: {err}."))?;

        let results = body["results"].as_array().cloned().unwrap_or_default();
        if results.is_empty() {
            return Ok("No results found.".to_string());
        }

        let mut lines = Vec::new();
        for result in results.iter().take(MAX_RESULTS) {
            let title = result["title"].as_str().unwrap_or("untitled");
            let url = result["url"].as_str().unwrap_or("");
            let content = result["content"].as_str().unwrap_or("");
            lines.push(format!("- {title} ({url})\n  {content}"));
        }
        Ok(lines.join("\n"))
    }
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Searches the web for external information, recent financial news, \
         or definitions that are not in the internal documents."
    }

    fn params(&self) -> Vec<ToolParam> {
        vec![ToolParam::required_string("query", "Search query.")]
    }

    async fn invoke(&self, args: &Value) -> String {
        let query = match required_str_arg(args, "query") {
            Ok(query) => query,
            Err(reason) => return format!("Web search failed: {reason}."),
        };

        let api_key = match env::var(API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => key,
            _ => {
                return format!("Web search is not configured: {API_KEY_ENV} is not set.");
            }
        };

        match self.search(&api_key, &query).await {
            Ok(report) => report,
            Err(reason) => reason,
        }
    }
}
