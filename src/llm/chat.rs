use std::env;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::llm::messages::ChatMessage;
use crate::llm::provider::{
    ChatOptions, Provider, ProviderError, Usage, api_key_env, chat_endpoint,
};
use crate::llm::tools::{ToolCall, ToolDefinition};
use crate::llm::transport::{RequestFailure, RetryConfig, send_json_request_with_retry};

/// Assistant reply returned by a chat model.
#[derive(Debug, Clone)]
pub struct AssistantReply {
    /// Natural language content.
    pub content: String,
    /// Tool call requests emitted by the model, empty for a final answer.
    pub tool_calls: Vec<ToolCall>,
    /// Token accounting when the provider reports it.
    pub usage: Option<Usage>,
}

impl AssistantReply {
    /// Converts the reply into a history entry.
    pub fn to_message(&self) -> ChatMessage {
        ChatMessage::assistant(self.content.clone(), self.tool_calls.clone())
    }
}

/// The seam between conversation logic and a concrete chat backend.
///
/// The router, the tool-calling loop, and the retrieval responder only
/// depend on this trait, so tests drive them with a scripted model.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<AssistantReply, ProviderError>;
}

/// Chat-completions HTTP client for the configured provider.
#[derive(Debug, Clone)]
pub struct ChatClient {
    provider: Provider,
    model: String,
    options: ChatOptions,
    client: reqwest::Client,
}

impl ChatClient {
    pub fn new(provider: Provider, model: impl Into<String>, options: ChatOptions) -> Self {
        Self {
            provider,
            model: model.into(),
            options,
            client: reqwest::Client::new(),
        }
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_payload(&self, messages: &[ChatMessage], tools: &[ToolDefinition]) -> Value {
        let mut payload = Map::new();
        payload.insert("model".to_string(), Value::String(self.model.clone()));
        payload.insert(
            "messages".to_string(),
            Value::Array(messages.iter().map(|message| message.to_json()).collect()),
        );
        if let Some(temperature) = self.options.temperature {
            payload.insert("temperature".to_string(), json!(temperature));
        }
        if let Some(max_tokens) = self.options.max_tokens {
            payload.insert("max_tokens".to_string(), json!(max_tokens));
        }
        if !tools.is_empty() {
            payload.insert(
                "tools".to_string(),
                Value::Array(tools.iter().map(|tool| tool.to_json()).collect()),
            );
        }
        Value::Object(payload)
    }
}

#[async_trait]
impl ChatModel for ChatClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<AssistantReply, ProviderError> {
        let provider = self.provider;
        let key_env = api_key_env(provider);
        let api_key =
            env::var(key_env).map_err(|_| ProviderError::MissingApiKey { key_env, provider })?;

        let payload = self.build_payload(messages, tools);
        let response = send_json_request_with_retry(
            &self.client,
            chat_endpoint(provider),
            &api_key,
            &payload,
            RetryConfig::from(self.options),
        )
        .await
        .map_err(|failure| match failure {
            RequestFailure::Request(source) => ProviderError::Request { provider, source },
            RequestFailure::Api { status, body } => ProviderError::Api {
                provider,
                status,
                body,
            },
        })?;

        let body: Value = response
            .json()
            .await
            .map_err(|source| ProviderError::Request { provider, source })?;
        let message = &body["choices"][0]["message"];
        let content = message["content"].as_str().unwrap_or("").to_string();
        let tool_calls = parse_tool_calls(message);

        if content.is_empty() && tool_calls.is_empty() {
            return Err(ProviderError::EmptyResponse { provider });
        }

        let usage = body
            .get("usage")
            .filter(|value| value.is_object())
            .map(|usage| Usage {
                prompt_tokens: usage["prompt_tokens"].as_u64().map(|value| value as u32),
                completion_tokens: usage["completion_tokens"].as_u64().map(|value| value as u32),
                total_tokens: usage["total_tokens"].as_u64().map(|value| value as u32),
            });

        Ok(AssistantReply {
            content,
            tool_calls,
            usage,
        })
    }
}

fn parse_tool_calls(message: &Value) -> Vec<ToolCall> {
    let mut tool_calls = Vec::new();
    if let Some(calls) = message["tool_calls"].as_array() {
        for call in calls {
            let id = call["id"].as_str().unwrap_or("").to_string();
            let name = call["function"]["name"].as_str().unwrap_or("").to_string();
            let arguments = &call["function"]["arguments"];
            let args = match arguments {
                Value::String(raw) => {
                    serde_json::from_str(raw).unwrap_or(Value::String(raw.clone()))
                }
                other => other.clone(),
            };
            if !name.is_empty() {
                tool_calls.push(ToolCall { id, name, args });
            }
        }
    }
    tool_calls
}
