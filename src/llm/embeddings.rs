use std::env;

use serde_json::{Value, json};

use crate::llm::provider::{Provider, ProviderError, api_key_env, embeddings_endpoint};

/// Embeddings client used to vectorize retrieval queries.
#[derive(Debug, Clone)]
pub struct EmbeddingsClient {
    provider: Provider,
    model: String,
    client: reqwest::Client,
}

impl EmbeddingsClient {
    pub fn new(provider: Provider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Embeds a single query string and returns the dense vector.
    pub async fn embed_query(&self, input: &str) -> Result<Vec<f32>, ProviderError> {
        let provider = self.provider;
        let key_env = api_key_env(provider);
        let api_key =
            env::var(key_env).map_err(|_| ProviderError::MissingApiKey { key_env, provider })?;

        let payload = json!({
            "model": self.model,
            "input": input,
        });

        let response = self
            .client
            .post(embeddings_endpoint(provider))
            .bearer_auth(&api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|source| ProviderError::Request { provider, source })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                provider,
                status,
                body,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|source| ProviderError::Request { provider, source })?;
        let values = body["data"][0]["embedding"]
            .as_array()
            .ok_or(ProviderError::EmptyResponse { provider })?;

        let mut vector = Vec::with_capacity(values.len());
        for value in values {
            let number = value
                .as_f64()
                .ok_or(ProviderError::EmptyResponse { provider })?;
            vector.push(number as f32);
        }

        Ok(vector)
    }
}
