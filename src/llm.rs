use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const COMPLETION_URL: &str = "https://llm.api.cloud.yandex.net/foundationModels/v1/completion";

/// One model invocation producing zero or more candidate texts.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub alternatives: Vec<Alternative>,
}

#[derive(Debug, Clone)]
pub struct Alternative {
    pub text: String,
}

/// Opaque text-in/text-out completion interface. Components hold this
/// instead of the concrete client so tests can substitute fakes.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<Completion>;
}

#[derive(Debug, Clone)]
pub struct YandexGpt {
    client: reqwest::Client,
    api_key: String,
    model_uri: String,
    temperature: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletionRequest {
    model_uri: String,
    completion_options: CompletionOptions,
    messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize)]
struct CompletionOptions {
    temperature: f64,
}

#[derive(Debug, Clone, Serialize)]
struct Message {
    role: String,
    text: String,
}

#[derive(Debug, Clone, Deserialize)]
struct CompletionResponse {
    result: CompletionResult,
}

#[derive(Debug, Clone, Deserialize)]
struct CompletionResult {
    #[serde(default)]
    alternatives: Vec<ApiAlternative>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiAlternative {
    message: AlternativeMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct AlternativeMessage {
    #[serde(default)]
    text: String,
}

impl YandexGpt {
    pub fn new(
        client: reqwest::Client,
        folder_id: &str,
        api_key: &str,
        model: &str,
        temperature: f64,
    ) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
            model_uri: format!("gpt://{}/{}", folder_id, model),
            temperature,
        }
    }
}

#[async_trait]
impl CompletionModel for YandexGpt {
    async fn complete(&self, prompt: &str) -> Result<Completion> {
        let request = CompletionRequest {
            model_uri: self.model_uri.clone(),
            completion_options: CompletionOptions {
                temperature: self.temperature,
            },
            messages: vec![Message {
                role: "user".to_string(),
                text: prompt.to_string(),
            }],
        };

        let response = self
            .client
            .post(COMPLETION_URL)
            .header("Authorization", format!("Api-Key {}", &self.api_key))
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .context("Failed to send request to the completion API")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Completion API error ({}): {}", status, body);
        }

        let api_response: CompletionResponse = response
            .json()
            .await
            .context("Failed to parse completion API response")?;

        Ok(Completion {
            alternatives: api_response
                .result
                .alternatives
                .into_iter()
                .map(|a| Alternative {
                    text: a.message.text,
                })
                .collect(),
        })
    }
}
