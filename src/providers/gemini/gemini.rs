use crate::config::ProviderConfig;
use crate::providers::traits::CompletionProvider;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

#[derive(Clone)]
pub struct GeminiProvider {
    api_key: String,
    client: Client,
    model: String,
    base_url: String,
    temperature: Option<f32>,
}

/// Request body for a `generateContent` call. The response mime type pins the
/// model to JSON output so the recipe comes back machine-readable.
pub(crate) fn build_generate_request(prompt: &str, temperature: Option<f32>) -> Value {
    let mut generation_config = json!({
        "response_mime_type": "application/json"
    });
    if let Some(temperature) = temperature {
        generation_config["temperature"] = json!(temperature);
    }

    json!({
        "contents": [{
            "parts": [{
                "text": prompt
            }]
        }],
        "generationConfig": generation_config
    })
}

/// Pulls the generated text out of a `generateContent` response.
pub(crate) fn extract_candidate_text(response: &Value) -> Result<String> {
    if let Some(error) = response.get("error") {
        return Err(anyhow!("API returned error: {}", error));
    }

    response["candidates"][0]["content"]["parts"][0]["text"]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| {
            let debug_json = serde_json::to_string_pretty(response).unwrap_or_default();
            anyhow!("Invalid response format. Response JSON: {}", debug_json)
        })
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    async fn new(api_key: String) -> Result<Self> {
        let config = ProviderConfig::from_env("gemini");

        Ok(Self {
            api_key,
            client: Client::new(),
            model: config.model,
            base_url: config.api_url,
            temperature: config.temperature,
        })
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&build_generate_request(prompt, self.temperature))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!(
                "API request failed: Status {}, Body: {}",
                status,
                error_text
            ));
        }

        let response_json: Value = response.json().await?;
        extract_candidate_text(&response_json)
    }

    async fn get_model_info(&self) -> Result<String> {
        Ok(self.model.clone())
    }

    fn clone_box(&self) -> Box<dyn CompletionProvider + Send + Sync> {
        Box::new(self.clone())
    }
}
