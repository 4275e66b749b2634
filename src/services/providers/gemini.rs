/// Gemini text generation provider
///
/// Calls `POST {api_url}/v1beta/models/{model}:generateContent` and returns
/// the text of the first candidate. The model is asked for a JSON response.
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::json;

use crate::{
    error::{AppError, AppResult},
    services::providers::CompletionProvider,
};

#[derive(Clone)]
pub struct GeminiProvider {
    http_client: HttpClient,
    api_key: Option<String>,
    api_url: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiProvider {
    pub fn new(api_key: Option<String>, api_url: String, model: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key,
            api_url,
            model,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_url.trim_end_matches('/'),
            self.model
        )
    }
}

/// Extracts the concatenated text parts of the first candidate
fn first_candidate_text(response: GenerateResponse) -> Option<String> {
    let content = response.candidates.into_iter().next()?.content?;
    let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

#[async_trait::async_trait]
impl CompletionProvider for GeminiProvider {
    async fn complete(&self, prompt: &str) -> AppResult<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::ExternalApi("Gemini API key is not configured".to_string()))?;

        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": { "responseMimeType": "application/json" }
        });

        let response = self
            .http_client
            .post(self.endpoint())
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Gemini API returned status {}: {}",
                status, body
            )));
        }

        let generated: GenerateResponse = response.json().await?;
        let text = first_candidate_text(generated).ok_or_else(|| {
            AppError::ExternalApi("Gemini response contained no text".to_string())
        })?;

        tracing::debug!(
            model = %self.model,
            chars = text.len(),
            provider = "gemini",
            "Completion received"
        );

        Ok(text)
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint() {
        let provider = GeminiProvider::new(
            None,
            "https://generativelanguage.googleapis.com/".to_string(),
            "gemini-1.5-flash".to_string(),
        );
        assert_eq!(
            provider.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn test_first_candidate_text() {
        let json = r#"{
            "candidates": [
                { "content": { "parts": [{ "text": "[1, " }, { "text": "2, 3]" }], "role": "model" } },
                { "content": { "parts": [{ "text": "[9]" }] } }
            ]
        }"#;
        let response: GenerateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(first_candidate_text(response), Some("[1, 2, 3]".to_string()));
    }

    #[test]
    fn test_empty_candidates() {
        let response: GenerateResponse = serde_json::from_str(r#"{ "candidates": [] }"#).unwrap();
        assert_eq!(first_candidate_text(response), None);
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let provider = GeminiProvider::new(None, "http://test.local".to_string(), "m".to_string());
        let err = provider.complete("hello").await.unwrap_err();
        assert!(matches!(err, AppError::ExternalApi(_)));
    }
}
