use super::{GenerationClient, GenerationClientError, map_transport_error};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Client for the Gemini `generateContent` REST endpoint.
pub struct GeminiClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
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

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GeminiClient {
    /// Build a client for `model`, authenticating with `api_key`.
    pub fn new(base_url: String, api_key: String, model: String, timeout: Duration) -> Self {
        let http = Client::builder()
            .user_agent("pdfchat/generate")
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url,
            api_key,
            model,
            timeout,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationClientError> {
        let payload = json!({
            "contents": [
                { "role": "user", "parts": [{ "text": prompt }] }
            ]
        });

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|error| map_transport_error(error, "Gemini", &self.base_url, self.timeout))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(GenerationClientError::ProviderUnavailable(format!(
                "Gemini model {} not found",
                self.model
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationClientError::GenerationFailed(format!(
                "Gemini returned {status}: {body}"
            )));
        }

        let body: GenerateContentResponse = response.json().await.map_err(|error| {
            if error.is_timeout() {
                GenerationClientError::Timeout(self.timeout.as_secs())
            } else {
                GenerationClientError::InvalidResponse(format!(
                    "failed to decode Gemini response: {error}"
                ))
            }
        })?;

        extract_text(body)
    }
}

fn extract_text(body: GenerateContentResponse) -> Result<String, GenerationClientError> {
    let Some(candidate) = body.candidates.into_iter().next() else {
        let reason = body
            .prompt_feedback
            .and_then(|feedback| feedback.block_reason)
            .unwrap_or_else(|| "no candidates returned".to_string());
        return Err(GenerationClientError::GenerationFailed(format!(
            "Gemini returned no answer: {reason}"
        )));
    };

    let text: String = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    if text.is_empty() {
        let reason = candidate
            .finish_reason
            .unwrap_or_else(|| "empty candidate".to_string());
        return Err(GenerationClientError::InvalidResponse(format!(
            "Gemini candidate had no text: {reason}"
        )));
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    fn client(base_url: String, timeout: Duration) -> GeminiClient {
        GeminiClient::new(base_url, "test-key".into(), "gemini-pro".into(), timeout)
    }

    #[tokio::test]
    async fn returns_candidate_text() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1beta/models/gemini-pro:generateContent")
                    .header("x-goog-api-key", "test-key")
                    .body_contains("What is inside?");
                then.status(200).json_body(json!({
                    "candidates": [{
                        "content": {
                            "role": "model",
                            "parts": [{ "text": "A pump " }, { "text": "manual." }]
                        },
                        "finishReason": "STOP"
                    }]
                }));
            })
            .await;

        let answer = client(server.base_url(), Duration::from_secs(5))
            .generate("What is inside?")
            .await
            .expect("answer");

        mock.assert_async().await;
        assert_eq!(answer, "A pump manual.");
    }

    #[tokio::test]
    async fn blocked_prompt_is_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1beta/models/gemini-pro:generateContent");
                then.status(200).json_body(json!({
                    "promptFeedback": { "blockReason": "SAFETY" }
                }));
            })
            .await;

        let error = client(server.base_url(), Duration::from_secs(5))
            .generate("prompt")
            .await
            .expect_err("blocked");
        assert!(
            matches!(error, GenerationClientError::GenerationFailed(message) if message.contains("SAFETY"))
        );
    }

    #[tokio::test]
    async fn error_status_carries_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1beta/models/gemini-pro:generateContent");
                then.status(403).body("API key not valid");
            })
            .await;

        let error = client(server.base_url(), Duration::from_secs(5))
            .generate("prompt")
            .await
            .expect_err("forbidden");
        assert!(
            matches!(error, GenerationClientError::GenerationFailed(message) if message.contains("API key not valid"))
        );
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1beta/models/gemini-pro:generateContent");
                then.status(200)
                    .delay(Duration::from_secs(3))
                    .json_body(json!({ "candidates": [] }));
            })
            .await;

        let error = client(server.base_url(), Duration::from_millis(200))
            .generate("prompt")
            .await
            .expect_err("timeout");
        assert!(matches!(error, GenerationClientError::Timeout(_)));
    }
}
