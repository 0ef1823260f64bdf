use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reminder_domain::{extraction::AppointmentExtractor, ExtractionError, PartialAppointment};
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{prompt::build_prompt, schema};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Extraction adapter for a `generateContent` style JSON endpoint.
#[derive(Clone)]
pub struct GeminiExtractor {
    client: ReqwestClient,
    api_key: String,
    endpoint: String,
    timeout: Duration,
}

impl GeminiExtractor {
    pub fn builder(api_key: impl Into<String>) -> GeminiExtractorBuilder {
        GeminiExtractorBuilder::new(api_key)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call(&self, prompt: String) -> Result<String, ExtractionError> {
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: Some(prompt) }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: schema::response_schema(),
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| self.transport_error(err))?;

        let status = response.status();
        debug!(%status, "extraction service responded");
        if !status.is_success() {
            return Err(ExtractionError::failed(format!(
                "extraction service returned {status}"
            )));
        }

        let envelope: GenerateResponse = response.json().await.map_err(|err| {
            if err.is_timeout() {
                self.transport_error(err)
            } else {
                ExtractionError::failed(format!("malformed response payload: {err}"))
            }
        })?;

        envelope
            .candidates
            .into_iter()
            .flat_map(|candidate| candidate.content.parts)
            .find_map(|part| part.text)
            .ok_or_else(|| ExtractionError::failed("response carried no answer text"))
    }

    fn transport_error(&self, err: reqwest::Error) -> ExtractionError {
        if err.is_timeout() {
            ExtractionError::failed(format!(
                "extraction service timed out after {}s",
                self.timeout.as_secs_f64()
            ))
        } else {
            ExtractionError::failed(format!("extraction request failed: {err}"))
        }
    }
}

#[async_trait]
impl AppointmentExtractor for GeminiExtractor {
    async fn extract(
        &self,
        text: &str,
        today: NaiveDate,
    ) -> Result<Option<PartialAppointment>, ExtractionError> {
        let raw = self.call(build_prompt(text, today)).await?;
        let answer: Value = serde_json::from_str(strip_code_fence(&raw)).map_err(|err| {
            ExtractionError::failed(format!("answer text is not JSON: {err}"))
        })?;

        let partial = schema::validate_answer(&answer);
        if partial.is_none() {
            warn!(%answer, "extraction answer does not match the expected format");
        }
        Ok(partial)
    }
}

/// Builder for [`GeminiExtractor`].
#[derive(Debug)]
pub struct GeminiExtractorBuilder {
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl GeminiExtractorBuilder {
    fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<GeminiExtractor, ExtractionError> {
        let client = ReqwestClient::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|err| ExtractionError::failed(format!("http client setup failed: {err}")))?;
        let endpoint = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        Ok(GeminiExtractor {
            client,
            api_key: self.api_key,
            endpoint,
            timeout: self.timeout,
        })
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markdown_fences() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn endpoint_is_built_from_base_url_and_model() {
        let extractor = GeminiExtractor::builder("key")
            .base_url("http://localhost:9999/")
            .model("test-model")
            .build()
            .expect("extractor");
        assert_eq!(
            extractor.endpoint(),
            "http://localhost:9999/v1beta/models/test-model:generateContent"
        );
    }
}
