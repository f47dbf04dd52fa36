//! Batch classification API client
//!
//! Thin client for the message batch endpoints: submit a file of requests,
//! poll its processing status, download per-request results once it ends.
//! Results come back as JSONL where each line pairs a `custom_id` with one
//! terminal outcome, flattened here into [`BatchResultLine`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use courtpulse_common::config::ClassifierConfig;
use courtpulse_common::state::{BatchStatus, RequestCounts};

/// Environment variable holding the API key
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

const API_VERSION: &str = "2023-06-01";

/// Large request files take a while to upload and results to stream back
const REQUEST_TIMEOUT_SECS: u64 = 600;

/// Classifier API errors
#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("API key environment variable ANTHROPIC_API_KEY is not set")]
    MissingApiKey,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Batch not found: {0}")]
    BatchNotFound(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("API error ({0}): {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// One user-turn message in a classification request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

/// Model invocation parameters for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageParams {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub messages: Vec<Message>,
}

/// One line of a prepared batch request file.
///
/// `custom_id` carries the comment id so results can be joined back to the
/// filtered comments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub custom_id: String,
    pub params: MessageParams,
}

/// Terminal outcome category of one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultType {
    Succeeded,
    Errored,
    Canceled,
    Expired,
}

/// Batch status as reported by the service
#[derive(Debug, Clone, Deserialize)]
pub struct BatchHandle {
    pub id: String,
    pub processing_status: BatchStatus,
    #[serde(default)]
    pub request_counts: RequestCounts,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub results_url: Option<String>,
}

/// One downloaded result, flattened for local storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResultLine {
    pub custom_id: String,
    pub result_type: ResultType,
    /// Model response text, present for succeeded requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Error detail, present for errored requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

// Wire shapes for the results JSONL stream

#[derive(Debug, Deserialize)]
struct ApiResultLine {
    custom_id: String,
    result: ApiResult,
}

#[derive(Debug, Deserialize)]
struct ApiResult {
    #[serde(rename = "type")]
    kind: ResultType,
    #[serde(default)]
    message: Option<ApiMessage>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

impl ApiResultLine {
    fn flatten(self) -> BatchResultLine {
        let (content, input_tokens, output_tokens) = match self.result.message {
            Some(message) => {
                let text = message
                    .content
                    .iter()
                    .find(|block| block.kind == "text")
                    .map(|block| block.text.clone());
                (text, message.usage.input_tokens, message.usage.output_tokens)
            }
            None => (None, 0, 0),
        };
        let error = self.result.error.map(|e| e.to_string());

        BatchResultLine {
            custom_id: self.custom_id,
            result_type: self.result.kind,
            content,
            error,
            input_tokens,
            output_tokens,
        }
    }
}

/// Client for the message batch API.
pub struct ClassifierClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl ClassifierClient {
    /// Build a client, reading the API key from the environment.
    pub fn new(config: &ClassifierConfig) -> Result<Self, ClassifierError> {
        let api_key = std::env::var(API_KEY_ENV).map_err(|_| ClassifierError::MissingApiKey)?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(
        config: &ClassifierConfig,
        api_key: String,
    ) -> Result<Self, ClassifierError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ClassifierError::NetworkError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key,
        })
    }

    /// Submit one batch of classification requests.
    pub async fn submit_batch(
        &self,
        requests: &[BatchRequest],
    ) -> Result<BatchHandle, ClassifierError> {
        let url = format!("{}/v1/messages/batches", self.base_url);
        tracing::debug!(count = requests.len(), "submitting classification batch");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&serde_json::json!({ "requests": requests }))
            .send()
            .await
            .map_err(|e| ClassifierError::NetworkError(e.to_string()))?;

        self.parse_handle(response).await
    }

    /// Poll the current status of a batch.
    pub async fn batch_status(&self, batch_id: &str) -> Result<BatchHandle, ClassifierError> {
        let url = format!("{}/v1/messages/batches/{}", self.base_url, batch_id);

        let response = self
            .client
            .get(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .send()
            .await
            .map_err(|e| ClassifierError::NetworkError(e.to_string()))?;

        self.parse_handle(response).await
    }

    /// Download all per-request results of an ended batch.
    pub async fn download_results(
        &self,
        batch_id: &str,
    ) -> Result<Vec<BatchResultLine>, ClassifierError> {
        let url = format!("{}/v1/messages/batches/{}/results", self.base_url, batch_id);
        tracing::debug!(batch_id = %batch_id, "downloading batch results");

        let response = self
            .client
            .get(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .send()
            .await
            .map_err(|e| ClassifierError::NetworkError(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ClassifierError::BatchNotFound(batch_id.to_string()));
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ClassifierError::RateLimitExceeded);
        }
        if !status.is_success() {
            return Err(ClassifierError::ApiError(
                status.as_u16(),
                response.text().await.unwrap_or_default(),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ClassifierError::NetworkError(e.to_string()))?;

        let mut results = Vec::new();
        for line in body.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let parsed: ApiResultLine = serde_json::from_str(line)
                .map_err(|e| ClassifierError::ParseError(e.to_string()))?;
            results.push(parsed.flatten());
        }
        Ok(results)
    }

    async fn parse_handle(
        &self,
        response: reqwest::Response,
    ) -> Result<BatchHandle, ClassifierError> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ClassifierError::BatchNotFound(
                response.text().await.unwrap_or_default(),
            ));
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ClassifierError::RateLimitExceeded);
        }
        if !status.is_success() {
            return Err(ClassifierError::ApiError(
                status.as_u16(),
                response.text().await.unwrap_or_default(),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| ClassifierError::ParseError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_request_wire_shape() {
        let request = BatchRequest {
            custom_id: "abc123".to_string(),
            params: MessageParams {
                model: "claude-haiku-4-5-20251001".to_string(),
                max_tokens: 50,
                temperature: 0.0,
                messages: vec![Message {
                    role: "user".to_string(),
                    content: "Classify this".to_string(),
                }],
            },
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["custom_id"], "abc123");
        assert_eq!(value["params"]["model"], "claude-haiku-4-5-20251001");
        assert_eq!(value["params"]["max_tokens"], 50);
        assert_eq!(value["params"]["messages"][0]["role"], "user");
    }

    #[test]
    fn test_flatten_succeeded_result() {
        let line = r#"{
            "custom_id": "abc123",
            "result": {
                "type": "succeeded",
                "message": {
                    "content": [{"type": "text", "text": "{\"s\":\"neg\",\"c\":0.9,\"p\":null}"}],
                    "usage": {"input_tokens": 62, "output_tokens": 21}
                }
            }
        }"#;

        let parsed: ApiResultLine = serde_json::from_str(line).unwrap();
        let flat = parsed.flatten();
        assert_eq!(flat.custom_id, "abc123");
        assert_eq!(flat.result_type, ResultType::Succeeded);
        assert_eq!(flat.content.as_deref(), Some("{\"s\":\"neg\",\"c\":0.9,\"p\":null}"));
        assert!(flat.error.is_none());
        assert_eq!(flat.input_tokens, 62);
        assert_eq!(flat.output_tokens, 21);
    }

    #[test]
    fn test_flatten_errored_result() {
        let line = r#"{
            "custom_id": "bad456",
            "result": {
                "type": "errored",
                "error": {"type": "invalid_request_error", "message": "too long"}
            }
        }"#;

        let parsed: ApiResultLine = serde_json::from_str(line).unwrap();
        let flat = parsed.flatten();
        assert_eq!(flat.result_type, ResultType::Errored);
        assert!(flat.content.is_none());
        assert!(flat.error.as_deref().unwrap().contains("too long"));
        assert_eq!(flat.input_tokens, 0);
    }

    #[test]
    fn test_batch_handle_parses_status() {
        let body = r#"{
            "id": "msgbatch_abc",
            "processing_status": "in_progress",
            "request_counts": {"processing": 95, "succeeded": 5, "errored": 0, "canceled": 0, "expired": 0},
            "ended_at": null,
            "results_url": null
        }"#;

        let handle: BatchHandle = serde_json::from_str(body).unwrap();
        assert_eq!(handle.id, "msgbatch_abc");
        assert_eq!(handle.processing_status, BatchStatus::InProgress);
        assert_eq!(handle.request_counts.processing, 95);
        assert!(handle.ended_at.is_none());
    }

    #[test]
    fn test_result_line_round_trip() {
        let line = BatchResultLine {
            custom_id: "c1".to_string(),
            result_type: ResultType::Succeeded,
            content: Some("text".to_string()),
            error: None,
            input_tokens: 10,
            output_tokens: 5,
        };
        let json = serde_json::to_string(&line).unwrap();
        assert!(!json.contains("error"));
        let back: BatchResultLine = serde_json::from_str(&json).unwrap();
        assert_eq!(back, line);
    }
}
