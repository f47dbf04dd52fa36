//! Model response parsing
//!
//! The prompt demands bare JSON but models still wrap it in markdown fences
//! or return a single-element array now and then. Anything that cannot be
//! coerced into a valid classification becomes an error carrying the raw
//! text, never a panic.

use courtpulse_common::records::{ClassificationResult, Sentiment};

use crate::services::classifier::{BatchResultLine, ResultType};

/// Successfully parsed model response
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSentiment {
    pub sentiment: Sentiment,
    pub confidence: f64,
    pub player: Option<String>,
}

/// Parse one model response. `Err` returns the raw text unmodified.
pub fn parse_response(text: &str) -> Result<ParsedSentiment, String> {
    let raw = || text.to_string();

    if text.trim().is_empty() {
        return Err(raw());
    }

    let mut cleaned = text.trim();
    if let Some(rest) = cleaned.strip_prefix("```json") {
        cleaned = rest;
    } else if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest;
    }
    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest;
    }
    cleaned = cleaned.trim();

    let value: serde_json::Value = serde_json::from_str(cleaned).map_err(|_| raw())?;

    // Some responses arrive as a single-element array; use its first object
    let object = match &value {
        serde_json::Value::Array(items) => items.first().ok_or_else(raw)?,
        other => other,
    };
    let object = object.as_object().ok_or_else(raw)?;

    let sentiment = object
        .get("s")
        .and_then(|v| v.as_str())
        .and_then(Sentiment::from_label)
        .ok_or_else(raw)?;

    let confidence = match object.get("c") {
        None => 0.0,
        Some(v) => coerce_f64(v).ok_or_else(raw)?,
    };

    let player = object
        .get("p")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    Ok(ParsedSentiment {
        sentiment,
        confidence,
        player,
    })
}

/// Accept numeric confidence directly or as a numeric string
fn coerce_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Fold a downloaded result and its response parse into one terminal
/// classification outcome.
pub fn classify_result(line: &BatchResultLine) -> ClassificationResult {
    match line.result_type {
        ResultType::Succeeded => {
            match parse_response(line.content.as_deref().unwrap_or_default()) {
                Ok(parsed) => ClassificationResult::Succeeded {
                    sentiment: parsed.sentiment,
                    confidence: parsed.confidence,
                    sentiment_player: parsed.player,
                    input_tokens: line.input_tokens,
                    output_tokens: line.output_tokens,
                },
                Err(raw) => ClassificationResult::Errored {
                    message: format!("unparseable response: {}", raw),
                },
            }
        }
        ResultType::Errored => ClassificationResult::Errored {
            message: line
                .error
                .clone()
                .unwrap_or_else(|| "unknown error".to_string()),
        },
        ResultType::Canceled => ClassificationResult::Canceled,
        ResultType::Expired => ClassificationResult::Expired,
    }
}
