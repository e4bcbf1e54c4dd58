//! services/api/src/adapters/gemini.rs
//!
//! This module contains the model gateway adapter. It implements the
//! `CompletionService` port from the `core` crate by calling the Gemini
//! `generateContent` endpoint over HTTP.

use async_trait::async_trait;
use converse_core::domain::Turn;
use converse_core::ports::{CompletionService, GatewayError, GatewayResult};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `CompletionService` against the Gemini API.
#[derive(Clone)]
pub struct GeminiGateway {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiGateway {
    /// Creates a new `GeminiGateway`. The `client` carries the bounded
    /// request timeout configured at startup.
    pub fn new(
        client: Client,
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into(),
        }
    }
}

//=========================================================================================
// Provider Request Envelope
//=========================================================================================

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct SystemInstruction {
    role: String,
    parts: Vec<Part>,
}

fn build_request(turns: &[Turn], system_instruction: Option<&str>) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: turns
            .iter()
            .map(|turn| Content {
                role: turn.role.as_str().to_string(),
                parts: vec![Part {
                    text: turn.text.clone(),
                }],
            })
            .collect(),
        system_instruction: system_instruction.map(|text| SystemInstruction {
            role: "system".to_string(),
            parts: vec![Part {
                text: text.to_string(),
            }],
        }),
    }
}

//=========================================================================================
// `CompletionService` Trait Implementation
//=========================================================================================

#[async_trait]
impl CompletionService for GeminiGateway {
    async fn complete(
        &self,
        turns: &[Turn],
        system_instruction: Option<&str>,
    ) -> GatewayResult<String> {
        let url = format!(
            "{}/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let request = build_request(turns, system_instruction);

        // Transport failures and timeouts are handled like any other
        // non-success answer from the provider.
        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|e| GatewayError::Upstream(format!("Request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Upstream(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(GatewayError::Upstream(extract_error_message(status, &body)));
        }

        let payload: Value = serde_json::from_str(&body).map_err(|e| {
            GatewayError::MalformedResponse(format!("Response body is not valid JSON: {}", e))
        })?;

        extract_text(&payload).ok_or_else(|| {
            GatewayError::MalformedResponse(
                "Response contained no candidate text".to_string(),
            )
        })
    }
}

/// Pulls the generated text out of the response envelope: a candidates list
/// with at least one entry containing non-empty part text.
fn extract_text(root: &Value) -> Option<String> {
    let candidates = root.get("candidates")?.as_array()?;

    let mut collected = Vec::new();
    for candidate in candidates {
        if let Some(parts) = candidate
            .get("content")
            .and_then(|content| content.get("parts"))
            .and_then(|parts| parts.as_array())
        {
            for part in parts {
                if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
                    let trimmed = text.trim();
                    if !trimmed.is_empty() {
                        collected.push(trimmed.to_string());
                    }
                }
            }
        }
    }

    if collected.is_empty() {
        None
    } else {
        Some(collected.join("\n\n"))
    }
}

/// Extracts the provider's own error message when the body parses, else a
/// generic status-code message.
fn extract_error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| {
            json.get("error")
                .and_then(|err| err.get("message"))
                .and_then(|msg| msg.as_str())
                .map(|msg| msg.to_string())
        })
        .unwrap_or_else(|| format!("Provider returned HTTP {}", status.as_u16()))
}
