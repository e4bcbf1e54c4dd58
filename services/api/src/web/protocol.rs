//! services/api/src/web/protocol.rs
//!
//! Defines the JSON wire format of the chat endpoint: the provider-style
//! envelope the browser client sends and receives, and its conversion to and
//! from the core domain types.

use converse_core::domain::{Role, Turn};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Wire Shapes
//=========================================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WirePart {
    pub text: String,
}

/// One turn as it travels over the wire: `{ "role": ..., "parts": [{ "text": ... }] }`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WireTurn {
    pub role: String,
    pub parts: Vec<WirePart>,
}

/// The per-request system instruction. The client sends it in the same shape
/// as a turn; only the part text matters here.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct WireInstruction {
    pub parts: Vec<WirePart>,
}

/// The body of `POST /chat`.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub history: Vec<WireTurn>,
    #[serde(default)]
    pub system_instruction: Option<WireInstruction>,
    #[serde(default)]
    pub chat_id: Option<Uuid>,
}

impl ChatRequest {
    /// Converts the wire history into domain turns. Fails on unknown roles.
    pub fn to_domain_history(&self) -> Result<Vec<Turn>, String> {
        self.history
            .iter()
            .map(|turn| {
                let role = Role::parse(&turn.role)
                    .ok_or_else(|| format!("Unknown turn role '{}'", turn.role))?;
                Ok(Turn {
                    role,
                    text: join_parts(&turn.parts),
                })
            })
            .collect()
    }

    pub fn system_instruction_text(&self) -> Option<String> {
        self.system_instruction
            .as_ref()
            .map(|instruction| join_parts(&instruction.parts))
            .filter(|text| !text.trim().is_empty())
    }
}

fn join_parts(parts: &[WirePart]) -> String {
    parts
        .iter()
        .map(|part| part.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

//=========================================================================================
// Response Envelope
//=========================================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct WireCandidateContent {
    pub role: String,
    pub parts: Vec<WirePart>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WireCandidate {
    pub content: WireCandidateContent,
}

/// The body of a successful `POST /chat` response.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub candidates: Vec<WireCandidate>,
    pub chat_id: Uuid,
}

impl ChatResponse {
    /// Wraps the answer text in the provider-style candidates envelope.
    pub fn from_answer(answer: String, chat_id: Uuid) -> Self {
        Self {
            candidates: vec![WireCandidate {
                content: WireCandidateContent {
                    role: Role::Model.as_str().to_string(),
                    parts: vec![WirePart { text: answer }],
                },
            }],
            chat_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_the_client_envelope() {
        let body = r#"{
            "history": [
                { "role": "user", "parts": [{ "text": "hello" }] },
                { "role": "model", "parts": [{ "text": "hi" }] },
                { "role": "user", "parts": [{ "text": "what time is it" }] }
            ],
            "systemInstruction": { "role": "system", "parts": [{ "text": "be kind" }] },
            "chatId": "7f5e9a92-0f2b-4c4e-9a3e-0d8f6a1b2c3d"
        }"#;

        let request: ChatRequest = serde_json::from_str(body).unwrap();
        let history = request.to_domain_history().unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0], Turn::user("hello"));
        assert_eq!(history[2].text, "what time is it");
        assert_eq!(request.system_instruction_text().as_deref(), Some("be kind"));
        assert!(request.chat_id.is_some());
    }

    #[test]
    fn optional_fields_default_to_none() {
        let body = r#"{ "history": [] }"#;
        let request: ChatRequest = serde_json::from_str(body).unwrap();
        assert!(request.system_instruction.is_none());
        assert!(request.chat_id.is_none());
    }

    #[test]
    fn unknown_role_is_rejected() {
        let body = r#"{ "history": [ { "role": "system", "parts": [{ "text": "x" }] } ] }"#;
        let request: ChatRequest = serde_json::from_str(body).unwrap();
        assert!(request.to_domain_history().is_err());
    }

    #[test]
    fn response_envelope_has_the_provider_shape() {
        let chat_id = Uuid::new_v4();
        let response = ChatResponse::from_answer("the answer".to_string(), chat_id);
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["candidates"][0]["content"]["parts"][0]["text"], "the answer");
        assert_eq!(value["candidates"][0]["content"]["role"], "model");
        assert_eq!(value["chatId"], chat_id.to_string());
    }
}
