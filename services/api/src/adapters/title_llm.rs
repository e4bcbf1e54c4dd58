use async_trait::async_trait;
use converse_core::domain::Turn;
use converse_core::ports::{CompletionService, GatewayError, GatewayResult, TitleService};
use std::sync::Arc;

const TITLE_INSTRUCTION: &str = "You are an expert at creating concise, relevant titles for \
conversations.";

/// How many opening turns feed the title prompt.
const TITLE_CONTEXT_TURNS: usize = 4;

pub struct DelegatedTitleAdapter {
    completions: Arc<dyn CompletionService>,
}

impl DelegatedTitleAdapter {
    pub fn new(completions: Arc<dyn CompletionService>) -> Self {
        Self { completions }
    }
}

#[async_trait]
impl TitleService for DelegatedTitleAdapter {
    async fn generate(&self, turns: &[Turn]) -> GatewayResult<String> {
        let opening = &turns[..turns.len().min(TITLE_CONTEXT_TURNS)];
        let conversation = opening
            .iter()
            .map(|turn| format!("{}: {}", turn.role.as_str(), turn.text))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "Based on the following conversation, create a short, concise title (2-4 words \
             maximum). The title should be about the main subject. Do not use quotes. Just \
             return the title text.\n\nConversation:\n{}",
            conversation
        );

        let reply = self
            .completions
            .complete(&[Turn::user(prompt)], Some(TITLE_INSTRUCTION))
            .await?;

        let title = reply.trim().replace('"', "");
        if title.is_empty() {
            return Err(GatewayError::MalformedResponse(
                "Title generation returned no text".to_string(),
            ));
        }
        Ok(title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedCompletion(String);

    #[async_trait]
    impl CompletionService for ScriptedCompletion {
        async fn complete(
            &self,
            _turns: &[Turn],
            _system_instruction: Option<&str>,
        ) -> GatewayResult<String> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn strips_quotes_and_whitespace() {
        let adapter = DelegatedTitleAdapter::new(Arc::new(ScriptedCompletion(
            " \"Linked List Basics\" \n".to_string(),
        )));
        let title = adapter
            .generate(&[Turn::user("explain linked lists")])
            .await
            .unwrap();
        assert_eq!(title, "Linked List Basics");
    }

    #[tokio::test]
    async fn empty_reply_is_malformed() {
        let adapter = DelegatedTitleAdapter::new(Arc::new(ScriptedCompletion("  ".to_string())));
        let result = adapter.generate(&[Turn::user("hi")]).await;
        assert!(matches!(result, Err(GatewayError::MalformedResponse(_))));
    }
}
