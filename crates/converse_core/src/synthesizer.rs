//! crates/converse_core/src/synthesizer.rs
//!
//! The response synthesizer. Given the router's decision it assembles the
//! final prompt (possibly injecting search context or a locally computed
//! date/time fact) and issues the final completion call.
//!
//! Failure policy: everything upstream of the final completion is
//! best-effort. A failed rewrite falls back to the literal query, a failed
//! search to an empty context, a failed timezone extraction to the default
//! zone. Only a failure of the final completion call itself surfaces to the
//! caller.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::sync::Arc;

use crate::domain::{RouterDecision, SearchContext, Turn};
use crate::ports::{
    Clock, CompletionService, GatewayResult, QueryRewriteService, TimezoneLookup,
    WebSearchService,
};

const PHRASE_TIME_INSTRUCTION: &str = "You restate a provided date and time fact as one short, \
friendly conversational sentence. Never change the time, the date, the weekday, or the timezone \
named in the fact, and do not add any other facts.";

const GROUNDED_ANSWER_INSTRUCTION: &str = "You answer questions using the search results supplied \
in the prompt as your primary source. Do not mention the search results or that a search was \
performed. If the results are insufficient or contradict each other, say plainly that you could \
not find reliable information rather than guessing.";

/// Builds the final prompt for each routing decision and obtains the answer
/// text from the model gateway.
pub struct Synthesizer {
    completions: Arc<dyn CompletionService>,
    search: Arc<dyn WebSearchService>,
    rewriter: Arc<dyn QueryRewriteService>,
    timezones: Arc<dyn TimezoneLookup>,
    clock: Arc<dyn Clock>,
    default_zone: Tz,
}

impl Synthesizer {
    pub fn new(
        completions: Arc<dyn CompletionService>,
        search: Arc<dyn WebSearchService>,
        rewriter: Arc<dyn QueryRewriteService>,
        timezones: Arc<dyn TimezoneLookup>,
        clock: Arc<dyn Clock>,
        default_zone: Tz,
    ) -> Self {
        Self {
            completions,
            search,
            rewriter,
            timezones,
            clock,
            default_zone,
        }
    }

    /// Produces the response text for one routed request.
    pub async fn synthesize(
        &self,
        decision: RouterDecision,
        latest_user_text: &str,
        history: &[Turn],
        system_instruction: Option<&str>,
    ) -> GatewayResult<String> {
        match decision {
            RouterDecision::DateTimeQuery => {
                Ok(self.answer_date_time(latest_user_text).await)
            }
            RouterDecision::WebSearch => {
                self.answer_with_search(latest_user_text, history, system_instruction)
                    .await
            }
            RouterDecision::GeneralConversation => {
                self.completions.complete(history, system_instruction).await
            }
        }
    }

    /// Answers a current date/time question from the local clock.
    ///
    /// The numeric value always comes from the clock; the model only gets to
    /// rephrase the already-formatted fact, and if that call fails the plain
    /// fact sentence is returned as-is.
    async fn answer_date_time(&self, latest_user_text: &str) -> String {
        let zone = self
            .timezones
            .extract(latest_user_text)
            .await
            .unwrap_or(self.default_zone);
        let now = self.clock.now().with_timezone(&zone);
        let fact = format_time_fact(&now, zone);

        let phrase_request = vec![Turn::user(format!(
            "Restate this fact conversationally: {fact}"
        ))];
        match self
            .completions
            .complete(&phrase_request, Some(PHRASE_TIME_INSTRUCTION))
            .await
        {
            Ok(text) if !text.trim().is_empty() => text,
            _ => fact,
        }
    }

    /// Answers with live web-search context when any is available, else falls
    /// back to a general-knowledge completion.
    async fn answer_with_search(
        &self,
        latest_user_text: &str,
        history: &[Turn],
        system_instruction: Option<&str>,
    ) -> GatewayResult<String> {
        let query = self
            .rewriter
            .rewrite(latest_user_text)
            .await
            .unwrap_or_else(|| latest_user_text.to_string());

        let context = self
            .search
            .search(&query)
            .await
            .unwrap_or_else(|_| SearchContext::empty());

        if context.is_empty() {
            // No usable snippets: answer from general knowledge instead of
            // failing the request.
            return self.completions.complete(history, system_instruction).await;
        }

        let grounded = build_grounded_history(latest_user_text, history, &context);
        self.completions
            .complete(&grounded, Some(GROUNDED_ANSWER_INSTRUCTION))
            .await
    }
}

fn format_time_fact(now: &DateTime<Tz>, zone: Tz) -> String {
    format!(
        "It is currently {} on {} in the {} timezone.",
        now.format("%-I:%M %p"),
        now.format("%A, %B %-d, %Y"),
        zone.name()
    )
}

/// Replaces the final user turn with the snippet-grounded prompt. The raw
/// question and the synthesized prompt are never both in the sent history.
fn build_grounded_history(
    latest_user_text: &str,
    history: &[Turn],
    context: &SearchContext,
) -> Vec<Turn> {
    let prompt = format!(
        "Answer the question below using these search results as your primary source.\n\n\
         Search results:\n{}\n\nQuestion: {}",
        context.as_str(),
        latest_user_text
    );

    let mut grounded: Vec<Turn> = history.to_vec();
    match grounded.last_mut() {
        Some(last) => last.text = prompt,
        None => grounded.push(Turn::user(prompt)),
    }
    grounded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::GatewayError;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::Mutex;

    struct FakeCompletion {
        reply: Option<String>,
        calls: Mutex<Vec<(Vec<Turn>, Option<String>)>>,
    }

    impl FakeCompletion {
        fn answering(reply: &str) -> Self {
            Self {
                reply: Some(reply.to_string()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(Vec<Turn>, Option<String>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionService for FakeCompletion {
        async fn complete(
            &self,
            turns: &[Turn],
            system_instruction: Option<&str>,
        ) -> GatewayResult<String> {
            self.calls
                .lock()
                .unwrap()
                .push((turns.to_vec(), system_instruction.map(str::to_string)));
            match &self.reply {
                Some(text) => Ok(text.clone()),
                None => Err(GatewayError::Upstream("provider down".to_string())),
            }
        }
    }

    struct FakeSearch {
        context: SearchContext,
        queries: Mutex<Vec<String>>,
    }

    impl FakeSearch {
        fn yielding(context: &str) -> Self {
            Self {
                context: SearchContext::new(context),
                queries: Mutex::new(Vec::new()),
            }
        }

        fn empty() -> Self {
            Self {
                context: SearchContext::empty(),
                queries: Mutex::new(Vec::new()),
            }
        }

        fn queries(&self) -> Vec<String> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WebSearchService for FakeSearch {
        async fn search(&self, query: &str) -> GatewayResult<SearchContext> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(self.context.clone())
        }
    }

    struct FakeRewriter(Option<String>);

    #[async_trait]
    impl QueryRewriteService for FakeRewriter {
        async fn rewrite(&self, _text: &str) -> Option<String> {
            self.0.clone()
        }
    }

    struct FakeTimezones(Option<Tz>);

    #[async_trait]
    impl TimezoneLookup for FakeTimezones {
        async fn extract(&self, _text: &str) -> Option<Tz> {
            self.0
        }
    }

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn noon_utc() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 5, 12, 0, 0).unwrap()
    }

    fn synthesizer(
        completions: Arc<FakeCompletion>,
        search: Arc<FakeSearch>,
        rewriter: FakeRewriter,
        timezones: FakeTimezones,
    ) -> Synthesizer {
        Synthesizer::new(
            completions,
            search,
            Arc::new(rewriter),
            Arc::new(timezones),
            Arc::new(FixedClock(noon_utc())),
            chrono_tz::UTC,
        )
    }

    fn history() -> Vec<Turn> {
        vec![
            Turn::user("hello"),
            Turn::model("Hello! How can I help you today?"),
            Turn::user("who is the current president of France"),
        ]
    }

    #[tokio::test]
    async fn general_conversation_forwards_history_unmodified() {
        let completions = Arc::new(FakeCompletion::answering("a linked list is..."));
        let search = Arc::new(FakeSearch::yielding("unused"));
        let synth = synthesizer(
            completions.clone(),
            search.clone(),
            FakeRewriter(None),
            FakeTimezones(None),
        );

        let turns = vec![Turn::user("explain linked lists")];
        let answer = synth
            .synthesize(
                RouterDecision::GeneralConversation,
                "explain linked lists",
                &turns,
                Some("be brief"),
            )
            .await
            .unwrap();

        assert_eq!(answer, "a linked list is...");
        let calls = completions.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, turns);
        assert_eq!(calls[0].1.as_deref(), Some("be brief"));
        assert!(search.queries().is_empty());
    }

    #[tokio::test]
    async fn web_search_replaces_final_turn_with_grounded_prompt() {
        let completions = Arc::new(FakeCompletion::answering("the president is..."));
        let search = Arc::new(FakeSearch::yielding("snippet one\n---\nsnippet two"));
        let synth = synthesizer(
            completions.clone(),
            search.clone(),
            FakeRewriter(Some("current president of France 2026".to_string())),
            FakeTimezones(None),
        );

        let turns = history();
        let question = "who is the current president of France";
        let answer = synth
            .synthesize(RouterDecision::WebSearch, question, &turns, None)
            .await
            .unwrap();

        assert_eq!(answer, "the president is...");
        // The rewritten query is what reaches the gateway.
        assert_eq!(search.queries(), vec!["current president of France 2026"]);

        let calls = completions.calls();
        assert_eq!(calls.len(), 1);
        let sent = &calls[0].0;
        // Same number of turns: the final one was replaced, not appended to.
        assert_eq!(sent.len(), turns.len());
        assert_eq!(sent[..turns.len() - 1], turns[..turns.len() - 1]);
        let last = &sent[sent.len() - 1].text;
        assert!(last.contains("snippet one"));
        assert!(last.contains(question));
    }

    #[tokio::test]
    async fn web_search_uses_literal_query_when_rewrite_fails() {
        let completions = Arc::new(FakeCompletion::answering("ok"));
        let search = Arc::new(FakeSearch::yielding("snippet"));
        let synth = synthesizer(
            completions,
            search.clone(),
            FakeRewriter(None),
            FakeTimezones(None),
        );

        synth
            .synthesize(RouterDecision::WebSearch, "latest rust release", &history(), None)
            .await
            .unwrap();

        assert_eq!(search.queries(), vec!["latest rust release"]);
    }

    #[tokio::test]
    async fn empty_search_results_fall_back_to_general_knowledge() {
        let completions = Arc::new(FakeCompletion::answering("from what I know..."));
        let search = Arc::new(FakeSearch::empty());
        let synth = synthesizer(
            completions.clone(),
            search,
            FakeRewriter(None),
            FakeTimezones(None),
        );

        let turns = history();
        let answer = synth
            .synthesize(RouterDecision::WebSearch, "who is the current president of France", &turns, Some("sys"))
            .await
            .unwrap();

        assert_eq!(answer, "from what I know...");
        let calls = completions.calls();
        assert_eq!(calls.len(), 1);
        // Fallback sends the original, unmodified history.
        assert_eq!(calls[0].0, turns);
        assert_eq!(calls[0].1.as_deref(), Some("sys"));
    }

    #[tokio::test]
    async fn date_time_uses_extracted_zone_not_default() {
        let completions = Arc::new(FakeCompletion::failing());
        let search = Arc::new(FakeSearch::yielding("unused"));
        let synth = synthesizer(
            completions,
            search.clone(),
            FakeRewriter(None),
            FakeTimezones(Some(chrono_tz::Europe::London)),
        );

        let answer = synth
            .synthesize(
                RouterDecision::DateTimeQuery,
                "what time is it in london",
                &[Turn::user("what time is it in london")],
                None,
            )
            .await
            .unwrap();

        // Noon UTC is 1:00 PM in London during BST.
        assert!(answer.contains("1:00 PM"), "got: {answer}");
        assert!(answer.contains("Europe/London"), "got: {answer}");
        assert!(answer.contains("Wednesday, August 5, 2026"), "got: {answer}");
        assert!(search.queries().is_empty());
    }

    #[tokio::test]
    async fn date_time_falls_back_to_default_zone() {
        let completions = Arc::new(FakeCompletion::failing());
        let search = Arc::new(FakeSearch::empty());
        let synth = synthesizer(completions, search, FakeRewriter(None), FakeTimezones(None));

        let answer = synth
            .synthesize(
                RouterDecision::DateTimeQuery,
                "what time is it",
                &[Turn::user("what time is it")],
                None,
            )
            .await
            .unwrap();

        assert!(answer.contains("12:00 PM"), "got: {answer}");
        assert!(answer.contains("UTC"), "got: {answer}");
    }

    #[tokio::test]
    async fn date_time_phrases_the_fact_through_the_model_when_available() {
        let completions = Arc::new(FakeCompletion::answering(
            "Right now it's 1:00 PM over in London.",
        ));
        let search = Arc::new(FakeSearch::empty());
        let synth = synthesizer(
            completions.clone(),
            search,
            FakeRewriter(None),
            FakeTimezones(Some(chrono_tz::Europe::London)),
        );

        let answer = synth
            .synthesize(
                RouterDecision::DateTimeQuery,
                "what time is it in london",
                &[Turn::user("what time is it in london")],
                None,
            )
            .await
            .unwrap();

        assert_eq!(answer, "Right now it's 1:00 PM over in London.");
        // The phrasing request embeds the clock-derived fact.
        let calls = completions.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].0[0].text.contains("1:00 PM"));
    }

    #[tokio::test]
    async fn final_completion_failure_surfaces_to_the_caller() {
        let completions = Arc::new(FakeCompletion::failing());
        let search = Arc::new(FakeSearch::yielding("snippet"));
        let synth = synthesizer(completions, search, FakeRewriter(None), FakeTimezones(None));

        let result = synth
            .synthesize(RouterDecision::WebSearch, "latest news", &history(), None)
            .await;

        assert!(matches!(result, Err(GatewayError::Upstream(_))));
    }
}
