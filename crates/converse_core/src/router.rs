//! crates/converse_core/src/router.rs
//!
//! The keyword-based query router. Given the latest user utterance it picks
//! one of three intents: answer a current date/time question locally, answer
//! with live web-search context, or hold a general conversation.
//!
//! Precedence is fixed: web-search beats date-time beats general. A query
//! like "who is president today" must resolve to a web search even though it
//! also carries a date/time keyword.

use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

use crate::domain::RouterDecision;
use crate::ports::Classifier;

struct RouterPatterns {
    date_time: Vec<Regex>,
    historical: Vec<Regex>,
    current_info: Vec<Regex>,
}

static ROUTER_PATTERNS: LazyLock<RouterPatterns> = LazyLock::new(|| {
    let mk = |pats: &[&str]| -> Vec<Regex> {
        pats.iter()
            .map(|p| Regex::new(p).expect("Invalid router regex"))
            .collect()
    };

    RouterPatterns {
        // Asking for the current local date, day, or time.
        date_time: mk(&[
            r"(?i)\bdate\b",
            r"(?i)\bday\b",
            r"(?i)\btime\b",
            r"(?i)\btoday\b",
        ]),
        // Markers that the date/time keyword refers to the past, not the
        // current clock ("what was the date of the moon landing").
        historical: mk(&[
            r"(?i)\bwas\b",
            r"(?i)\bpast\b",
            r"(?i)\bhistory\b",
        ]),
        // Markers that the question needs current information from the web.
        current_info: mk(&[
            r"(?i)\bwho\s+is\b",
            r"(?i)\bwhat\s+is\b",
            r"(?i)\blatest\b",
            r"(?i)\bcurrent\b",
            r"(?i)\bnews\b",
            r"(?i)\bpresident\b",
            r"(?i)\belection\b",
        ]),
    }
});

fn matches_any(patterns: &[Regex], text: &str) -> bool {
    patterns.iter().any(|p| p.is_match(text))
}

/// Classifies an utterance with the fixed keyword sets. Pure and
/// deterministic; also used as the fallback behind the delegated classifier.
pub fn classify_utterance(latest_user_text: &str) -> RouterDecision {
    let text = latest_user_text.trim();
    if text.is_empty() {
        return RouterDecision::GeneralConversation;
    }

    let needs_current_info = matches_any(&ROUTER_PATTERNS.current_info, text);
    let is_date_time = matches_any(&ROUTER_PATTERNS.date_time, text);
    let is_historical = matches_any(&ROUTER_PATTERNS.historical, text);

    if needs_current_info {
        return RouterDecision::WebSearch;
    }
    if is_date_time {
        if is_historical {
            return RouterDecision::WebSearch;
        }
        return RouterDecision::DateTimeQuery;
    }
    RouterDecision::GeneralConversation
}

/// The deterministic `Classifier` implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicClassifier;

#[async_trait]
impl Classifier for HeuristicClassifier {
    async fn classify(&self, latest_user_text: &str) -> RouterDecision {
        classify_utterance(latest_user_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---- Date/time keywords ----

    #[test]
    fn test_what_time_is_it() {
        assert_eq!(classify_utterance("what time is it"), RouterDecision::DateTimeQuery);
    }

    #[test]
    fn test_time_in_a_city() {
        assert_eq!(
            classify_utterance("what time is it in london"),
            RouterDecision::DateTimeQuery
        );
    }

    #[test]
    fn test_todays_date() {
        assert_eq!(classify_utterance("tell me the date today"), RouterDecision::DateTimeQuery);
    }

    #[test]
    fn test_which_day() {
        assert_eq!(classify_utterance("which day is it"), RouterDecision::DateTimeQuery);
    }

    // ---- Web search wins over date/time ----

    #[test]
    fn test_president_today_prefers_search() {
        assert_eq!(
            classify_utterance("who is president today"),
            RouterDecision::WebSearch
        );
    }

    #[test]
    fn test_news_today_prefers_search() {
        assert_eq!(
            classify_utterance("any news today"),
            RouterDecision::WebSearch
        );
    }

    #[test]
    fn test_historical_date_prefers_search() {
        assert_eq!(
            classify_utterance("what was the date of the moon landing"),
            RouterDecision::WebSearch
        );
    }

    #[test]
    fn test_history_of_timekeeping_prefers_search() {
        assert_eq!(
            classify_utterance("the history of time zones"),
            RouterDecision::WebSearch
        );
    }

    // ---- Web search on its own markers ----

    #[test]
    fn test_current_president_of_france() {
        assert_eq!(
            classify_utterance("who is the current president of France"),
            RouterDecision::WebSearch
        );
    }

    #[test]
    fn test_latest_release() {
        assert_eq!(
            classify_utterance("latest linux kernel release"),
            RouterDecision::WebSearch
        );
    }

    #[test]
    fn test_election_results() {
        assert_eq!(
            classify_utterance("election results in Canada"),
            RouterDecision::WebSearch
        );
    }

    // ---- General conversation ----

    #[test]
    fn test_explain_linked_lists() {
        assert_eq!(
            classify_utterance("explain linked lists"),
            RouterDecision::GeneralConversation
        );
    }

    #[test]
    fn test_greeting() {
        assert_eq!(classify_utterance("hello there"), RouterDecision::GeneralConversation);
    }

    #[test]
    fn test_was_alone_is_not_a_search_trigger() {
        assert_eq!(
            classify_utterance("he was very tall"),
            RouterDecision::GeneralConversation
        );
    }

    #[test]
    fn test_keyword_inside_a_longer_word_does_not_match() {
        // "daytime" must not trip the "day" or "time" keywords.
        assert_eq!(
            classify_utterance("describe a daytime routine"),
            RouterDecision::GeneralConversation
        );
    }

    // ---- Edge cases ----

    #[test]
    fn test_empty_input() {
        assert_eq!(classify_utterance(""), RouterDecision::GeneralConversation);
    }

    #[test]
    fn test_whitespace_only_input() {
        assert_eq!(classify_utterance("   \n\t "), RouterDecision::GeneralConversation);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(classify_utterance("WHAT TIME IS IT"), RouterDecision::DateTimeQuery);
        assert_eq!(
            classify_utterance("Who Is The CURRENT president"),
            RouterDecision::WebSearch
        );
    }

    #[tokio::test]
    async fn test_heuristic_classifier_port() {
        let classifier = HeuristicClassifier;
        assert_eq!(
            classifier.classify("what time is it").await,
            RouterDecision::DateTimeQuery
        );
    }
}
