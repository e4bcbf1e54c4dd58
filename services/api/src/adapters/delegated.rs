//! services/api/src/adapters/delegated.rs
//!
//! Adapters that delegate small decisions to the model gateway: intent
//! classification, search-query rewriting, and timezone extraction. Each one
//! swallows its own failures and falls back to a safe default, so none of
//! them can ever fail the overall request.

use async_trait::async_trait;
use chrono_tz::Tz;
use converse_core::domain::RouterDecision;
use converse_core::ports::{
    Classifier, CompletionService, QueryRewriteService, TimezoneLookup,
};
use converse_core::router::HeuristicClassifier;
use converse_core::Turn;
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

const CLASSIFY_INSTRUCTION: &str = "You are a query classifier. Decide which tool answers the \
user's message best and respond with only a JSON object of the form \
{\"tool_to_use\": \"...\"}. The value must be exactly one of: \"date_time_query\" (the user asks \
for the current local date, day, or time), \"web_search\" (the user needs current information \
from the web), or \"general_conversation\" (everything else). Do not provide any explanations.";

const REWRITE_INSTRUCTION: &str = "You are an expert at crafting effective web search queries. \
Based on the user's prompt, generate a concise and relevant search query that will find the most \
accurate and up-to-date information. Return only the search query text.";

const TIMEZONE_INSTRUCTION: &str = "Extract the IANA timezone for any place named in the user's \
message. Respond with only the zone name, for example Europe/London. If no place is mentioned, \
respond with only the word NONE. Do not provide any explanations.";

//=========================================================================================
// Delegated Classifier
//=========================================================================================

/// A `Classifier` that asks the model for a single-token JSON verdict and
/// falls back to the deterministic keyword router when the call fails, times
/// out, or returns unparseable output.
pub struct DelegatedClassifier {
    completions: Arc<dyn CompletionService>,
    fallback: HeuristicClassifier,
}

impl DelegatedClassifier {
    pub fn new(completions: Arc<dyn CompletionService>) -> Self {
        Self {
            completions,
            fallback: HeuristicClassifier,
        }
    }
}

#[async_trait]
impl Classifier for DelegatedClassifier {
    async fn classify(&self, latest_user_text: &str) -> RouterDecision {
        if latest_user_text.trim().is_empty() {
            return RouterDecision::GeneralConversation;
        }

        let request = vec![Turn::user(latest_user_text)];
        match self
            .completions
            .complete(&request, Some(CLASSIFY_INSTRUCTION))
            .await
        {
            Ok(reply) => match parse_verdict(&reply) {
                Some(decision) => decision,
                None => {
                    warn!("Classifier verdict was unparseable; using keyword routing");
                    self.fallback.classify(latest_user_text).await
                }
            },
            Err(e) => {
                warn!("Classifier call failed ({}); using keyword routing", e);
                self.fallback.classify(latest_user_text).await
            }
        }
    }
}

#[derive(Deserialize)]
struct Verdict {
    tool_to_use: String,
}

/// Parses the classification verdict, tolerating code fences and surrounding
/// prose around the JSON object.
fn parse_verdict(reply: &str) -> Option<RouterDecision> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if end < start {
        return None;
    }

    let verdict: Verdict = serde_json::from_str(&reply[start..=end]).ok()?;
    match verdict.tool_to_use.trim() {
        "date_time_query" => Some(RouterDecision::DateTimeQuery),
        "web_search" => Some(RouterDecision::WebSearch),
        "general_conversation" => Some(RouterDecision::GeneralConversation),
        _ => None,
    }
}

//=========================================================================================
// Delegated Query Rewriter
//=========================================================================================

/// Rewrites the user's text into a sharper search query; `None` on any
/// failure, in which case the caller searches with the literal text.
pub struct DelegatedQueryRewriter {
    completions: Arc<dyn CompletionService>,
}

impl DelegatedQueryRewriter {
    pub fn new(completions: Arc<dyn CompletionService>) -> Self {
        Self { completions }
    }
}

#[async_trait]
impl QueryRewriteService for DelegatedQueryRewriter {
    async fn rewrite(&self, text: &str) -> Option<String> {
        let request = vec![Turn::user(text)];
        match self
            .completions
            .complete(&request, Some(REWRITE_INSTRUCTION))
            .await
        {
            Ok(reply) => {
                let query = reply.trim().trim_matches('"').trim();
                if query.is_empty() {
                    None
                } else {
                    Some(query.to_string())
                }
            }
            Err(e) => {
                warn!("Query rewrite failed ({}); searching with the literal text", e);
                None
            }
        }
    }
}

//=========================================================================================
// Delegated Timezone Lookup
//=========================================================================================

/// Extracts an IANA timezone mentioned in the utterance; `None` when nothing
/// is mentioned or the extraction fails, in which case the caller uses the
/// configured default zone.
pub struct DelegatedTimezoneLookup {
    completions: Arc<dyn CompletionService>,
}

impl DelegatedTimezoneLookup {
    pub fn new(completions: Arc<dyn CompletionService>) -> Self {
        Self { completions }
    }
}

#[async_trait]
impl TimezoneLookup for DelegatedTimezoneLookup {
    async fn extract(&self, text: &str) -> Option<Tz> {
        let request = vec![Turn::user(text)];
        match self
            .completions
            .complete(&request, Some(TIMEZONE_INSTRUCTION))
            .await
        {
            Ok(reply) => parse_timezone(&reply),
            Err(e) => {
                warn!("Timezone extraction failed ({}); using the default zone", e);
                None
            }
        }
    }
}

fn parse_timezone(reply: &str) -> Option<Tz> {
    let name = reply.trim().trim_matches('"').trim_matches('`').trim();
    if name.is_empty() || name.eq_ignore_ascii_case("none") {
        return None;
    }
    name.parse::<Tz>().ok()
}
