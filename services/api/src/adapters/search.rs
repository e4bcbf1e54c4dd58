//! services/api/src/adapters/search.rs
//!
//! This module contains the web-search gateway adapter. It implements the
//! `WebSearchService` port against the Google Custom Search API.
//!
//! Search is a best-effort enhancement: missing credentials, provider
//! failures, and unparseable bodies all yield an empty context so the chat
//! pipeline can fall back to a general-knowledge answer.

use async_trait::async_trait;
use converse_core::domain::SearchContext;
use converse_core::ports::{GatewayResult, WebSearchService};
use reqwest::Client;
use serde_json::Value;
use tracing::warn;

/// At most this many result snippets are kept, to bound prompt size.
const MAX_SNIPPETS: usize = 5;

/// Visible delimiter between snippets inside the context block.
const SNIPPET_DELIMITER: &str = "\n---\n";

const DEFAULT_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

/// API key and engine id for the Custom Search endpoint.
#[derive(Clone)]
pub struct SearchCredentials {
    pub api_key: String,
    pub engine_id: String,
}

/// An adapter that implements `WebSearchService` using Google Custom Search.
#[derive(Clone)]
pub struct GoogleSearchGateway {
    client: Client,
    credentials: Option<SearchCredentials>,
    endpoint: String,
}

impl GoogleSearchGateway {
    /// Creates a new `GoogleSearchGateway`. Pass `None` credentials to run
    /// without search; every query then resolves to an empty context.
    pub fn new(client: Client, credentials: Option<SearchCredentials>) -> Self {
        Self {
            client,
            credentials,
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    /// Overrides the search endpoint (used by local setups and tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl WebSearchService for GoogleSearchGateway {
    async fn search(&self, query: &str) -> GatewayResult<SearchContext> {
        let Some(credentials) = &self.credentials else {
            warn!("Search credentials are not configured; returning empty context");
            return Ok(SearchContext::empty());
        };

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("key", credentials.api_key.as_str()),
                ("cx", credentials.engine_id.as_str()),
                ("q", query),
            ])
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                warn!("Search request failed: {}", e);
                return Ok(SearchContext::empty());
            }
        };

        if !response.status().is_success() {
            warn!("Search provider returned HTTP {}", response.status().as_u16());
            return Ok(SearchContext::empty());
        }

        match response.json::<Value>().await {
            Ok(payload) => Ok(condense_items(&payload)),
            Err(e) => {
                warn!("Search response body was unparseable: {}", e);
                Ok(SearchContext::empty())
            }
        }
    }
}

/// Concatenates the top result snippets into one context block.
fn condense_items(root: &Value) -> SearchContext {
    let Some(items) = root.get("items").and_then(|items| items.as_array()) else {
        return SearchContext::empty();
    };

    let snippets: Vec<&str> = items
        .iter()
        .filter_map(|item| item.get("snippet").and_then(|s| s.as_str()))
        .filter(|s| !s.trim().is_empty())
        .take(MAX_SNIPPETS)
        .collect();

    if snippets.is_empty() {
        SearchContext::empty()
    } else {
        SearchContext::new(snippets.join(SNIPPET_DELIMITER))
    }
}
