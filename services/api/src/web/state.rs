//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use converse_core::ports::{ChatStore, Classifier, IdentityStore, TitleService};
use converse_core::synthesizer::Synthesizer;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all
/// handlers. Every collaborator is a constructed dependency behind a port
/// trait, so the pipeline is testable without network access.
#[derive(Clone)]
pub struct AppState {
    pub chats: Arc<dyn ChatStore>,
    pub identity: Arc<dyn IdentityStore>,
    pub classifier: Arc<dyn Classifier>,
    pub synthesizer: Arc<Synthesizer>,
    pub titles: Arc<dyn TitleService>,
    pub config: Arc<Config>,
}
