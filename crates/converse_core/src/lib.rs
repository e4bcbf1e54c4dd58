pub mod domain;
pub mod ports;
pub mod router;
pub mod synthesizer;

pub use domain::{
    ChatSummary, Role, RouterDecision, SearchContext, StoredTurn, Turn, User, UserCredentials,
    PLACEHOLDER_TITLE,
};
pub use ports::{
    ChatStore, Classifier, Clock, CompletionService, GatewayError, GatewayResult, IdentityStore,
    QueryRewriteService, StoreError, StoreResult, SystemClock, TimezoneLookup, TitleService,
    WebSearchService,
};
pub use router::{classify_utterance, HeuristicClassifier};
pub use synthesizer::Synthesizer;
