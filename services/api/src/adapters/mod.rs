pub mod db;
pub mod delegated;
pub mod gemini;
pub mod search;
pub mod title_llm;

pub use db::DbAdapter;
pub use delegated::{DelegatedClassifier, DelegatedQueryRewriter, DelegatedTimezoneLookup};
pub use gemini::GeminiGateway;
pub use search::{GoogleSearchGateway, SearchCredentials};
pub use title_llm::DelegatedTitleAdapter;
