use std::sync::Arc;

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod pipeline;
pub mod provider;
pub mod queue;
pub mod quota;
pub mod routes;
pub mod store;
pub mod types;

use cache::KvCache;
use config::AppConfig;
use pipeline::PromptPipeline;
use store::ConversationStore;

/// Process-wide handles, initialized once in `main` and torn down on
/// shutdown. Everything the routes touch is injected through here.
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn ConversationStore>,
    pub cache: KvCache,
    pub pipeline: PromptPipeline,
    pub stripe_client: stripe::Client,
}
