use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::models::{Chatroom, MessageExchange, NewUser, SubscriptionTier, User};

mod postgres;
pub use postgres::PgStore;

/// Narrow interface the pipeline, ledger and worker depend on. The Postgres
/// implementation backs production; tests substitute in-memory fakes.
///
/// Handles are constructed once at startup and injected; nothing in the
/// crate reaches for a global connection.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn get_user(&self, id: i64) -> Result<Option<User>>;
    async fn get_user_by_mobile(&self, mobile: &str) -> Result<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn create_user(&self, new: NewUser) -> Result<User>;
    async fn update_password(&self, user_id: i64, password_hash: &str) -> Result<()>;
    async fn set_subscription_tier(&self, user_id: i64, tier: SubscriptionTier) -> Result<()>;

    async fn create_chatroom(&self, user_id: i64, external_id: &str) -> Result<Chatroom>;
    async fn chatroom_by_external_id(&self, external_id: &str) -> Result<Option<Chatroom>>;
    async fn chatrooms_for_user(&self, user_id: i64) -> Result<Vec<Chatroom>>;

    /// Persist one completed prompt/answer pair. Called only from worker
    /// execution, through the worker's own handle.
    async fn record_exchange(
        &self,
        chat_id: i64,
        request: &str,
        response: &str,
    ) -> Result<MessageExchange>;
    async fn history_for_chatroom(&self, chat_id: i64) -> Result<Vec<MessageExchange>>;
    async fn count_exchanges_today(&self, user_id: i64, day: NaiveDate) -> Result<i64>;
}
