use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;

use super::ConversationStore;
use crate::models::{Chatroom, MessageExchange, NewUser, SubscriptionTier, User};

/// Production store over a connection pool. Every query checks its own
/// connection out of the pool, so worker writes never share a session with
/// request serving.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversationStore for PgStore {
    async fn get_user(&self, id: i64) -> Result<Option<User>> {
        User::get(&self.pool, id).await
    }

    async fn get_user_by_mobile(&self, mobile: &str) -> Result<Option<User>> {
        User::get_by_mobile(&self.pool, mobile).await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        User::get_by_email(&self.pool, email).await
    }

    async fn create_user(&self, new: NewUser) -> Result<User> {
        User::create(&self.pool, new).await
    }

    async fn update_password(&self, user_id: i64, password_hash: &str) -> Result<()> {
        User::update_password(&self.pool, user_id, password_hash).await
    }

    async fn set_subscription_tier(&self, user_id: i64, tier: SubscriptionTier) -> Result<()> {
        User::set_subscription_tier(&self.pool, user_id, tier).await
    }

    async fn create_chatroom(&self, user_id: i64, external_id: &str) -> Result<Chatroom> {
        Chatroom::create(&self.pool, user_id, external_id).await
    }

    async fn chatroom_by_external_id(&self, external_id: &str) -> Result<Option<Chatroom>> {
        Chatroom::get_by_external_id(&self.pool, external_id).await
    }

    async fn chatrooms_for_user(&self, user_id: i64) -> Result<Vec<Chatroom>> {
        Chatroom::list_for_user(&self.pool, user_id).await
    }

    async fn record_exchange(
        &self,
        chat_id: i64,
        request: &str,
        response: &str,
    ) -> Result<MessageExchange> {
        MessageExchange::record(&self.pool, chat_id, request, response).await
    }

    async fn history_for_chatroom(&self, chat_id: i64) -> Result<Vec<MessageExchange>> {
        MessageExchange::history_for_chat(&self.pool, chat_id).await
    }

    async fn count_exchanges_today(&self, user_id: i64, day: NaiveDate) -> Result<i64> {
        MessageExchange::count_on_day_for_user(&self.pool, user_id, day).await
    }
}
