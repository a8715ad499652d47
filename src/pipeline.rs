use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};
use uuid::Uuid;

use crate::cache::KvCache;
use crate::error::{ApiError, ApiResult};
use crate::models::{Chatroom, MessageExchange, User};
use crate::queue::{TaskQueue, TaskState};
use crate::quota::{ActionKind, Admission, QuotaLedger};
use crate::store::ConversationStore;

/// Chatroom directory entries are served from cache for this long unless a
/// creation invalidates them first.
pub const DIRECTORY_TTL: Duration = Duration::from_secs(600);

/// Single entry point gluing identity resolution, quota, ownership checks
/// and task dispatch. Constructed once at startup with injected handles.
pub struct PromptPipeline {
    store: Arc<dyn ConversationStore>,
    cache: KvCache,
    queue: Arc<TaskQueue>,
    ledger: QuotaLedger,
}

impl PromptPipeline {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        cache: KvCache,
        queue: Arc<TaskQueue>,
        ledger: QuotaLedger,
    ) -> Self {
        Self {
            store,
            cache,
            queue,
            ledger,
        }
    }

    async fn resolve_user(&self, user_id: i64) -> ApiResult<User> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or_else(|| ApiError::not_found("User"))
    }

    /// Resolves a chatroom and checks it belongs to the caller. Foreign
    /// rooms are reported as NotFound so external ids stay unprobeable.
    async fn resolve_owned_chatroom(&self, user: &User, external_id: &str) -> ApiResult<Chatroom> {
        let chatroom = self
            .store
            .chatroom_by_external_id(external_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Chatroom"))?;
        if chatroom.user_id != user.id {
            return Err(ApiError::not_found("Chatroom"));
        }
        Ok(chatroom)
    }

    async fn admit(&self, user: &User, action: ActionKind) -> ApiResult<()> {
        match self.ledger.check_and_admit(user, action).await? {
            Admission::Admit => Ok(()),
            Admission::Deny(reason) => {
                info!(user_id = user.id, ?action, "denied: {}", reason);
                Err(ApiError::QuotaExceeded)
            }
        }
    }

    /// Accepts a prompt and returns its task handle immediately. No
    /// synchronous database write happens here; the worker persists the
    /// exchange once the answer is known.
    pub async fn submit_prompt(
        &self,
        user_id: i64,
        chatroom_external_id: &str,
        prompt: &str,
    ) -> ApiResult<Uuid> {
        let user = self.resolve_user(user_id).await?;
        let chatroom = self.resolve_owned_chatroom(&user, chatroom_external_id).await?;
        self.admit(&user, ActionKind::SubmitPrompt).await?;

        let task_id = self.queue.enqueue(prompt, chatroom.id);
        info!(user_id, chatroom = %chatroom.chatroom_id, %task_id, "prompt enqueued");
        Ok(task_id)
    }

    pub fn task_status(&self, task_id: Uuid) -> TaskState {
        self.queue.poll(task_id)
    }

    pub async fn create_chatroom(&self, user_id: i64) -> ApiResult<Chatroom> {
        let user = self.resolve_user(user_id).await?;
        self.admit(&user, ActionKind::CreateChatroom).await?;

        let external_id = Chatroom::generate_external_id();
        let chatroom = self.store.create_chatroom(user.id, &external_id).await?;

        // The directory listing is stale now; drop it so the next read
        // repopulates from the store.
        self.cache.delete(&directory_key(user_id)).await;
        info!(user_id, chatroom = %chatroom.chatroom_id, "chatroom created");
        Ok(chatroom)
    }

    /// Cache-first read-through of the user's chatroom directory.
    pub async fn list_chatrooms(&self, user_id: i64) -> ApiResult<Vec<String>> {
        let key = directory_key(user_id);
        if let Some(cached) = self.cache.get(&key).await {
            if let Ok(ids) = serde_json::from_str::<Vec<String>>(&cached) {
                debug!(user_id, "chatroom directory served from cache");
                return Ok(ids);
            }
        }

        let user = self.resolve_user(user_id).await?;
        let ids: Vec<String> = self
            .store
            .chatrooms_for_user(user.id)
            .await?
            .into_iter()
            .map(|c| c.chatroom_id)
            .collect();

        let encoded = serde_json::to_string(&ids).map_err(anyhow::Error::from)?;
        self.cache.set(&key, encoded, DIRECTORY_TTL).await;
        Ok(ids)
    }

    /// Exchanges for an owned chatroom, most recent request first. An empty
    /// history is a success, not an error.
    pub async fn get_history(
        &self,
        user_id: i64,
        chatroom_external_id: &str,
    ) -> ApiResult<Vec<MessageExchange>> {
        let user = self.resolve_user(user_id).await?;
        let chatroom = self.resolve_owned_chatroom(&user, chatroom_external_id).await?;
        let history = self.store.history_for_chatroom(chatroom.id).await?;
        Ok(history)
    }
}

fn directory_key(user_id: i64) -> String {
    format!("chatrooms:{}", user_id)
}
