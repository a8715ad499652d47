use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Local, NaiveDate, Utc};
use uuid::Uuid;

use parley::cache::KvCache;
use parley::error::ApiError;
use parley::models::{Chatroom, MessageExchange, NewUser, SubscriptionTier, User};
use parley::pipeline::PromptPipeline;
use parley::provider::{GenerationProvider, ProviderError};
use parley::queue::{TaskQueue, TaskState};
use parley::quota::{QuotaLedger, DAILY_PROMPT_LIMIT};
use parley::store::ConversationStore;

#[derive(Default)]
struct MemStore {
    users: Mutex<Vec<User>>,
    chatrooms: Mutex<Vec<Chatroom>>,
    history: Mutex<Vec<MessageExchange>>,
    next_id: AtomicI64,
    write_seq: AtomicI64,
}

impl MemStore {
    fn next(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl ConversationStore for MemStore {
    async fn get_user(&self, id: i64) -> Result<Option<User>> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn get_user_by_mobile(&self, mobile: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.mobile == mobile)
            .cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned())
    }

    async fn create_user(&self, new: NewUser) -> Result<User> {
        let user = User {
            id: self.next(),
            mobile: new.mobile,
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            subscription_tier: SubscriptionTier::Basic,
            subscription_expires_at: None,
            is_active: true,
            is_verified: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.users.lock().unwrap().push(user.clone());
        Ok(user)
    }

    async fn update_password(&self, user_id: i64, password_hash: &str) -> Result<()> {
        for user in self.users.lock().unwrap().iter_mut() {
            if user.id == user_id {
                user.password_hash = Some(password_hash.to_string());
            }
        }
        Ok(())
    }

    async fn set_subscription_tier(&self, user_id: i64, tier: SubscriptionTier) -> Result<()> {
        for user in self.users.lock().unwrap().iter_mut() {
            if user.id == user_id {
                user.subscription_tier = tier;
            }
        }
        Ok(())
    }

    async fn create_chatroom(&self, user_id: i64, external_id: &str) -> Result<Chatroom> {
        let chatroom = Chatroom {
            id: self.next(),
            chatroom_id: external_id.to_string(),
            user_id,
            created_at: Utc::now(),
        };
        self.chatrooms.lock().unwrap().push(chatroom.clone());
        Ok(chatroom)
    }

    async fn chatroom_by_external_id(&self, external_id: &str) -> Result<Option<Chatroom>> {
        Ok(self
            .chatrooms
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.chatroom_id == external_id)
            .cloned())
    }

    async fn chatrooms_for_user(&self, user_id: i64) -> Result<Vec<Chatroom>> {
        Ok(self
            .chatrooms
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn record_exchange(
        &self,
        chat_id: i64,
        request: &str,
        response: &str,
    ) -> Result<MessageExchange> {
        // Strictly increasing timestamps so ordering assertions are
        // deterministic even when writes land within one millisecond.
        let seq = self.write_seq.fetch_add(1, Ordering::SeqCst);
        let at = Utc::now() + ChronoDuration::milliseconds(seq);
        let exchange = MessageExchange {
            id: self.next(),
            chat_id,
            request_message: request.to_string(),
            response_message: Some(response.to_string()),
            created_at: at,
            updated_at: at,
        };
        self.history.lock().unwrap().push(exchange.clone());
        Ok(exchange)
    }

    async fn history_for_chatroom(&self, chat_id: i64) -> Result<Vec<MessageExchange>> {
        let mut rows: Vec<MessageExchange> = self
            .history
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.chat_id == chat_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn count_exchanges_today(&self, user_id: i64, day: NaiveDate) -> Result<i64> {
        let chatrooms = self.chatrooms.lock().unwrap();
        let owned: Vec<i64> = chatrooms
            .iter()
            .filter(|c| c.user_id == user_id)
            .map(|c| c.id)
            .collect();
        let count = self
            .history
            .lock()
            .unwrap()
            .iter()
            .filter(|e| {
                owned.contains(&e.chat_id)
                    && e.created_at.with_timezone(&Local).date_naive() == day
            })
            .count();
        Ok(count as i64)
    }
}

struct StubProvider {
    reply: Result<String, String>,
    delay: Duration,
}

impl StubProvider {
    fn answering(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(text.to_string()),
            delay: Duration::ZERO,
        })
    }

    fn failing(detail: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(detail.to_string()),
            delay: Duration::ZERO,
        })
    }
}

#[async_trait]
impl GenerationProvider for StubProvider {
    async fn generate(&self, _prompt: &str) -> Result<String, ProviderError> {
        tokio::time::sleep(self.delay).await;
        self.reply.clone().map_err(ProviderError::Api)
    }
}

fn pipeline_with(provider: Arc<StubProvider>) -> (Arc<MemStore>, PromptPipeline) {
    let store = Arc::new(MemStore::default());
    let cache = KvCache::new(1024);
    let queue = TaskQueue::start(2, provider, store.clone());
    let ledger = QuotaLedger::new(store.clone(), DAILY_PROMPT_LIMIT);
    let pipeline = PromptPipeline::new(store.clone(), cache, queue, ledger);
    (store, pipeline)
}

async fn new_user(store: &MemStore, mobile: &str) -> User {
    store
        .create_user(NewUser {
            mobile: mobile.to_string(),
            name: None,
            email: None,
            password_hash: None,
        })
        .await
        .unwrap()
}

async fn wait_done(pipeline: &PromptPipeline, task_id: Uuid) -> TaskState {
    for _ in 0..200 {
        let state = pipeline.task_status(task_id);
        if state.is_terminal() {
            return state;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("task never completed");
}

#[tokio::test]
async fn basic_user_hits_the_daily_ceiling() {
    let (store, pipeline) = pipeline_with(StubProvider::answering("hello"));
    let user = new_user(&store, "9876543210").await;
    let room = pipeline.create_chatroom(user.id).await.unwrap();

    for i in 0..DAILY_PROMPT_LIMIT {
        let task_id = pipeline
            .submit_prompt(user.id, &room.chatroom_id, &format!("prompt {}", i))
            .await
            .unwrap();
        wait_done(&pipeline, task_id).await;
    }

    let denied = pipeline
        .submit_prompt(user.id, &room.chatroom_id, "one too many")
        .await;
    assert!(matches!(denied, Err(ApiError::QuotaExceeded)));

    // The shared counter also gates chatroom creation.
    assert!(matches!(
        pipeline.create_chatroom(user.id).await,
        Err(ApiError::QuotaExceeded)
    ));
}

#[tokio::test]
async fn pro_user_is_never_rate_limited() {
    let (store, pipeline) = pipeline_with(StubProvider::answering("hello"));
    let user = new_user(&store, "9876543210").await;
    let room = pipeline.create_chatroom(user.id).await.unwrap();
    store
        .set_subscription_tier(user.id, SubscriptionTier::Pro)
        .await
        .unwrap();

    for i in 0..(DAILY_PROMPT_LIMIT * 2) {
        let task_id = pipeline
            .submit_prompt(user.id, &room.chatroom_id, &format!("prompt {}", i))
            .await
            .unwrap();
        wait_done(&pipeline, task_id).await;
    }
}

#[tokio::test]
async fn upgrade_lifts_an_exhausted_quota() {
    let (store, pipeline) = pipeline_with(StubProvider::answering("hello"));
    let user = new_user(&store, "9876543210").await;
    let room = pipeline.create_chatroom(user.id).await.unwrap();

    for _ in 0..DAILY_PROMPT_LIMIT {
        let task_id = pipeline
            .submit_prompt(user.id, &room.chatroom_id, "hi")
            .await
            .unwrap();
        wait_done(&pipeline, task_id).await;
    }
    assert!(matches!(
        pipeline.submit_prompt(user.id, &room.chatroom_id, "hi").await,
        Err(ApiError::QuotaExceeded)
    ));

    store
        .set_subscription_tier(user.id, SubscriptionTier::Pro)
        .await
        .unwrap();
    assert!(pipeline
        .submit_prompt(user.id, &room.chatroom_id, "hi")
        .await
        .is_ok());
}

#[tokio::test]
async fn submit_does_not_wait_for_the_provider() {
    let provider = Arc::new(StubProvider {
        reply: Ok("slow answer".to_string()),
        delay: Duration::from_millis(300),
    });
    let store = Arc::new(MemStore::default());
    let queue = TaskQueue::start(2, provider, store.clone());
    let ledger = QuotaLedger::new(store.clone(), DAILY_PROMPT_LIMIT);
    let pipeline = PromptPipeline::new(store.clone(), KvCache::new(64), queue, ledger);

    let user = new_user(&store, "9876543210").await;
    let room = pipeline.create_chatroom(user.id).await.unwrap();

    let started = std::time::Instant::now();
    let task_id = pipeline
        .submit_prompt(user.id, &room.chatroom_id, "take your time")
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_millis(100));

    // Terminal exactly once, and the state sticks.
    let done = wait_done(&pipeline, task_id).await;
    assert_eq!(done, TaskState::Succeeded("slow answer".to_string()));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(pipeline.task_status(task_id), done);
}

#[tokio::test]
async fn history_is_newest_first_and_stable() {
    let (store, pipeline) = pipeline_with(StubProvider::answering("ok"));
    let user = new_user(&store, "9876543210").await;
    let room = pipeline.create_chatroom(user.id).await.unwrap();

    for prompt in ["first", "second", "third"] {
        let task_id = pipeline
            .submit_prompt(user.id, &room.chatroom_id, prompt)
            .await
            .unwrap();
        wait_done(&pipeline, task_id).await;
    }

    let history = pipeline.get_history(user.id, &room.chatroom_id).await.unwrap();
    let prompts: Vec<&str> = history.iter().map(|e| e.request_message.as_str()).collect();
    assert_eq!(prompts, vec!["third", "second", "first"]);

    let again = pipeline.get_history(user.id, &room.chatroom_id).await.unwrap();
    assert_eq!(
        again.iter().map(|e| e.id).collect::<Vec<_>>(),
        history.iter().map(|e| e.id).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn empty_history_is_a_success() {
    let (store, pipeline) = pipeline_with(StubProvider::answering("ok"));
    let user = new_user(&store, "9876543210").await;
    let room = pipeline.create_chatroom(user.id).await.unwrap();

    let history = pipeline.get_history(user.id, &room.chatroom_id).await.unwrap();
    assert!(history.is_empty());
}

#[tokio::test]
async fn directory_is_cached_until_a_creation_invalidates_it() {
    let (store, pipeline) = pipeline_with(StubProvider::answering("ok"));
    let user = new_user(&store, "9876543210").await;
    let room = pipeline.create_chatroom(user.id).await.unwrap();

    let first = pipeline.list_chatrooms(user.id).await.unwrap();
    assert_eq!(first, vec![room.chatroom_id.clone()]);

    // A write that bypasses the pipeline is invisible while the cache entry
    // lives.
    store.create_chatroom(user.id, "chatroom_backdoor").await.unwrap();
    let second = pipeline.list_chatrooms(user.id).await.unwrap();
    assert_eq!(second, first);

    // Creation through the pipeline drops the entry; the next read sees
    // everything.
    let third_room = pipeline.create_chatroom(user.id).await.unwrap();
    let third = pipeline.list_chatrooms(user.id).await.unwrap();
    assert_eq!(third.len(), 3);
    assert!(third.contains(&third_room.chatroom_id));
    assert!(third.contains(&"chatroom_backdoor".to_string()));
}

#[tokio::test]
async fn provider_failure_becomes_a_visible_answer() {
    let (store, pipeline) = pipeline_with(StubProvider::failing("upstream 503"));
    let user = new_user(&store, "9876543210").await;
    let room = pipeline.create_chatroom(user.id).await.unwrap();

    let task_id = pipeline
        .submit_prompt(user.id, &room.chatroom_id, "hi")
        .await
        .unwrap();
    let state = wait_done(&pipeline, task_id).await;

    let TaskState::Succeeded(answer) = state else {
        panic!("captured provider errors must terminate as answers");
    };
    assert!(answer.starts_with("[assistant error]"));

    // The exchange row is populated, never left with a null response.
    let history = pipeline.get_history(user.id, &room.chatroom_id).await.unwrap();
    assert_eq!(history.len(), 1);
    let response = history[0].response_message.as_deref().unwrap();
    assert!(response.starts_with("[assistant error]"));
    assert!(response.contains("upstream 503"));
}

#[tokio::test]
async fn chatroom_ids_are_distinct_and_listed() {
    let (store, pipeline) = pipeline_with(StubProvider::answering("ok"));
    let user = new_user(&store, "9876543210").await;

    let a = pipeline.create_chatroom(user.id).await.unwrap();
    let b = pipeline.create_chatroom(user.id).await.unwrap();
    assert_ne!(a.chatroom_id, b.chatroom_id);

    let listed = pipeline.list_chatrooms(user.id).await.unwrap();
    assert!(listed.contains(&a.chatroom_id));
    assert!(listed.contains(&b.chatroom_id));
}

#[tokio::test]
async fn unknown_rooms_and_users_are_not_found() {
    let (store, pipeline) = pipeline_with(StubProvider::answering("ok"));
    let user = new_user(&store, "9876543210").await;

    assert!(matches!(
        pipeline.submit_prompt(user.id, "nonexistent-room", "hi").await,
        Err(ApiError::NotFound(_))
    ));
    assert!(matches!(
        pipeline.submit_prompt(999, "nonexistent-room", "hi").await,
        Err(ApiError::NotFound(_))
    ));
}

#[tokio::test]
async fn foreign_chatrooms_are_reported_as_not_found() {
    let (store, pipeline) = pipeline_with(StubProvider::answering("ok"));
    let owner = new_user(&store, "9876543210").await;
    let intruder = new_user(&store, "9123456789").await;
    let room = pipeline.create_chatroom(owner.id).await.unwrap();

    assert!(matches!(
        pipeline
            .submit_prompt(intruder.id, &room.chatroom_id, "let me in")
            .await,
        Err(ApiError::NotFound(_))
    ));
    assert!(matches!(
        pipeline.get_history(intruder.id, &room.chatroom_id).await,
        Err(ApiError::NotFound(_))
    ));
}
