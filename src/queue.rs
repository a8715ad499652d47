use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::sync::Cache;
use moka::Expiry;
use tokio::sync::mpsc;
use uuid::Uuid;
use tracing::{error, warn};

use crate::provider::GenerationProvider;
use crate::store::ConversationStore;

/// Finished handles stay pollable this long after reaching a terminal
/// state, then fall out of the map. In-flight handles never expire.
pub const TASK_RETENTION: Duration = Duration::from_secs(300);

/// Execution state of one enqueued prompt. Transitions are monotonic:
/// Pending -> Running -> Succeeded | Failed, never back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Running,
    Succeeded(String),
    Failed(String),
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Succeeded(_) | TaskState::Failed(_))
    }
}

struct Job {
    id: Uuid,
    prompt: String,
    chat_id: i64,
}

/// Expiry policy for the status map: terminal entries are garbage collected
/// after the retention window, in-flight ones are kept indefinitely.
struct TerminalRetention(Duration);

impl Expiry<Uuid, TaskState> for TerminalRetention {
    fn expire_after_create(
        &self,
        _key: &Uuid,
        value: &TaskState,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.is_terminal().then_some(self.0)
    }

    fn expire_after_update(
        &self,
        _key: &Uuid,
        value: &TaskState,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.is_terminal().then_some(self.0)
    }
}

/// Decouples prompt answering from the request cycle. `enqueue` returns a
/// handle immediately; a pool of workers pulls jobs off a shared channel,
/// calls the provider, and persists the pair through the queue's own store
/// handle. Handles live in a volatile in-process map: they do not survive a
/// restart, terminal ones are dropped after `TASK_RETENTION`, and only the
/// conversation store is the durable record.
pub struct TaskQueue {
    tx: mpsc::UnboundedSender<Job>,
    statuses: Cache<Uuid, TaskState>,
}

impl TaskQueue {
    /// Spawns `workers` executors sharing one receiver. The store handle
    /// passed here belongs to the workers alone; the request-serving path
    /// never lends the queue its own session.
    pub fn start(
        workers: usize,
        provider: Arc<dyn GenerationProvider>,
        store: Arc<dyn ConversationStore>,
    ) -> Arc<Self> {
        Self::start_with_retention(workers, provider, store, TASK_RETENTION)
    }

    pub fn start_with_retention(
        workers: usize,
        provider: Arc<dyn GenerationProvider>,
        store: Arc<dyn ConversationStore>,
        retention: Duration,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel::<Job>();
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let statuses: Cache<Uuid, TaskState> = Cache::builder()
            .max_capacity(100_000)
            .expire_after(TerminalRetention(retention))
            .build();

        for _ in 0..workers.max(1) {
            let rx = rx.clone();
            let provider = provider.clone();
            let store = store.clone();
            let statuses = statuses.clone();

            tokio::spawn(async move {
                loop {
                    let job = {
                        let mut rx = rx.lock().await;
                        rx.recv().await
                    };
                    let Some(job) = job else { break };

                    set_state(&statuses, job.id, TaskState::Running);

                    // A provider failure is not a failed task: the error
                    // becomes the visible answer so the conversation is
                    // never left silently incomplete.
                    let answer = match provider.generate(&job.prompt).await {
                        Ok(text) => text,
                        Err(e) => {
                            warn!(task_id = %job.id, "provider call failed: {}", e);
                            format!("[assistant error] {}", e)
                        }
                    };

                    let state = match store
                        .record_exchange(job.chat_id, &job.prompt, &answer)
                        .await
                    {
                        Ok(_) => TaskState::Succeeded(answer),
                        Err(e) => {
                            error!(task_id = %job.id, "failed to store exchange: {:?}", e);
                            TaskState::Failed("failed to store answer".to_string())
                        }
                    };
                    set_state(&statuses, job.id, state);
                }
            });
        }

        Arc::new(Self { tx, statuses })
    }

    /// Returns a task handle without waiting on the provider.
    pub fn enqueue(&self, prompt: &str, chat_id: i64) -> Uuid {
        let id = Uuid::new_v4();
        set_state(&self.statuses, id, TaskState::Pending);

        let job = Job {
            id,
            prompt: prompt.to_string(),
            chat_id,
        };
        if self.tx.send(job).is_err() {
            // Worker pool is gone; the handle stays Pending and the caller
            // sees it as such. Only happens during shutdown.
            error!(task_id = %id, "task queue has no workers");
        }
        id
    }

    /// Idempotent, side-effect-free status read. Unknown ids report as
    /// Pending, matching broker semantics where a handle may not have been
    /// observed yet; a handle past its retention window reads the same way.
    pub fn poll(&self, id: Uuid) -> TaskState {
        self.statuses.get(&id).unwrap_or(TaskState::Pending)
    }
}

fn set_state(statuses: &Cache<Uuid, TaskState>, id: Uuid, state: TaskState) {
    // Terminal states are final; a late writer cannot demote them. Each
    // handle has at most one writer at a time (enqueue, then its worker),
    // so the read-then-insert does not race.
    if statuses.get(&id).map(|s| s.is_terminal()).unwrap_or(false) {
        return;
    }
    statuses.insert(id, state);
}
