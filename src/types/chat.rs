use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::MessageExchange;
use crate::queue::TaskState;

#[derive(Debug, Deserialize)]
pub struct SubmitPromptRequest {
    pub prompt: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitPromptResponse {
    pub task_id: Uuid,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct CreateChatroomResponse {
    pub chatroom_id: String,
}

#[derive(Debug, Serialize)]
pub struct TaskStatusResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl From<TaskState> for TaskStatusResponse {
    fn from(state: TaskState) -> Self {
        match state {
            TaskState::Pending => TaskStatusResponse {
                status: "pending",
                response: None,
                detail: None,
            },
            TaskState::Running => TaskStatusResponse {
                status: "processing",
                response: None,
                detail: None,
            },
            TaskState::Succeeded(response) => TaskStatusResponse {
                status: "done",
                response: Some(response),
                detail: None,
            },
            TaskState::Failed(detail) => TaskStatusResponse {
                status: "failed",
                response: None,
                detail: Some(detail),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    pub prompt: String,
    pub prompt_response: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<MessageExchange> for HistoryEntry {
    fn from(exchange: MessageExchange) -> Self {
        HistoryEntry {
            prompt: exchange.request_message,
            prompt_response: exchange.response_message,
            created_at: exchange.created_at,
        }
    }
}
