use actix_web::{get, post, web, Responder};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::types::{
    CreateChatroomResponse, Envelope, HistoryEntry, SubmitPromptRequest, SubmitPromptResponse,
    TaskStatusResponse,
};
use crate::AppState;

#[post("")]
pub async fn create_chatroom(
    app_state: web::Data<AppState>,
    authenticated_user: AuthenticatedUser,
) -> ApiResult<impl Responder> {
    let chatroom = app_state
        .pipeline
        .create_chatroom(authenticated_user.user_id)
        .await?;

    Ok(web::Json(Envelope::fetched(CreateChatroomResponse {
        chatroom_id: chatroom.chatroom_id,
    })))
}

#[get("")]
pub async fn list_chatrooms(
    app_state: web::Data<AppState>,
    authenticated_user: AuthenticatedUser,
) -> ApiResult<impl Responder> {
    let chatroom_ids = app_state
        .pipeline
        .list_chatrooms(authenticated_user.user_id)
        .await?;

    Ok(web::Json(Envelope::fetched(chatroom_ids)))
}

#[get("/{chatroom_id}/history")]
pub async fn get_history(
    app_state: web::Data<AppState>,
    authenticated_user: AuthenticatedUser,
    chatroom_id: web::Path<String>,
) -> ApiResult<impl Responder> {
    let history = app_state
        .pipeline
        .get_history(authenticated_user.user_id, &chatroom_id)
        .await?;

    let entries: Vec<HistoryEntry> = history.into_iter().map(HistoryEntry::from).collect();
    Ok(web::Json(Envelope::fetched(entries)))
}

/// Accepts a prompt and answers with a task handle; the client polls the
/// status endpoint for the result.
#[post("/{chatroom_id}/prompt")]
pub async fn submit_prompt(
    app_state: web::Data<AppState>,
    authenticated_user: AuthenticatedUser,
    chatroom_id: web::Path<String>,
    web::Json(request): web::Json<SubmitPromptRequest>,
) -> ApiResult<impl Responder> {
    let task_id = app_state
        .pipeline
        .submit_prompt(authenticated_user.user_id, &chatroom_id, &request.prompt)
        .await?;

    Ok(web::Json(Envelope::fetched(SubmitPromptResponse {
        task_id,
        status: "processing",
    })))
}

#[get("/prompt/{task_id}/status")]
pub async fn task_status(
    app_state: web::Data<AppState>,
    _authenticated_user: AuthenticatedUser,
    task_id: web::Path<Uuid>,
) -> ApiResult<impl Responder> {
    let state = app_state.pipeline.task_status(task_id.into_inner());
    Ok(web::Json(Envelope::fetched(TaskStatusResponse::from(state))))
}
