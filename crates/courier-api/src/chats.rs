use axum::{
    Json,
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::debug;

use courier_types::api::{
    ChatCreatedResponse, ChatQuery, ChatRequest, ChatsResponse, ContactsResponse,
    MessageSentResponse, MessagesResponse, OkResponse, UserProfile,
};
use courier_types::events::GatewayEvent;

use crate::auth::AppState;
use crate::error::ApiError;

/// Action-dispatched POST /chats: create_chat, send_message, add_member,
/// add_contact.
pub async fn chat_actions(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    match req {
        ChatRequest::CreateChat {
            kind,
            name,
            description,
            created_by,
            members,
        } => {
            let db = state.clone();
            let chat = tokio::task::spawn_blocking(move || {
                db.db.create_chat(
                    kind,
                    name.as_deref(),
                    description.as_deref(),
                    created_by,
                    &members,
                )
            })
            .await??;

            // Members with a live gateway connection learn about the chat
            // without waiting for their next get_chats poll.
            state
                .dispatcher
                .broadcast(GatewayEvent::ChatCreate { chat: chat.clone() });

            Ok(Json(ChatCreatedResponse {
                success: true,
                chat,
            })
            .into_response())
        }

        ChatRequest::SendMessage {
            chat_id,
            sender_id,
            content,
            message_type,
        } => {
            let db = state.clone();
            let message = tokio::task::spawn_blocking(move || {
                db.db.append_message(chat_id, sender_id, &content, message_type)
            })
            .await??;

            debug!("Message {} appended to chat {} (seq {})", message.id, chat_id, message.seq);

            state.dispatcher.broadcast(GatewayEvent::MessageCreate {
                message: message.clone(),
            });

            Ok(Json(MessageSentResponse {
                success: true,
                message,
            })
            .into_response())
        }

        ChatRequest::AddMember { chat_id, user_id } => {
            let db = state.clone();
            tokio::task::spawn_blocking(move || db.db.add_member(chat_id, user_id)).await??;
            Ok(Json(OkResponse { success: true }).into_response())
        }

        ChatRequest::AddContact {
            user_id,
            contact_id,
        } => {
            let db = state.clone();
            tokio::task::spawn_blocking(move || db.db.add_contact(user_id, contact_id)).await??;
            Ok(Json(OkResponse { success: true }).into_response())
        }
    }
}

/// Query side of /chats: get_chats, get_messages, get_contacts. Stateless —
/// the cursor lives with the client, which is what keeps polling cheap.
pub async fn chat_queries(
    State(state): State<AppState>,
    Query(query): Query<ChatQuery>,
) -> Result<Response, ApiError> {
    match query.action.as_str() {
        "get_chats" => {
            let user_id = query.user_id.ok_or_else(ApiError::bad_request)?;
            let db = state.clone();
            let chats =
                tokio::task::spawn_blocking(move || db.db.list_chats_for_user(user_id)).await??;
            Ok(Json(ChatsResponse {
                success: true,
                chats,
            })
            .into_response())
        }

        "get_messages" => {
            let chat_id = query.chat_id.ok_or_else(ApiError::bad_request)?;
            let cursor = query.cursor;
            let db = state.clone();
            let messages =
                tokio::task::spawn_blocking(move || db.db.read_since(chat_id, cursor)).await??;
            Ok(Json(MessagesResponse {
                success: true,
                messages,
            })
            .into_response())
        }

        "get_contacts" => {
            let user_id = query.user_id.ok_or_else(ApiError::bad_request)?;
            let db = state.clone();
            let users =
                tokio::task::spawn_blocking(move || db.db.list_contacts(user_id)).await??;
            let now = Utc::now();
            let contacts = users
                .into_iter()
                .map(|u| UserProfile::at(u, now))
                .collect();
            Ok(Json(ContactsResponse {
                success: true,
                contacts,
            })
            .into_response())
        }

        _ => Err(ApiError::bad_request()),
    }
}
