use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Chat, ChatKind, ChatSummary, Message, MessageKind, Transaction, User};

// -- JWT Claims --

/// JWT claims shared between courier-api (token issuance on login/register)
/// and courier-gateway (WebSocket Identify). Canonical definition lives here
/// to eliminate duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub nickname: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AuthRequest {
    Register {
        phone: String,
        nickname: String,
        username: String,
        #[serde(default = "default_avatar_type")]
        avatar_type: String,
        #[serde(default = "default_avatar_value")]
        avatar_value: String,
    },
    Login {
        phone: String,
    },
}

fn default_avatar_type() -> String {
    "emoji".to_string()
}

fn default_avatar_value() -> String {
    "😊".to_string()
}

/// A user as returned to clients: the stored record plus the derived
/// `is_premium` flag (premium is persisted only as `premium_until`).
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: User,
    pub is_premium: bool,
}

impl UserProfile {
    pub fn at(user: User, now: DateTime<Utc>) -> Self {
        let is_premium = user.is_premium_at(now);
        Self { user, is_premium }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub user: UserProfile,
    pub token: String,
}

// -- Chats / messages / contacts --

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ChatRequest {
    CreateChat {
        #[serde(rename = "type")]
        kind: ChatKind,
        name: Option<String>,
        description: Option<String>,
        created_by: Uuid,
        #[serde(default)]
        members: Vec<Uuid>,
    },
    SendMessage {
        chat_id: Uuid,
        sender_id: Uuid,
        content: String,
        #[serde(default = "default_message_kind")]
        message_type: MessageKind,
    },
    AddMember {
        chat_id: Uuid,
        user_id: Uuid,
    },
    AddContact {
        user_id: Uuid,
        contact_id: Uuid,
    },
}

fn default_message_kind() -> MessageKind {
    MessageKind::Text
}

/// Query side of the /chats endpoint: `action` picks the read, the rest are
/// its parameters.
#[derive(Debug, Deserialize)]
pub struct ChatQuery {
    pub action: String,
    pub user_id: Option<Uuid>,
    pub chat_id: Option<Uuid>,
    /// Sequence-number watermark; 0 (the default) returns full history.
    #[serde(default)]
    pub cursor: u64,
}

#[derive(Debug, Serialize)]
pub struct ChatCreatedResponse {
    pub success: bool,
    pub chat: Chat,
}

#[derive(Debug, Serialize)]
pub struct MessageSentResponse {
    pub success: bool,
    pub message: Message,
}

#[derive(Debug, Serialize)]
pub struct ChatsResponse {
    pub success: bool,
    pub chats: Vec<ChatSummary>,
}

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub success: bool,
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct ContactsResponse {
    pub success: bool,
    pub contacts: Vec<UserProfile>,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub success: bool,
}

// -- Payments --

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PaymentRequest {
    CreatePayment {
        user_id: Uuid,
        #[serde(default = "default_payment_type")]
        payment_type: String,
        payment_method: String,
        #[serde(default = "default_amount")]
        amount: f64,
    },
    ConfirmPayment {
        transaction_id: String,
    },
    FailPayment {
        transaction_id: String,
    },
}

fn default_payment_type() -> String {
    "premium_subscription".to_string()
}

fn default_amount() -> f64 {
    350.0
}

#[derive(Debug, Deserialize)]
pub struct PaymentQuery {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct PaymentCreatedResponse {
    pub success: bool,
    pub payment_id: Uuid,
    pub transaction_id: String,
    pub amount: f64,
    pub payment_url: String,
}

#[derive(Debug, Serialize)]
pub struct PaymentsResponse {
    pub success: bool,
    pub payments: Vec<Transaction>,
}

// -- Errors --

/// Every failure leaving the service boundary uses this envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error_code: String,
}
