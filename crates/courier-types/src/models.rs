use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User avatar, stored as a tagged pair so clients can render either an
/// emoji codepoint or a photo reference without guessing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "avatar_type", content = "avatar_value", rename_all = "snake_case")]
pub enum Avatar {
    Emoji(String),
    Photo(String),
}

impl Avatar {
    pub fn kind(&self) -> &'static str {
        match self {
            Avatar::Emoji(_) => "emoji",
            Avatar::Photo(_) => "photo",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Avatar::Emoji(v) | Avatar::Photo(v) => v,
        }
    }

    /// Rebuild from the two stored columns. Unknown kinds fall back to emoji
    /// so a schema drift never breaks the read path.
    pub fn from_parts(kind: &str, value: String) -> Self {
        match kind {
            "photo" => Avatar::Photo(value),
            _ => Avatar::Emoji(value),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub phone: String,
    pub nickname: String,
    pub username: String,
    #[serde(flatten)]
    pub avatar: Avatar,
    pub premium_until: Option<DateTime<Utc>>,
    pub last_online: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Premium is an expiring timestamp, never a stored flag.
    pub fn is_premium_at(&self, now: DateTime<Utc>) -> bool {
        self.premium_until.is_some_and(|until| until > now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatKind {
    Direct,
    Group,
    Channel,
}

impl ChatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatKind::Direct => "direct",
            ChatKind::Group => "group",
            ChatKind::Channel => "channel",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "direct" => Some(ChatKind::Direct),
            "group" => Some(ChatKind::Group),
            "channel" => Some(ChatKind::Channel),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: Uuid,
    pub kind: ChatKind,
    /// None only for direct chats, where the display name is derived
    /// per-viewer from the other member.
    pub name: Option<String>,
    pub description: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub members: Vec<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    System,
    Media,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::System => "system",
            MessageKind::Media => "media",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(MessageKind::Text),
            "system" => Some(MessageKind::System),
            "media" => Some(MessageKind::Media),
            _ => None,
        }
    }
}

/// Denormalized sender details carried on every message read, so the chat
/// view renders without a second lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sender {
    pub nickname: String,
    #[serde(flatten)]
    pub avatar: Avatar,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub kind: MessageKind,
    /// Per-chat sequence number: strictly increasing, gapless, assigned
    /// atomically with the insert. The sync cursor is a watermark over it.
    pub seq: u64,
    pub created_at: DateTime<Utc>,
    pub sender: Option<Sender>,
}

/// What a chat list needs per row: the chat plus its latest message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSummary {
    pub id: Uuid,
    pub kind: ChatKind,
    pub name: String,
    pub description: Option<String>,
    pub last_message: Option<LastMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastMessage {
    pub content: String,
    pub sender_id: Uuid,
    pub seq: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Confirmed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Confirmed => "confirmed",
            TransactionStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TransactionStatus::Pending),
            "confirmed" => Some(TransactionStatus::Confirmed),
            "failed" => Some(TransactionStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: f64,
    pub currency: String,
    pub payment_type: String,
    pub payment_method: String,
    pub status: TransactionStatus,
    /// External id echoed back by the payment gateway on confirmation.
    pub reference: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}
