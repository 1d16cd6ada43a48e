use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Chat, Message};

/// Events pushed over the WebSocket gateway. The poll endpoints remain the
/// source of truth; these only let a connected client skip the next poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid },

    /// A message was appended to a chat's log
    MessageCreate { message: Message },

    /// A chat was created that includes the subscriber
    ChatCreate { chat: Chat },
}

impl GatewayEvent {
    /// Returns the chat_id if delivery of this event is gated on the
    /// client's Subscribe set. ChatCreate is not: the subscriber cannot
    /// know the id yet, so it is filtered by membership instead.
    pub fn chat_id(&self) -> Option<Uuid> {
        match self {
            Self::MessageCreate { message } => Some(message.chat_id),
            Self::ChatCreate { .. } | Self::Ready { .. } => None,
        }
    }
}

/// Commands sent FROM client TO server over the WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection with the login/register token
    Identify { token: String },

    /// Replace the set of chats this connection receives events for
    Subscribe { chat_ids: Vec<Uuid> },
}
