pub mod auth;
pub mod chats;
pub mod error;
pub mod payments;

pub use auth::{AppState, AppStateInner};
