use std::sync::Arc;

use axum::{Json, extract::State};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;

use courier_db::Database;
use courier_gateway::dispatcher::Dispatcher;
use courier_types::api::{AuthRequest, AuthResponse, Claims, UserProfile};
use courier_types::models::{Avatar, User};

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub dispatcher: Dispatcher,
    pub jwt_secret: String,
    /// Base URL of the external payment gateway; the transaction reference
    /// is appended to build `payment_url`.
    pub payment_base_url: String,
}

/// Action-dispatched /auth endpoint: register or phone login. Both return
/// the user profile plus a token for the WebSocket gateway.
pub async fn auth(
    State(state): State<AppState>,
    Json(req): Json<AuthRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let user = match req {
        AuthRequest::Register {
            phone,
            nickname,
            username,
            avatar_type,
            avatar_value,
        } => {
            let db = state.clone();
            let user = tokio::task::spawn_blocking(move || {
                let avatar = Avatar::from_parts(&avatar_type, avatar_value);
                db.db.create_user(&phone, &nickname, &username, &avatar)
            })
            .await??;
            info!("Registered {} ({})", user.nickname, user.id);
            user
        }
        AuthRequest::Login { phone } => {
            let db = state.clone();
            tokio::task::spawn_blocking(move || db.db.login(&phone)).await??
        }
    };

    let token = create_token(&state.jwt_secret, &user).map_err(|e| {
        tracing::error!("Token encoding failed: {}", e);
        ApiError::internal()
    })?;

    Ok(Json(AuthResponse {
        success: true,
        user: UserProfile::at(user, Utc::now()),
        token,
    }))
}

fn create_token(secret: &str, user: &User) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user.id,
        nickname: user.nickname.clone(),
        exp: (Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
