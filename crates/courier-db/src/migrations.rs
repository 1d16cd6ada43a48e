use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id              TEXT PRIMARY KEY,
            phone           TEXT NOT NULL UNIQUE,
            nickname        TEXT NOT NULL,
            username        TEXT NOT NULL UNIQUE,
            avatar_type     TEXT NOT NULL DEFAULT 'emoji',
            avatar_value    TEXT NOT NULL DEFAULT '😊',
            premium_until   TEXT,
            last_online     TEXT,
            disabled        INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS contacts (
            owner_id    TEXT NOT NULL REFERENCES users(id),
            contact_id  TEXT NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL,
            PRIMARY KEY (owner_id, contact_id)
        );

        CREATE TABLE IF NOT EXISTS chats (
            id              TEXT PRIMARY KEY,
            kind            TEXT NOT NULL,
            name            TEXT,
            description     TEXT,
            created_by      TEXT NOT NULL REFERENCES users(id),
            -- normalized 'low:high' member pair, set only for direct chats;
            -- the UNIQUE constraint is what makes direct creation idempotent
            direct_key      TEXT UNIQUE,
            -- next sequence number to hand out; bumped in the same
            -- transaction as every message insert
            next_seq        INTEGER NOT NULL DEFAULT 1,
            last_message_id TEXT,
            created_at      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS chat_members (
            chat_id     TEXT NOT NULL REFERENCES chats(id),
            user_id     TEXT NOT NULL REFERENCES users(id),
            role        TEXT NOT NULL DEFAULT 'member',
            joined_at   TEXT NOT NULL,
            PRIMARY KEY (chat_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_chat_members_user
            ON chat_members(user_id);

        CREATE TABLE IF NOT EXISTS messages (
            id          TEXT PRIMARY KEY,
            chat_id     TEXT NOT NULL REFERENCES chats(id),
            sender_id   TEXT NOT NULL REFERENCES users(id),
            content     TEXT NOT NULL,
            kind        TEXT NOT NULL DEFAULT 'text',
            seq         INTEGER NOT NULL,
            created_at  TEXT NOT NULL,
            UNIQUE (chat_id, seq)
        );

        CREATE TABLE IF NOT EXISTS transactions (
            id              TEXT PRIMARY KEY,
            user_id         TEXT NOT NULL REFERENCES users(id),
            amount          REAL NOT NULL,
            currency        TEXT NOT NULL DEFAULT 'RUB',
            payment_type    TEXT NOT NULL,
            payment_method  TEXT NOT NULL,
            status          TEXT NOT NULL DEFAULT 'pending',
            reference       TEXT NOT NULL UNIQUE,
            created_at      TEXT NOT NULL,
            completed_at    TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_transactions_user
            ON transactions(user_id, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
