//! Chat registry: chat entities, membership, and the denormalized
//! last-message cache the chat list is rendered from.

use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use courier_types::models::{Chat, ChatKind, ChatSummary, LastMessage};

use crate::{Database, Result, StoreError, ts_col, ts_now, uuid_col};

impl Database {
    /// Creates a chat. Direct chats are idempotent per normalized member
    /// pair: re-requesting the same pair returns the existing chat. Group
    /// and channel chats are created unconditionally, with the creator
    /// added as admin when absent from `members`.
    pub fn create_chat(
        &self,
        kind: ChatKind,
        name: Option<&str>,
        description: Option<&str>,
        created_by: Uuid,
        members: &[Uuid],
    ) -> Result<Chat> {
        let mut seen = std::collections::HashSet::new();
        let mut members: Vec<Uuid> = members.iter().copied().filter(|m| seen.insert(*m)).collect();

        match kind {
            ChatKind::Direct => {
                if members.len() != 2 {
                    return Err(StoreError::InvalidInput(
                        "direct chat requires exactly 2 distinct members",
                    ));
                }
            }
            ChatKind::Group | ChatKind::Channel => {
                if members.is_empty() {
                    return Err(StoreError::InvalidInput("members must not be empty"));
                }
                if name.map_or(true, |n| n.trim().is_empty()) {
                    return Err(StoreError::InvalidInput("name is required"));
                }
                if !members.contains(&created_by) {
                    members.insert(0, created_by);
                }
            }
        }

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            Database::require_user(&tx, created_by)?;
            for member in &members {
                Database::require_user(&tx, *member)?;
            }

            if kind == ChatKind::Direct {
                let key = direct_key(members[0], members[1]);
                let existing: Option<String> = tx
                    .query_row(
                        "SELECT id FROM chats WHERE direct_key = ?1",
                        [&key],
                        |row| row.get(0),
                    )
                    .optional()?;
                if let Some(id) = existing {
                    let chat = load_chat(&tx, &id)?.ok_or(StoreError::NotFound("chat"))?;
                    tx.commit()?;
                    return Ok(chat);
                }
            }

            let id = Uuid::new_v4();
            let now = ts_now();
            let key = match kind {
                ChatKind::Direct => Some(direct_key(members[0], members[1])),
                _ => None,
            };

            tx.execute(
                "INSERT INTO chats (id, kind, name, description, created_by, direct_key, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    id.to_string(),
                    kind.as_str(),
                    name.map(str::trim),
                    description,
                    created_by.to_string(),
                    key,
                    now,
                ],
            )?;

            for member in &members {
                let role = if kind != ChatKind::Direct && *member == created_by {
                    "admin"
                } else {
                    "member"
                };
                tx.execute(
                    "INSERT INTO chat_members (chat_id, user_id, role, joined_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![id.to_string(), member.to_string(), role, now],
                )?;
            }

            let chat = load_chat(&tx, &id.to_string())?.ok_or(StoreError::NotFound("chat"))?;
            tx.commit()?;
            Ok(chat)
        })
    }

    pub fn get_chat(&self, chat_id: Uuid) -> Result<Chat> {
        self.with_conn(|conn| {
            load_chat(conn, &chat_id.to_string())?.ok_or(StoreError::NotFound("chat"))
        })
    }

    /// Idempotent: adding an existing member is a no-op.
    pub fn add_member(&self, chat_id: Uuid, user_id: Uuid) -> Result<()> {
        self.with_conn_mut(|conn| {
            Database::require_chat(conn, chat_id)?;
            Database::require_user(conn, user_id)?;

            conn.execute(
                "INSERT OR IGNORE INTO chat_members (chat_id, user_id, role, joined_at)
                 VALUES (?1, ?2, 'member', ?3)",
                rusqlite::params![chat_id.to_string(), user_id.to_string(), ts_now()],
            )?;
            Ok(())
        })
    }

    /// Chats the user belongs to, newest activity first. Chats without
    /// messages sort by creation time. Direct chats get their display name
    /// from the other member.
    pub fn list_chats_for_user(&self, user_id: Uuid) -> Result<Vec<ChatSummary>> {
        self.with_conn(|conn| {
            Database::require_user(conn, user_id)?;

            let mut stmt = conn.prepare(
                "SELECT c.id, c.kind, c.name, c.description,
                        m.content, m.sender_id, m.seq, m.created_at,
                        (SELECT u.nickname
                         FROM chat_members cm2
                         JOIN users u ON u.id = cm2.user_id
                         WHERE cm2.chat_id = c.id AND cm2.user_id != ?1
                         LIMIT 1) AS peer_nickname
                 FROM chats c
                 JOIN chat_members cm ON cm.chat_id = c.id AND cm.user_id = ?1
                 LEFT JOIN messages m ON m.id = c.last_message_id
                 ORDER BY COALESCE(m.created_at, c.created_at) DESC",
            )?;

            let rows = stmt
                .query_map([user_id.to_string()], |row| {
                    let kind_raw: String = row.get(1)?;
                    let name: Option<String> = row.get(2)?;
                    let peer_nickname: Option<String> = row.get(8)?;

                    let last_message = match row.get::<_, Option<String>>(4)? {
                        Some(content) => Some(LastMessage {
                            content,
                            sender_id: uuid_col(row, 5)?,
                            seq: row.get::<_, i64>(6)? as u64,
                            created_at: ts_col(row, 7)?,
                        }),
                        None => None,
                    };

                    Ok(ChatSummary {
                        id: uuid_col(row, 0)?,
                        kind: ChatKind::parse(&kind_raw).unwrap_or(ChatKind::Group),
                        name: name
                            .or(peer_nickname)
                            .unwrap_or_else(|| "Chat".to_string()),
                        description: row.get(3)?,
                        last_message,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub(crate) fn require_chat(conn: &Connection, chat_id: Uuid) -> Result<()> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM chats WHERE id = ?1",
                [chat_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        if found.is_none() {
            return Err(StoreError::NotFound("chat"));
        }
        Ok(())
    }

    pub(crate) fn is_member(conn: &Connection, chat_id: Uuid, user_id: Uuid) -> Result<bool> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM chat_members WHERE chat_id = ?1 AND user_id = ?2",
                rusqlite::params![chat_id.to_string(), user_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

/// Normalized pair key for direct chats, identical for both member orders.
fn direct_key(a: Uuid, b: Uuid) -> String {
    let (low, high) = if a < b { (a, b) } else { (b, a) };
    format!("{low}:{high}")
}

pub(crate) fn load_chat(conn: &Connection, id: &str) -> Result<Option<Chat>> {
    let chat = conn
        .query_row(
            "SELECT id, kind, name, description, created_by, created_at
             FROM chats WHERE id = ?1",
            [id],
            |row| {
                let kind_raw: String = row.get(1)?;
                Ok(Chat {
                    id: uuid_col(row, 0)?,
                    kind: ChatKind::parse(&kind_raw).unwrap_or(ChatKind::Group),
                    name: row.get(2)?,
                    description: row.get(3)?,
                    created_by: uuid_col(row, 4)?,
                    created_at: ts_col(row, 5)?,
                    members: Vec::new(),
                })
            },
        )
        .optional()?;

    let Some(mut chat) = chat else {
        return Ok(None);
    };

    // Member order is join order
    let mut stmt = conn.prepare(
        "SELECT user_id FROM chat_members WHERE chat_id = ?1 ORDER BY joined_at, rowid",
    )?;
    chat.members = stmt
        .query_map([id], |row| uuid_col(row, 0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(Some(chat))
}

#[cfg(test)]
mod tests {
    use courier_types::models::{ChatKind, MessageKind};

    use crate::StoreError;
    use crate::testutil;

    #[test]
    fn direct_chat_created_once_per_pair() {
        let db = testutil::db();
        let alice = testutil::user(&db, "+1", "Alice", "alice");
        let bob = testutil::user(&db, "+2", "Bob", "bob");

        let first = db
            .create_chat(ChatKind::Direct, None, None, alice.id, &[alice.id, bob.id])
            .unwrap();
        // Reversed member order still hits the same chat
        let second = db
            .create_chat(ChatKind::Direct, None, None, bob.id, &[bob.id, alice.id])
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.members.len(), 2);
    }

    #[test]
    fn direct_chat_member_count_enforced() {
        let db = testutil::db();
        let alice = testutil::user(&db, "+1", "Alice", "alice");

        let err = db
            .create_chat(ChatKind::Direct, None, None, alice.id, &[alice.id])
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));

        let err = db
            .create_chat(ChatKind::Direct, None, None, alice.id, &[alice.id, alice.id])
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));
    }

    #[test]
    fn group_requires_name_and_members() {
        let db = testutil::db();
        let alice = testutil::user(&db, "+1", "Alice", "alice");
        let bob = testutil::user(&db, "+2", "Bob", "bob");

        let err = db
            .create_chat(ChatKind::Group, None, None, alice.id, &[bob.id])
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));

        let err = db
            .create_chat(ChatKind::Group, Some("Team"), None, alice.id, &[])
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));
    }

    #[test]
    fn group_creator_added_automatically() {
        let db = testutil::db();
        let alice = testutil::user(&db, "+1", "Alice", "alice");
        let bob = testutil::user(&db, "+2", "Bob", "bob");

        let chat = db
            .create_chat(ChatKind::Group, Some("Team"), None, alice.id, &[bob.id])
            .unwrap();
        assert!(chat.members.contains(&alice.id));
        assert!(chat.members.contains(&bob.id));
    }

    #[test]
    fn unknown_member_rejected() {
        let db = testutil::db();
        let alice = testutil::user(&db, "+1", "Alice", "alice");

        let err = db
            .create_chat(
                ChatKind::Direct,
                None,
                None,
                alice.id,
                &[alice.id, uuid::Uuid::new_v4()],
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn add_member_is_idempotent() {
        let db = testutil::db();
        let alice = testutil::user(&db, "+1", "Alice", "alice");
        let bob = testutil::user(&db, "+2", "Bob", "bob");
        let carol = testutil::user(&db, "+3", "Carol", "carol");

        let chat = db
            .create_chat(ChatKind::Group, Some("Team"), None, alice.id, &[bob.id])
            .unwrap();

        db.add_member(chat.id, carol.id).unwrap();
        db.add_member(chat.id, carol.id).unwrap();

        let chat = db.get_chat(chat.id).unwrap();
        assert_eq!(chat.members.len(), 3);
        // Late joiner sorts last
        assert_eq!(chat.members.last(), Some(&carol.id));
    }

    #[test]
    fn direct_chat_name_derived_from_peer() {
        let db = testutil::db();
        let alice = testutil::user(&db, "+1", "Alice", "alice");
        let bob = testutil::user(&db, "+2", "Bob", "bob");

        db.create_chat(ChatKind::Direct, None, None, alice.id, &[alice.id, bob.id])
            .unwrap();

        let for_alice = db.list_chats_for_user(alice.id).unwrap();
        assert_eq!(for_alice[0].name, "Bob");

        let for_bob = db.list_chats_for_user(bob.id).unwrap();
        assert_eq!(for_bob[0].name, "Alice");
    }

    #[test]
    fn chat_list_ordered_by_latest_activity() {
        let db = testutil::db();
        let alice = testutil::user(&db, "+1", "Alice", "alice");
        let bob = testutil::user(&db, "+2", "Bob", "bob");

        let older = db
            .create_chat(ChatKind::Group, Some("Older"), None, alice.id, &[bob.id])
            .unwrap();
        let newer = db
            .create_chat(ChatKind::Group, Some("Newer"), None, alice.id, &[bob.id])
            .unwrap();

        // No messages yet: creation order, newest first
        let chats = db.list_chats_for_user(alice.id).unwrap();
        assert_eq!(chats[0].id, newer.id);

        // A message in the older chat bumps it to the top
        db.append_message(older.id, bob.id, "ping", MessageKind::Text)
            .unwrap();
        let chats = db.list_chats_for_user(alice.id).unwrap();
        assert_eq!(chats[0].id, older.id);
        assert_eq!(chats[0].last_message.as_ref().unwrap().content, "ping");
        assert!(chats[1].last_message.is_none());
    }
}
