//! Message log: append-only, per-chat ordered storage. Sequence numbers are
//! allocated from `chats.next_seq` inside the same transaction as the
//! insert, which is what makes them gapless and the cursor-based sync safe.

use uuid::Uuid;

use courier_types::models::{Avatar, Message, MessageKind, Sender};

use crate::{Database, Result, StoreError, ts_col, ts_now, uuid_col};

impl Database {
    /// Appends a message and returns it with its assigned sequence number.
    /// The chat's `next_seq` and `last_message_id` move in the same
    /// transaction, so a reader either sees the message everywhere or
    /// nowhere.
    pub fn append_message(
        &self,
        chat_id: Uuid,
        sender_id: Uuid,
        content: &str,
        kind: MessageKind,
    ) -> Result<Message> {
        if content.trim().is_empty() {
            return Err(StoreError::InvalidInput("content must not be empty"));
        }

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let seq: i64 = {
                use rusqlite::OptionalExtension;
                tx.query_row(
                    "SELECT next_seq FROM chats WHERE id = ?1",
                    [chat_id.to_string()],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or(StoreError::NotFound("chat"))?
            };

            if !Database::is_member(&tx, chat_id, sender_id)? {
                return Err(StoreError::Forbidden("sender is not a chat member"));
            }

            let id = Uuid::new_v4();
            let created_at = ts_now();

            tx.execute(
                "INSERT INTO messages (id, chat_id, sender_id, content, kind, seq, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    id.to_string(),
                    chat_id.to_string(),
                    sender_id.to_string(),
                    content,
                    kind.as_str(),
                    seq,
                    created_at,
                ],
            )?;

            tx.execute(
                "UPDATE chats SET next_seq = ?1, last_message_id = ?2 WHERE id = ?3",
                rusqlite::params![seq + 1, id.to_string(), chat_id.to_string()],
            )?;

            tx.commit()?;

            Ok(Message {
                id,
                chat_id,
                sender_id,
                content: content.to_string(),
                kind,
                seq: seq as u64,
                created_at: parse_created_at(&created_at),
                sender: None,
            })
        })
    }

    /// All messages with seq > cursor, ascending. Cursor 0 is full history.
    /// Sender nickname and avatar come along in one JOIN so the thread view
    /// renders without extra lookups.
    pub fn read_since(&self, chat_id: Uuid, cursor: u64) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            Database::require_chat(conn, chat_id)?;

            let mut stmt = conn.prepare(
                "SELECT m.id, m.chat_id, m.sender_id, m.content, m.kind, m.seq, m.created_at,
                        u.nickname, u.avatar_type, u.avatar_value
                 FROM messages m
                 LEFT JOIN users u ON m.sender_id = u.id
                 WHERE m.chat_id = ?1 AND m.seq > ?2
                 ORDER BY m.seq ASC",
            )?;

            let rows = stmt
                .query_map(
                    rusqlite::params![chat_id.to_string(), cursor as i64],
                    |row| {
                        let kind_raw: String = row.get(4)?;
                        let sender = match row.get::<_, Option<String>>(7)? {
                            Some(nickname) => {
                                let avatar_type: String = row.get(8)?;
                                let avatar_value: String = row.get(9)?;
                                Some(Sender {
                                    nickname,
                                    avatar: Avatar::from_parts(&avatar_type, avatar_value),
                                })
                            }
                            None => None,
                        };
                        Ok(Message {
                            id: uuid_col(row, 0)?,
                            chat_id: uuid_col(row, 1)?,
                            sender_id: uuid_col(row, 2)?,
                            content: row.get(3)?,
                            kind: MessageKind::parse(&kind_raw).unwrap_or(MessageKind::Text),
                            seq: row.get::<_, i64>(5)? as u64,
                            created_at: ts_col(row, 6)?,
                            sender,
                        })
                    },
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

/// The append path formats the timestamp itself, so parsing back cannot
/// fail; fall back to "now" if it ever does.
fn parse_created_at(raw: &str) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(|_| chrono::Utc::now())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use courier_types::models::{ChatKind, MessageKind};
    use uuid::Uuid;

    use crate::testutil;
    use crate::{Database, StoreError};

    fn direct_chat(db: &Database) -> (Uuid, Uuid, Uuid) {
        let alice = testutil::user(db, "+1", "Alice", "alice");
        let bob = testutil::user(db, "+2", "Bob", "bob");
        let chat = db
            .create_chat(ChatKind::Direct, None, None, alice.id, &[alice.id, bob.id])
            .unwrap();
        (chat.id, alice.id, bob.id)
    }

    #[test]
    fn append_assigns_gapless_sequence() {
        let db = testutil::db();
        let (chat, alice, bob) = direct_chat(&db);

        let m1 = db.append_message(chat, alice, "hi", MessageKind::Text).unwrap();
        let m2 = db.append_message(chat, bob, "hey", MessageKind::Text).unwrap();
        let m3 = db.append_message(chat, alice, "how are you", MessageKind::Text).unwrap();

        assert_eq!([m1.seq, m2.seq, m3.seq], [1, 2, 3]);
    }

    #[test]
    fn concurrent_appends_never_gap_or_duplicate() {
        let db = Arc::new(testutil::db());
        let (chat, alice, bob) = direct_chat(&db);

        let mut handles = Vec::new();
        for i in 0..4 {
            let db = db.clone();
            let sender = if i % 2 == 0 { alice } else { bob };
            handles.push(std::thread::spawn(move || {
                let mut seqs = Vec::new();
                for n in 0..25 {
                    let msg = db
                        .append_message(chat, sender, &format!("msg {i}-{n}"), MessageKind::Text)
                        .unwrap();
                    seqs.push(msg.seq);
                }
                seqs
            }));
        }

        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();

        let expected: Vec<u64> = (1..=100).collect();
        assert_eq!(all, expected);
        assert_eq!(all.iter().copied().collect::<HashSet<_>>().len(), 100);

        // Cache points at the final message
        let chats = db.list_chats_for_user(alice).unwrap();
        assert_eq!(chats[0].last_message.as_ref().unwrap().seq, 100);
    }

    #[test]
    fn sequences_are_independent_per_chat() {
        let db = testutil::db();
        let alice = testutil::user(&db, "+1", "Alice", "alice");
        let bob = testutil::user(&db, "+2", "Bob", "bob");
        let direct = db
            .create_chat(ChatKind::Direct, None, None, alice.id, &[alice.id, bob.id])
            .unwrap();
        let group = db
            .create_chat(ChatKind::Group, Some("Team"), None, alice.id, &[bob.id])
            .unwrap();

        db.append_message(direct.id, alice.id, "one", MessageKind::Text).unwrap();
        db.append_message(direct.id, bob.id, "two", MessageKind::Text).unwrap();
        let first_in_group = db
            .append_message(group.id, alice.id, "hello team", MessageKind::Text)
            .unwrap();

        assert_eq!(first_in_group.seq, 1);
    }

    #[test]
    fn non_member_append_forbidden_and_cache_untouched() {
        let db = testutil::db();
        let (chat, alice, _) = direct_chat(&db);
        let outsider = testutil::user(&db, "+3", "Mallory", "mallory");

        db.append_message(chat, alice, "hi", MessageKind::Text).unwrap();

        let err = db
            .append_message(chat, outsider.id, "let me in", MessageKind::Text)
            .unwrap_err();
        assert!(matches!(err, StoreError::Forbidden(_)));

        let chats = db.list_chats_for_user(alice).unwrap();
        let last = chats[0].last_message.as_ref().unwrap();
        assert_eq!(last.content, "hi");
        assert_eq!(last.seq, 1);
    }

    #[test]
    fn unknown_chat_not_found() {
        let db = testutil::db();
        let alice = testutil::user(&db, "+1", "Alice", "alice");

        let err = db
            .append_message(Uuid::new_v4(), alice.id, "hi", MessageKind::Text)
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));

        let err = db.read_since(Uuid::new_v4(), 0).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn empty_content_rejected() {
        let db = testutil::db();
        let (chat, alice, _) = direct_chat(&db);

        let err = db
            .append_message(chat, alice, "   ", MessageKind::Text)
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));
    }

    #[test]
    fn read_since_cursor_scenario() {
        let db = testutil::db();
        let (chat, alice, bob) = direct_chat(&db);

        db.append_message(chat, alice, "hi", MessageKind::Text).unwrap();
        db.append_message(chat, bob, "hey", MessageKind::Text).unwrap();

        let tail = db.read_since(chat, 1).unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].seq, 2);
        assert_eq!(tail[0].content, "hey");

        let full = db.read_since(chat, 0).unwrap();
        assert_eq!(full.len(), 2);
        assert_eq!(full[0].content, "hi");
        assert_eq!(full[1].content, "hey");

        assert!(db.read_since(chat, 2).unwrap().is_empty());
    }

    #[test]
    fn polling_with_advancing_cursor_is_monotonic() {
        let db = testutil::db();
        let (chat, alice, bob) = direct_chat(&db);

        let mut observed: Vec<u64> = Vec::new();
        let mut cursor = 0;

        for round in 0..10 {
            let sender = if round % 2 == 0 { alice } else { bob };
            db.append_message(chat, sender, &format!("round {round}"), MessageKind::Text)
                .unwrap();

            // Poll like a client: everything past the watermark
            let batch = db.read_since(chat, cursor).unwrap();
            for msg in &batch {
                assert!(msg.seq > cursor);
                observed.push(msg.seq);
                cursor = msg.seq;
            }
        }

        // Union of all polls is the full history, in order, no duplicates
        let expected: Vec<u64> = (1..=10).collect();
        assert_eq!(observed, expected);
    }

    #[test]
    fn messages_carry_sender_details() {
        let db = testutil::db();
        let (chat, alice, _) = direct_chat(&db);

        db.append_message(chat, alice, "hi", MessageKind::Text).unwrap();

        let messages = db.read_since(chat, 0).unwrap();
        let sender = messages[0].sender.as_ref().unwrap();
        assert_eq!(sender.nickname, "Alice");
    }
}
