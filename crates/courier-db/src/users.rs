//! Identity store: user records keyed by phone, uniqueness of usernames,
//! soft-disable instead of deletion.

use rusqlite::OptionalExtension;
use uuid::Uuid;

use courier_types::models::{Avatar, User};

use crate::{Database, Result, StoreError, opt_ts_col, ts_col, ts_now, uuid_col};

const USER_COLUMNS: &str =
    "id, phone, nickname, username, avatar_type, avatar_value, premium_until, last_online, created_at";

impl Database {
    pub fn create_user(
        &self,
        phone: &str,
        nickname: &str,
        username: &str,
        avatar: &Avatar,
    ) -> Result<User> {
        let phone = phone.trim();
        let nickname = nickname.trim();
        let username = username.trim();
        if phone.is_empty() {
            return Err(StoreError::InvalidInput("phone must not be empty"));
        }
        if nickname.is_empty() {
            return Err(StoreError::InvalidInput("nickname must not be empty"));
        }
        if username.is_empty() {
            return Err(StoreError::InvalidInput("username must not be empty"));
        }

        let id = Uuid::new_v4();
        let created_at = ts_now();

        self.with_conn_mut(|conn| {
            // Uniqueness pre-checks run under the connection lock, so they
            // cannot race a concurrent register.
            let taken: Option<String> = conn
                .query_row(
                    "SELECT id FROM users WHERE phone = ?1",
                    [phone],
                    |row| row.get(0),
                )
                .optional()?;
            if taken.is_some() {
                return Err(StoreError::Conflict("phone already registered"));
            }

            let taken: Option<String> = conn
                .query_row(
                    "SELECT id FROM users WHERE username = ?1",
                    [username],
                    |row| row.get(0),
                )
                .optional()?;
            if taken.is_some() {
                return Err(StoreError::Conflict("username already taken"));
            }

            conn.execute(
                "INSERT INTO users (id, phone, nickname, username, avatar_type, avatar_value, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    id.to_string(),
                    phone,
                    nickname,
                    username,
                    avatar.kind(),
                    avatar.value(),
                    created_at,
                ],
            )?;

            query_user(conn, "id", &id.to_string())?.ok_or(StoreError::NotFound("user"))
        })
    }

    /// Phone-based login. Touches `last_online` and returns the fresh record.
    /// Disabled users are indistinguishable from unknown ones.
    pub fn login(&self, phone: &str) -> Result<User> {
        let now = ts_now();
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE users SET last_online = ?1 WHERE phone = ?2 AND disabled = 0",
                rusqlite::params![now, phone.trim()],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound("user"));
            }
            query_user(conn, "phone", phone.trim())?.ok_or(StoreError::NotFound("user"))
        })
    }

    pub fn get_user(&self, id: Uuid) -> Result<User> {
        self.with_conn(|conn| {
            query_user(conn, "id", &id.to_string())?.ok_or(StoreError::NotFound("user"))
        })
    }

    /// Soft-disable: the record stays (messages keep their sender), but the
    /// user can no longer log in.
    pub fn set_disabled(&self, id: Uuid, disabled: bool) -> Result<()> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE users SET disabled = ?1 WHERE id = ?2",
                rusqlite::params![disabled as i64, id.to_string()],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound("user"));
            }
            Ok(())
        })
    }

    pub(crate) fn require_user(conn: &rusqlite::Connection, id: Uuid) -> Result<()> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM users WHERE id = ?1",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        if found.is_none() {
            return Err(StoreError::NotFound("user"));
        }
        Ok(())
    }
}

fn query_user(conn: &rusqlite::Connection, column: &str, value: &str) -> Result<Option<User>> {
    // `column` is always a literal from this module, never caller input.
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([value], user_from_row).optional()?;
    Ok(row)
}

/// Maps a row selected with [`USER_COLUMNS`].
pub(crate) fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let avatar_type: String = row.get(4)?;
    let avatar_value: String = row.get(5)?;
    Ok(User {
        id: uuid_col(row, 0)?,
        phone: row.get(1)?,
        nickname: row.get(2)?,
        username: row.get(3)?,
        avatar: Avatar::from_parts(&avatar_type, avatar_value),
        premium_until: opt_ts_col(row, 6)?,
        last_online: opt_ts_col(row, 7)?,
        created_at: ts_col(row, 8)?,
    })
}

#[cfg(test)]
mod tests {
    use courier_types::models::Avatar;

    use crate::StoreError;
    use crate::testutil;

    #[test]
    fn register_and_login_round_trip() {
        let db = testutil::db();
        let user = testutil::user(&db, "+79990001122", "Alice", "alice");

        assert_eq!(user.phone, "+79990001122");
        assert!(user.premium_until.is_none());
        assert!(user.last_online.is_none());

        let logged_in = db.login("+79990001122").unwrap();
        assert_eq!(logged_in.id, user.id);
        assert!(logged_in.last_online.is_some());
    }

    #[test]
    fn duplicate_username_conflicts() {
        let db = testutil::db();
        testutil::user(&db, "+1", "Alice", "alice");

        let err = db
            .create_user("+2", "Other Alice", "alice", &Avatar::Emoji("🙂".into()))
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn duplicate_phone_conflicts() {
        let db = testutil::db();
        testutil::user(&db, "+1", "Alice", "alice");

        let err = db
            .create_user("+1", "Bob", "bob", &Avatar::Emoji("🙂".into()))
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn empty_fields_rejected() {
        let db = testutil::db();
        let err = db
            .create_user("  ", "Alice", "alice", &Avatar::Emoji("🙂".into()))
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));
    }

    #[test]
    fn login_unknown_phone_not_found() {
        let db = testutil::db();
        let err = db.login("+000").unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn disabled_user_cannot_login() {
        let db = testutil::db();
        let user = testutil::user(&db, "+1", "Alice", "alice");

        db.set_disabled(user.id, true).unwrap();
        let err = db.login("+1").unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));

        // The record itself survives
        assert_eq!(db.get_user(user.id).unwrap().id, user.id);
    }
}
