//! Contact graph: a directed (owner, contact) relation. Adding is
//! idempotent; the referenced user is not owned by the edge.

use uuid::Uuid;

use courier_types::models::User;

use crate::users::user_from_row;
use crate::{Database, Result, StoreError, ts_now};

impl Database {
    pub fn add_contact(&self, owner_id: Uuid, contact_id: Uuid) -> Result<()> {
        if owner_id == contact_id {
            return Err(StoreError::InvalidInput("cannot add yourself as a contact"));
        }

        self.with_conn_mut(|conn| {
            Database::require_user(conn, owner_id)?;
            Database::require_user(conn, contact_id)?;

            conn.execute(
                "INSERT OR IGNORE INTO contacts (owner_id, contact_id, created_at)
                 VALUES (?1, ?2, ?3)",
                rusqlite::params![owner_id.to_string(), contact_id.to_string(), ts_now()],
            )?;
            Ok(())
        })
    }

    pub fn remove_contact(&self, owner_id: Uuid, contact_id: Uuid) -> Result<()> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute(
                "DELETE FROM contacts WHERE owner_id = ?1 AND contact_id = ?2",
                rusqlite::params![owner_id.to_string(), contact_id.to_string()],
            )?;
            if removed == 0 {
                return Err(StoreError::NotFound("contact"));
            }
            Ok(())
        })
    }

    /// Contacts of `owner_id`, ordered by nickname for list rendering.
    pub fn list_contacts(&self, owner_id: Uuid) -> Result<Vec<User>> {
        self.with_conn(|conn| {
            Database::require_user(conn, owner_id)?;

            let mut stmt = conn.prepare(
                "SELECT u.id, u.phone, u.nickname, u.username, u.avatar_type, u.avatar_value,
                        u.premium_until, u.last_online, u.created_at
                 FROM users u
                 JOIN contacts c ON u.id = c.contact_id
                 WHERE c.owner_id = ?1
                 ORDER BY u.nickname",
            )?;

            let rows = stmt
                .query_map([owner_id.to_string()], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::StoreError;
    use crate::testutil;

    #[test]
    fn add_and_list_ordered_by_nickname() {
        let db = testutil::db();
        let owner = testutil::user(&db, "+1", "Owner", "owner");
        let zoe = testutil::user(&db, "+2", "Zoe", "zoe");
        let adam = testutil::user(&db, "+3", "Adam", "adam");

        db.add_contact(owner.id, zoe.id).unwrap();
        db.add_contact(owner.id, adam.id).unwrap();

        let contacts = db.list_contacts(owner.id).unwrap();
        let nicknames: Vec<&str> = contacts.iter().map(|u| u.nickname.as_str()).collect();
        assert_eq!(nicknames, ["Adam", "Zoe"]);
    }

    #[test]
    fn add_is_idempotent() {
        let db = testutil::db();
        let owner = testutil::user(&db, "+1", "Owner", "owner");
        let peer = testutil::user(&db, "+2", "Peer", "peer");

        db.add_contact(owner.id, peer.id).unwrap();
        db.add_contact(owner.id, peer.id).unwrap();

        assert_eq!(db.list_contacts(owner.id).unwrap().len(), 1);
    }

    #[test]
    fn edge_is_directed() {
        let db = testutil::db();
        let owner = testutil::user(&db, "+1", "Owner", "owner");
        let peer = testutil::user(&db, "+2", "Peer", "peer");

        db.add_contact(owner.id, peer.id).unwrap();
        assert!(db.list_contacts(peer.id).unwrap().is_empty());
    }

    #[test]
    fn unknown_target_not_found() {
        let db = testutil::db();
        let owner = testutil::user(&db, "+1", "Owner", "owner");
        let err = db.add_contact(owner.id, uuid::Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn self_contact_rejected() {
        let db = testutil::db();
        let owner = testutil::user(&db, "+1", "Owner", "owner");
        let err = db.add_contact(owner.id, owner.id).unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));
    }

    #[test]
    fn remove_contact() {
        let db = testutil::db();
        let owner = testutil::user(&db, "+1", "Owner", "owner");
        let peer = testutil::user(&db, "+2", "Peer", "peer");

        db.add_contact(owner.id, peer.id).unwrap();
        db.remove_contact(owner.id, peer.id).unwrap();
        assert!(db.list_contacts(owner.id).unwrap().is_empty());

        let err = db.remove_contact(owner.id, peer.id).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
