use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use uuid::Uuid;

use lovenote_types::models::Device;

use crate::Database;
use crate::models::{DEVICE_COLUMNS, device_from_row};

/// Outcome of the atomic resolve-or-create step.
#[derive(Debug, Clone)]
pub struct DeviceResolution {
    pub device: Device,
    /// True when this call inserted the row.
    pub created: bool,
}

impl Database {
    /// Find the device for `(user_id, fingerprint)` or create it, inside one
    /// `BEGIN IMMEDIATE` transaction.
    ///
    /// Existing rows only get `user_agent`, `ip_hash` and `last_seen`
    /// refreshed; their approval state is never touched. For new rows,
    /// `activate_new` receives whether the user already owns a non-revoked
    /// device and returns the initial `is_active`.
    pub fn resolve_device<F>(
        &self,
        user_id: Uuid,
        fingerprint: &str,
        user_agent: Option<&str>,
        ip_hash: Option<&str>,
        now: DateTime<Utc>,
        activate_new: F,
    ) -> Result<DeviceResolution>
    where
        F: FnOnce(bool) -> bool,
    {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let uid = user_id.to_string();

            let existing = query_device_by_fingerprint(&tx, &uid, fingerprint)?;
            let resolution = match existing {
                Some(device) => {
                    tx.execute(
                        "UPDATE devices
                         SET user_agent = COALESCE(?2, user_agent),
                             ip_hash = COALESCE(?3, ip_hash),
                             last_seen = ?4
                         WHERE id = ?1",
                        (device.id.to_string(), user_agent, ip_hash, now),
                    )?;
                    let device = query_device(&tx, device.id)?
                        .ok_or_else(|| anyhow::anyhow!("device vanished during update"))?;
                    DeviceResolution { device, created: false }
                }
                None => {
                    let has_live_device: bool = tx.query_row(
                        "SELECT EXISTS(SELECT 1 FROM devices WHERE user_id = ?1 AND revoked_at IS NULL)",
                        [&uid],
                        |r| r.get(0),
                    )?;
                    let is_active = activate_new(has_live_device);
                    let id = Uuid::new_v4();
                    tx.execute(
                        "INSERT INTO devices
                            (id, user_id, fingerprint, user_agent, ip_hash, is_active, revoked_at, created_at, last_seen)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7, ?7)",
                        (id.to_string(), &uid, fingerprint, user_agent, ip_hash, is_active, now),
                    )?;
                    let device = query_device(&tx, id)?
                        .ok_or_else(|| anyhow::anyhow!("device missing after insert"))?;
                    DeviceResolution { device, created: true }
                }
            };

            tx.commit()?;
            Ok(resolution)
        })
    }

    pub fn find_device(&self, user_id: Uuid, fingerprint: &str) -> Result<Option<Device>> {
        self.with_conn(|conn| query_device_by_fingerprint(conn, &user_id.to_string(), fingerprint))
    }

    pub fn get_device(&self, id: Uuid) -> Result<Option<Device>> {
        self.with_conn(|conn| query_device(conn, id))
    }

    /// Mark a device approved. Clears any previous revocation.
    pub fn approve_device(&self, id: Uuid) -> Result<Option<Device>> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE devices SET is_active = 1, revoked_at = NULL WHERE id = ?1",
                [id.to_string()],
            )?;
            query_device(conn, id)
        })
    }

    pub fn revoke_device(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<Device>> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE devices SET is_active = 0, revoked_at = ?2 WHERE id = ?1",
                (id.to_string(), now),
            )?;
            query_device(conn, id)
        })
    }

    /// Hard-delete a device row. Returns the deleted row, if it existed.
    pub fn delete_device(&self, id: Uuid) -> Result<Option<Device>> {
        self.with_conn(|conn| {
            let device = query_device(conn, id)?;
            if device.is_some() {
                conn.execute("DELETE FROM devices WHERE id = ?1", [id.to_string()])?;
            }
            Ok(device)
        })
    }

    /// Devices ordered oldest first, optionally for one user.
    pub fn list_devices(&self, user_id: Option<Uuid>) -> Result<Vec<Device>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM devices
                 WHERE (?1 IS NULL OR user_id = ?1)
                 ORDER BY created_at ASC",
                DEVICE_COLUMNS
            ))?;
            let rows = stmt
                .query_map([user_id.map(|u| u.to_string())], device_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_device(conn: &Connection, id: Uuid) -> Result<Option<Device>> {
    let device = conn
        .query_row(
            &format!("SELECT {} FROM devices WHERE id = ?1", DEVICE_COLUMNS),
            [id.to_string()],
            device_from_row,
        )
        .optional()?;
    Ok(device)
}

fn query_device_by_fingerprint(
    conn: &Connection,
    user_id: &str,
    fingerprint: &str,
) -> Result<Option<Device>> {
    let device = conn
        .query_row(
            &format!(
                "SELECT {} FROM devices WHERE user_id = ?1 AND fingerprint = ?2",
                DEVICE_COLUMNS
            ),
            [user_id, fingerprint],
            device_from_row,
        )
        .optional()?;
    Ok(device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lovenote_types::models::{DeviceState, Role};

    fn setup() -> (Database, Uuid) {
        let db = Database::open_in_memory().unwrap();
        let user = db.ensure_user(Role::Client, Utc::now()).unwrap();
        (db, user.id)
    }

    #[test]
    fn first_device_sees_no_live_devices() {
        let (db, uid) = setup();
        let res = db
            .resolve_device(uid, "fp-1", Some("ua"), Some("ip"), Utc::now(), |has_live| {
                assert!(!has_live);
                true
            })
            .unwrap();
        assert!(res.created);
        assert!(res.device.is_active);

        let second = db
            .resolve_device(uid, "fp-2", None, None, Utc::now(), |has_live| {
                assert!(has_live);
                false
            })
            .unwrap();
        assert!(second.created);
        assert_eq!(second.device.state(), DeviceState::Pending);
    }

    #[test]
    fn repeat_resolution_keeps_one_row_and_state() {
        let (db, uid) = setup();
        let first = db
            .resolve_device(uid, "fp", Some("ua-1"), None, Utc::now(), |_| true)
            .unwrap();
        db.revoke_device(first.device.id, Utc::now()).unwrap();

        for _ in 0..3 {
            let again = db
                .resolve_device(uid, "fp", Some("ua-2"), Some("ip"), Utc::now(), |_| true)
                .unwrap();
            assert!(!again.created);
            assert_eq!(again.device.id, first.device.id);
            assert_eq!(again.device.state(), DeviceState::Revoked);
            assert_eq!(again.device.user_agent.as_deref(), Some("ua-2"));
        }
        assert_eq!(db.list_devices(Some(uid)).unwrap().len(), 1);
    }

    #[test]
    fn approve_clears_revocation_and_delete_removes() {
        let (db, uid) = setup();
        let res = db
            .resolve_device(uid, "fp", None, None, Utc::now(), |_| true)
            .unwrap();
        let revoked = db.revoke_device(res.device.id, Utc::now()).unwrap().unwrap();
        assert!(revoked.revoked_at.is_some());

        let approved = db.approve_device(res.device.id).unwrap().unwrap();
        assert!(approved.is_active);
        assert!(approved.revoked_at.is_none());

        assert!(db.delete_device(res.device.id).unwrap().is_some());
        assert!(db.delete_device(res.device.id).unwrap().is_none());
        assert!(db.find_device(uid, "fp").unwrap().is_none());
    }

    #[test]
    fn revoked_devices_do_not_count_as_live() {
        let (db, uid) = setup();
        let res = db
            .resolve_device(uid, "fp-old", None, None, Utc::now(), |_| true)
            .unwrap();
        db.revoke_device(res.device.id, Utc::now()).unwrap();

        db.resolve_device(uid, "fp-new", None, None, Utc::now(), |has_live| {
            assert!(!has_live);
            true
        })
        .unwrap();
    }
}
