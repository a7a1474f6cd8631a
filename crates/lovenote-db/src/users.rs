use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use uuid::Uuid;

use lovenote_types::models::{Role, User};

use crate::Database;
use crate::models::{USER_COLUMNS, user_from_row};

impl Database {
    /// Return the single user row for `role`, creating it on first use.
    ///
    /// `UNIQUE(role)` plus `ON CONFLICT DO NOTHING` makes concurrent first
    /// logins converge on one row.
    pub fn ensure_user(&self, role: Role, now: DateTime<Utc>) -> Result<User> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, role, created_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(role) DO NOTHING",
                (Uuid::new_v4().to_string(), role.as_str(), now),
            )?;
            let user = conn.query_row(
                &format!("SELECT {} FROM users WHERE role = ?1", USER_COLUMNS),
                [role.as_str()],
                user_from_row,
            )?;
            Ok(user)
        })
    }

    pub fn find_user_by_role(&self, role: Role) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let user = conn
                .query_row(
                    &format!("SELECT {} FROM users WHERE role = ?1", USER_COLUMNS),
                    [role.as_str()],
                    user_from_row,
                )
                .optional()?;
            Ok(user)
        })
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let user = conn
                .query_row(
                    &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                    [id.to_string()],
                    user_from_row,
                )
                .optional()?;
            Ok(user)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_user_is_idempotent_per_role() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();

        let first = db.ensure_user(Role::Client, now).unwrap();
        let second = db.ensure_user(Role::Client, now).unwrap();
        assert_eq!(first.id, second.id);

        let admin = db.ensure_user(Role::Admin, now).unwrap();
        assert_ne!(admin.id, first.id);
        assert_eq!(admin.role, Role::Admin);

        let count: i64 = db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn find_user_by_role_does_not_create() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.find_user_by_role(Role::Admin).unwrap().is_none());
        let created = db.ensure_user(Role::Admin, Utc::now()).unwrap();
        let found = db.find_user_by_role(Role::Admin).unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(db.get_user(created.id).unwrap().unwrap().role, Role::Admin);
    }
}
