//! Daily notifications, schedules, push subscriptions, delivery logs and
//! per-user notification preferences.

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, TransactionBehavior};
use uuid::Uuid;

use lovenote_types::models::{
    DailyNotification, NotificationCategory, NotificationPreferences, NotificationSchedule,
    PushSubscription,
};

use crate::Database;
use crate::models::{PUSH_COLUMNS, daily_from_row, preferences_from_row, push_from_row, schedule_from_row};

impl Database {
    // -- Daily notifications --

    /// Insert the day's notification unless one already exists with
    /// `sent_at` in `[day_start, day_end)`. Returns `None` if one did.
    pub fn insert_daily_notification_once(
        &self,
        user_id: Uuid,
        content: &str,
        emotion_level: u8,
        now: DateTime<Utc>,
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
    ) -> Result<Option<DailyNotification>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let uid = user_id.to_string();

            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM daily_notifications
                               WHERE user_id = ?1 AND sent_at >= ?2 AND sent_at < ?3)",
                (&uid, day_start, day_end),
                |r| r.get(0),
            )?;
            if exists {
                return Ok(None);
            }

            let notification = DailyNotification {
                id: Uuid::new_v4(),
                user_id,
                content: content.to_string(),
                sent_at: now,
                emotion_level,
            };
            tx.execute(
                "INSERT INTO daily_notifications (id, user_id, content, sent_at, emotion_level)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (notification.id.to_string(), &uid, content, now, emotion_level),
            )?;
            tx.commit()?;
            Ok(Some(notification))
        })
    }

    pub fn daily_notification_between(
        &self,
        user_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<DailyNotification>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, user_id, content, sent_at, emotion_level FROM daily_notifications
                     WHERE user_id = ?1 AND sent_at >= ?2 AND sent_at < ?3
                     ORDER BY sent_at ASC LIMIT 1",
                    (user_id.to_string(), start, end),
                    daily_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn list_daily_notifications(&self, user_id: Uuid, limit: u32) -> Result<Vec<DailyNotification>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, content, sent_at, emotion_level FROM daily_notifications
                 WHERE user_id = ?1 ORDER BY sent_at DESC LIMIT ?2",
            )?;
            let rows = stmt
                .query_map((user_id.to_string(), limit), daily_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Schedules --

    pub fn insert_schedule(&self, time: &str, now: DateTime<Utc>) -> Result<NotificationSchedule> {
        let schedule = NotificationSchedule {
            id: Uuid::new_v4(),
            time: time.to_string(),
            is_active: true,
            created_at: now,
        };
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notification_schedules (id, time, is_active, created_at) VALUES (?1, ?2, 1, ?3)",
                (schedule.id.to_string(), time, now),
            )?;
            Ok(())
        })?;
        Ok(schedule)
    }

    pub fn list_schedules(&self, active_only: bool) -> Result<Vec<NotificationSchedule>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, time, is_active, created_at FROM notification_schedules
                 WHERE (?1 = 0 OR is_active = 1) ORDER BY time ASC",
            )?;
            let rows = stmt
                .query_map([active_only], schedule_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Push subscriptions --

    /// Insert or refresh a subscription; re-subscribing reactivates it.
    pub fn upsert_push_subscription(
        &self,
        user_id: Uuid,
        endpoint: &str,
        p256dh: &str,
        auth: &str,
        user_agent: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO push_subscriptions (user_id, endpoint, p256dh, auth, user_agent, is_active, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)
                 ON CONFLICT(user_id, endpoint) DO UPDATE SET
                     p256dh = excluded.p256dh,
                     auth = excluded.auth,
                     user_agent = excluded.user_agent,
                     is_active = 1,
                     updated_at = excluded.updated_at",
                (user_id.to_string(), endpoint, p256dh, auth, user_agent, now),
            )?;
            Ok(())
        })
    }

    pub fn active_push_subscriptions(&self, user_id: Uuid) -> Result<Vec<PushSubscription>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM push_subscriptions WHERE user_id = ?1 AND is_active = 1",
                PUSH_COLUMNS
            ))?;
            let rows = stmt
                .query_map([user_id.to_string()], push_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn deactivate_push_subscription(&self, user_id: Uuid, endpoint: &str, now: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE push_subscriptions SET is_active = 0, updated_at = ?3
                 WHERE user_id = ?1 AND endpoint = ?2",
                (user_id.to_string(), endpoint, now),
            )?;
            Ok(())
        })
    }

    // -- Notification logs --

    pub fn insert_notification_log(&self, user_id: Uuid, tag: &str, now: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notification_logs (user_id, notification_type, sent_at) VALUES (?1, ?2, ?3)",
                (user_id.to_string(), tag, now),
            )?;
            Ok(())
        })
    }

    /// Most recent delivery time for a category. Logs store the full tag, so
    /// this matches the category prefix.
    pub fn last_notification_sent(
        &self,
        user_id: Uuid,
        category: NotificationCategory,
    ) -> Result<Option<DateTime<Utc>>> {
        self.with_conn(|conn| {
            let sent_at = conn
                .query_row(
                    "SELECT sent_at FROM notification_logs
                     WHERE user_id = ?1 AND (notification_type = ?2 OR notification_type LIKE ?2 || '-%')
                     ORDER BY sent_at DESC LIMIT 1",
                    (user_id.to_string(), category.as_str()),
                    |r| r.get(0),
                )
                .optional()?;
            Ok(sent_at)
        })
    }

    // -- Preferences --

    pub fn get_preferences(&self, user_id: Uuid) -> Result<Option<NotificationPreferences>> {
        self.with_conn(|conn| {
            let prefs = conn
                .query_row(
                    "SELECT enable_memory, enable_message, enable_reaction, enable_daily, silent_start, silent_end
                     FROM notification_preferences WHERE user_id = ?1",
                    [user_id.to_string()],
                    preferences_from_row,
                )
                .optional()?;
            Ok(prefs)
        })
    }

    pub fn upsert_preferences(
        &self,
        user_id: Uuid,
        prefs: &NotificationPreferences,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notification_preferences
                    (user_id, enable_memory, enable_message, enable_reaction, enable_daily, silent_start, silent_end, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(user_id) DO UPDATE SET
                     enable_memory = excluded.enable_memory,
                     enable_message = excluded.enable_message,
                     enable_reaction = excluded.enable_reaction,
                     enable_daily = excluded.enable_daily,
                     silent_start = excluded.silent_start,
                     silent_end = excluded.silent_end,
                     updated_at = excluded.updated_at",
                (
                    user_id.to_string(),
                    prefs.enable_memory,
                    prefs.enable_message,
                    prefs.enable_reaction,
                    prefs.enable_daily,
                    prefs.silent_start,
                    prefs.silent_end,
                    now,
                ),
            )?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use lovenote_types::models::Role;

    fn client(db: &Database) -> Uuid {
        db.ensure_user(Role::Client, Utc::now()).unwrap().id
    }

    #[test]
    fn daily_notification_is_inserted_once_per_day() {
        let db = Database::open_in_memory().unwrap();
        let uid = client(&db);
        let now = Utc::now();
        let start = now - Duration::hours(1);
        let end = now + Duration::hours(23);

        let first = db.insert_daily_notification_once(uid, "Chào buổi sáng", 50, now, start, end).unwrap();
        assert!(first.is_some());
        let second = db
            .insert_daily_notification_once(uid, "Lần hai", 60, now + Duration::minutes(1), start, end)
            .unwrap();
        assert!(second.is_none());

        let today = db.daily_notification_between(uid, start, end).unwrap().unwrap();
        assert_eq!(today.content, "Chào buổi sáng");
        assert_eq!(db.list_daily_notifications(uid, 10).unwrap().len(), 1);
    }

    #[test]
    fn push_subscription_upsert_reactivates() {
        let db = Database::open_in_memory().unwrap();
        let uid = client(&db);
        let now = Utc::now();

        db.upsert_push_subscription(uid, "https://push/1", "key", "auth", Some("ua"), now).unwrap();
        db.upsert_push_subscription(uid, "https://push/2", "key", "auth", None, now).unwrap();
        assert_eq!(db.active_push_subscriptions(uid).unwrap().len(), 2);

        db.deactivate_push_subscription(uid, "https://push/1", now).unwrap();
        let active = db.active_push_subscriptions(uid).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].endpoint, "https://push/2");

        db.upsert_push_subscription(uid, "https://push/1", "key2", "auth2", None, now).unwrap();
        assert_eq!(db.active_push_subscriptions(uid).unwrap().len(), 2);
    }

    #[test]
    fn last_notification_matches_category_prefix() {
        let db = Database::open_in_memory().unwrap();
        let uid = client(&db);
        let t0 = Utc::now() - Duration::minutes(10);

        assert!(db.last_notification_sent(uid, NotificationCategory::Memory).unwrap().is_none());
        db.insert_notification_log(uid, "memory-1", t0).unwrap();
        db.insert_notification_log(uid, "memory-2", t0 + Duration::minutes(1)).unwrap();
        db.insert_notification_log(uid, "message-1", t0 + Duration::minutes(2)).unwrap();

        let last = db.last_notification_sent(uid, NotificationCategory::Memory).unwrap().unwrap();
        assert_eq!(last, t0 + Duration::minutes(1));
        assert!(db.last_notification_sent(uid, NotificationCategory::Daily).unwrap().is_none());
    }

    #[test]
    fn preferences_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let uid = client(&db);
        assert!(db.get_preferences(uid).unwrap().is_none());

        let prefs = NotificationPreferences {
            enable_reaction: false,
            silent_start: Some(22),
            silent_end: Some(7),
            ..Default::default()
        };
        db.upsert_preferences(uid, &prefs, Utc::now()).unwrap();
        assert_eq!(db.get_preferences(uid).unwrap().unwrap(), prefs);
    }

    #[test]
    fn schedules_filter_inactive() {
        let db = Database::open_in_memory().unwrap();
        let keep = db.insert_schedule("08:00", Utc::now()).unwrap();
        let off = db.insert_schedule("20:30", Utc::now()).unwrap();
        db.with_conn(|conn| {
            conn.execute(
                "UPDATE notification_schedules SET is_active = 0 WHERE id = ?1",
                [off.id.to_string()],
            )?;
            Ok(())
        })
        .unwrap();

        let active = db.list_schedules(true).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, keep.id);
        assert_eq!(db.list_schedules(false).unwrap().len(), 2);
    }
}
