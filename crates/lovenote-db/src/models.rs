//! Row mapping from SQLite into the shared domain types.
//!
//! Ids are stored as hyphenated UUID text, timestamps through rusqlite's
//! chrono support, booleans as 0/1 integers.

use std::str::FromStr;

use rusqlite::Row;
use rusqlite::types::Type;
use uuid::Uuid;

use lovenote_types::models::{
    DailyNotification, Device, Memory, Message, NotificationPreferences, NotificationSchedule,
    PushSubscription, Reaction, User,
};

pub(crate) const USER_COLUMNS: &str = "id, role, created_at";

pub(crate) const DEVICE_COLUMNS: &str =
    "id, user_id, fingerprint, user_agent, ip_hash, is_active, revoked_at, created_at, last_seen";

pub(crate) const PUSH_COLUMNS: &str =
    "user_id, endpoint, p256dh, auth, user_agent, is_active, updated_at";

fn conversion_error<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into())
}

pub(crate) fn uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let text: String = row.get(idx)?;
    Uuid::parse_str(&text).map_err(|e| conversion_error(idx, e))
}

/// Parse a text column through `FromStr` (roles, message kinds).
pub(crate) fn parsed_at<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    let text: String = row.get(idx)?;
    text.parse::<T>().map_err(|e| conversion_error(idx, e))
}

pub(crate) fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: uuid_at(row, 0)?,
        role: parsed_at(row, 1)?,
        created_at: row.get(2)?,
    })
}

pub(crate) fn device_from_row(row: &Row<'_>) -> rusqlite::Result<Device> {
    Ok(Device {
        id: uuid_at(row, 0)?,
        user_id: uuid_at(row, 1)?,
        fingerprint: row.get(2)?,
        user_agent: row.get(3)?,
        ip_hash: row.get(4)?,
        is_active: row.get(5)?,
        revoked_at: row.get(6)?,
        created_at: row.get(7)?,
        last_seen: row.get(8)?,
    })
}

pub(crate) fn memory_from_row(row: &Row<'_>) -> rusqlite::Result<Memory> {
    Ok(Memory {
        id: uuid_at(row, 0)?,
        user_id: uuid_at(row, 1)?,
        sender_role: parsed_at(row, 2)?,
        created_at: row.get(3)?,
    })
}

pub(crate) fn reaction_from_row(row: &Row<'_>) -> rusqlite::Result<Reaction> {
    Ok(Reaction {
        id: uuid_at(row, 0)?,
        user_id: uuid_at(row, 1)?,
        emoji: row.get(2)?,
        created_at: row.get(3)?,
    })
}

pub(crate) fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: uuid_at(row, 0)?,
        user_id: uuid_at(row, 1)?,
        content: row.get(2)?,
        kind: parsed_at(row, 3)?,
        emoji: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub(crate) fn daily_from_row(row: &Row<'_>) -> rusqlite::Result<DailyNotification> {
    Ok(DailyNotification {
        id: uuid_at(row, 0)?,
        user_id: uuid_at(row, 1)?,
        content: row.get(2)?,
        sent_at: row.get(3)?,
        emotion_level: row.get(4)?,
    })
}

pub(crate) fn schedule_from_row(row: &Row<'_>) -> rusqlite::Result<NotificationSchedule> {
    Ok(NotificationSchedule {
        id: uuid_at(row, 0)?,
        time: row.get(1)?,
        is_active: row.get(2)?,
        created_at: row.get(3)?,
    })
}

pub(crate) fn push_from_row(row: &Row<'_>) -> rusqlite::Result<PushSubscription> {
    Ok(PushSubscription {
        user_id: uuid_at(row, 0)?,
        endpoint: row.get(1)?,
        p256dh: row.get(2)?,
        auth: row.get(3)?,
        user_agent: row.get(4)?,
        is_active: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

pub(crate) fn preferences_from_row(row: &Row<'_>) -> rusqlite::Result<NotificationPreferences> {
    Ok(NotificationPreferences {
        enable_memory: row.get(0)?,
        enable_message: row.get(1)?,
        enable_reaction: row.get(2)?,
        enable_daily: row.get(3)?,
        silent_start: row.get(4)?,
        silent_end: row.get(5)?,
    })
}
